use crate::{ActorId, Error};

use async_trait::async_trait;

use futures::future::BoxFuture;

use serde::{Deserialize, Serialize};

use thiserror::Error as ThisError;

use tokio::sync::mpsc;

use std::{any::Any, fmt, sync::Arc};

/// Message payload delivered to an actor.
///
/// Payloads are opaque to the runtime. The `Text` and `Bytes` kinds cover
/// the common cases; `Dynamic` carries any shared value for in-process
/// messaging and is recovered with [`Payload::downcast_ref`].
#[derive(Clone)]
pub enum Payload {
    /// UTF-8 text payload.
    Text(String),
    /// Raw binary payload.
    Bytes(Vec<u8>),
    /// Arbitrary shared value for in-process messaging.
    Dynamic(Arc<dyn Any + Send + Sync>),
}

impl Payload {
    /// Wraps an arbitrary value for in-process delivery.
    pub fn dynamic<T>(value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Payload::Dynamic(Arc::new(value))
    }

    /// Borrows a dynamic payload as a concrete type, if it holds one.
    pub fn downcast_ref<T>(&self) -> Option<&T>
    where
        T: Any + Send + Sync,
    {
        match self {
            Payload::Dynamic(value) => value.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Payload::Bytes(bytes) => {
                f.debug_tuple("Bytes").field(&bytes.len()).finish()
            }
            Payload::Dynamic(_) => f.debug_tuple("Dynamic").finish(),
        }
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_owned())
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Bytes(bytes)
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload::Bytes(bytes.to_vec())
    }
}

/// Recovery action a failing handler requests from its supervisor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Directive {
    /// Log the failure and leave the actor as it is.
    #[default]
    Resume,
    /// Stop and start the actor again. The failing message is discarded.
    Restart,
    /// Restart the actor and send the failing message again.
    Retry,
    /// Hand the failure to the parent supervisor.
    Escalate,
}

/// Failure produced by a message handler.
///
/// Carries the processing error together with the [`Directive`] the owning
/// supervisor should apply.
#[derive(Clone, Debug, ThisError, PartialEq, Serialize, Deserialize)]
#[error("{error}")]
pub struct Fault {
    /// The processing error.
    pub error: Error,
    /// The requested recovery action.
    pub directive: Directive,
}

impl Fault {
    /// Creates a fault with an explicit directive.
    pub fn new(error: Error, directive: Directive) -> Self {
        Self { error, directive }
    }

    /// Fault that asks the supervisor to log and carry on.
    pub fn resume(error: Error) -> Self {
        Self::new(error, Directive::Resume)
    }

    /// Fault that asks the supervisor to restart the actor.
    pub fn restart(error: Error) -> Self {
        Self::new(error, Directive::Restart)
    }

    /// Fault that asks the supervisor to restart the actor and resend the
    /// failing message.
    pub fn retry(error: Error) -> Self {
        Self::new(error, Directive::Retry)
    }

    /// Fault that asks the supervisor to escalate to its parent.
    pub fn escalate(error: Error) -> Self {
        Self::new(error, Directive::Escalate)
    }
}

/// A message as seen by a handler: the payload plus the identity of the
/// actor it was delivered to.
#[derive(Clone, Debug)]
pub struct Delivery {
    /// The message payload.
    pub payload: Payload,
    /// Identifier of the receiving actor.
    pub actor_id: ActorId,
    /// Name of the receiving actor.
    pub actor_name: String,
}

/// Failure record routed from a failing actor to its supervisor.
///
/// The runtime assembles the report at delivery time, echoing the payload
/// that was being processed so a `Retry` always resends the right message.
#[derive(Clone, Debug)]
pub struct FailureReport {
    /// Identifier of the failing actor.
    pub actor_id: ActorId,
    /// Name of the failing actor.
    pub actor_name: String,
    /// Recovery action requested by the handler.
    pub directive: Directive,
    /// The processing error.
    pub error: Error,
    /// The payload whose processing failed.
    pub payload: Payload,
}

/// Sender half of a failure channel. Set on an actor by its supervisor,
/// or by hand for standalone failure consumption.
pub type FailureSink = mpsc::UnboundedSender<FailureReport>;

/// Receiver half of a failure channel.
pub type FailureStream = mpsc::UnboundedReceiver<FailureReport>;

/// Creates a failure channel. Unbounded, so a failing actor never blocks
/// on its own report.
pub fn failure_channel() -> (FailureSink, FailureStream) {
    mpsc::unbounded_channel()
}

/// Receiver side of an actor's bounded mailbox, drained by the run task.
pub type MailboxReceiver = mpsc::Receiver<Payload>;

/// Sender side of an actor's bounded mailbox.
pub type MailboxSender = mpsc::Sender<Payload>;

/// Complete mailbox pair, created at actor construction.
pub type Mailbox = (MailboxSender, MailboxReceiver);

/// Creates a new bounded mailbox.
///
/// Sends go through [`tokio::sync::mpsc::Sender::try_send`], so a full
/// mailbox drops the message instead of blocking the sender.
pub fn mailbox(capacity: usize) -> Mailbox {
    // tokio channels reject a zero capacity
    mpsc::channel(capacity.max(1))
}

/// Message handler trait processing actor deliveries.
///
/// Implementations hold the actor's behavior. The runtime guarantees that
/// at most one invocation runs at a time for a given actor, so `&mut self`
/// state needs no further synchronization.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    /// Handles a single delivery.
    ///
    /// Returning a [`Fault`] routes the failure to the owning supervisor
    /// together with the requested directive. A standalone actor without a
    /// failure sink absorbs the fault.
    async fn handle(&mut self, delivery: Delivery) -> Result<(), Fault>;
}

/// Adapter turning an async closure into a [`MessageHandler`].
///
/// ```ignore
/// use futures::FutureExt;
///
/// let handler = FnHandler::new(|delivery| {
///     async move {
///         println!("got {:?}", delivery.payload);
///         Ok(())
///     }
///     .boxed()
/// });
/// ```
pub struct FnHandler<F> {
    /// The wrapped closure.
    handler: F,
}

impl<F> FnHandler<F>
where
    F: FnMut(Delivery) -> BoxFuture<'static, Result<(), Fault>>
        + Send
        + Sync
        + 'static,
{
    /// Wraps the closure.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<F> MessageHandler for FnHandler<F>
where
    F: FnMut(Delivery) -> BoxFuture<'static, Result<(), Fault>>
        + Send
        + Sync
        + 'static,
{
    async fn handle(&mut self, delivery: Delivery) -> Result<(), Fault> {
        (self.handler)(delivery).await
    }
}
