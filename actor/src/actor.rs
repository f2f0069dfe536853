// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Actor
//!
//! The `actor` module provides the `Actor` trait and the `ActorCell` type. The `Actor` trait is
//! the contract between a supervisor and the units it owns. `ActorCell` is the mailbox-driven
//! implementation of that contract: a bounded FIFO queue drained by a dedicated task that feeds
//! each message to the configured [`MessageHandler`], one at a time.
//!

use crate::{
    handler::{
        mailbox, FailureSink, MailboxReceiver, MailboxSender, MessageHandler,
        Payload,
    },
    runner::ActorRunner,
};

use async_trait::async_trait;

use serde::{Deserialize, Serialize};

use tokio::{sync::mpsc::error::TrySendError, task::JoinHandle};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use tracing::{debug, warn};

use uuid::Uuid;

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard},
};

/// Default mailbox capacity for actors built with [`ActorCell::new`].
pub const DEFAULT_MAILBOX_CAPACITY: usize = 100;

/// Unique actor identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(Uuid);

impl ActorId {
    /// Generates a fresh random identifier.
    pub(crate) fn new() -> Self {
        ActorId(Uuid::new_v4())
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Contract between a supervisor and the units it owns.
///
/// A supervisor drives lifecycle, cancellation and failure routing through
/// this trait only, so any mailbox-driven unit can be placed under
/// supervision.
#[async_trait]
pub trait Actor: Send + Sync + 'static {
    /// Unique identifier of this actor.
    fn id(&self) -> ActorId;

    /// Human readable name of this actor.
    fn name(&self) -> &str;

    /// Spawns the actor's run task.
    ///
    /// Waits for the previous run task to finish first, so a
    /// stop-then-start sequence never races its predecessor. Calling
    /// `start` on an actor that is already running parks the caller until
    /// the actor is stopped; callers are expected to start an actor once
    /// per stop.
    async fn start(&self);

    /// Signals the run task to stop. Idempotent; the task exits at its
    /// next loop wake, never in the middle of a handler invocation.
    fn stop(&self);

    /// Queues a message without waiting.
    ///
    /// Fire-and-forget with at-most-once delivery: when the mailbox is
    /// full the message is dropped and the drop is only observable through
    /// a warning in the logs.
    fn send_message(&self, payload: Payload);

    /// Assigns the tracker the run task registers with. Set by the owning
    /// supervisor before start.
    fn set_lifecycle_handle(&self, tracker: TaskTracker);

    /// Assigns the cancellation scope the run task observes. Set by the
    /// owning supervisor before start.
    fn set_cancellation_scope(&self, scope: CancellationToken);

    /// Assigns the sink where handler failures are reported. Set by the
    /// owning supervisor before start.
    fn set_failure_sink(&self, sink: FailureSink);
}

/// Shared reference to a supervised actor.
pub type ActorRef = Arc<dyn Actor>;

/// Mailbox-driven [`Actor`] implementation.
///
/// The cell owns the sender half of its mailbox for the whole of its life.
/// The receiver half, the handler and the run state are parked in the cell
/// between runs and lent to the run task while the actor is running, which
/// is what makes restart a plain stop-then-start on the same value.
pub struct ActorCell {
    /// Unique identifier, fixed at construction.
    id: ActorId,
    /// Human readable name, fixed at construction.
    name: String,
    /// Sender half of the mailbox.
    sender: MailboxSender,
    /// State lent to the run task while the actor is running.
    state: Arc<Mutex<CellState>>,
}

/// Run state of an [`ActorCell`].
pub(crate) struct CellState {
    /// Receiver half of the mailbox. `None` while a run task owns it.
    pub(crate) inbox: Option<MailboxReceiver>,
    /// Configured message handler. `None` while a run task owns it, or
    /// when none was ever set.
    pub(crate) handler: Option<Box<dyn MessageHandler>>,
    /// Stop signal for the current run. Re-armed on every start.
    pub(crate) stop: CancellationToken,
    /// Cancellation scope assigned by the owning supervisor.
    pub(crate) scope: Option<CancellationToken>,
    /// Lifecycle tracker assigned by the owning supervisor.
    pub(crate) tracker: Option<TaskTracker>,
    /// Failure sink assigned by the owning supervisor.
    pub(crate) sink: Option<FailureSink>,
    /// Join handle of the current run task.
    pub(crate) running: Option<JoinHandle<()>>,
}

/// Locks a cell state, recovering the guard if a panic in a test handler
/// poisoned the mutex.
pub(crate) fn lock_state(state: &Mutex<CellState>) -> MutexGuard<'_, CellState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl ActorCell {
    /// Creates an actor with the default mailbox capacity.
    pub fn new(name: &str) -> Self {
        Self::with_capacity(name, DEFAULT_MAILBOX_CAPACITY)
    }

    /// Creates an actor with an explicit mailbox capacity.
    pub fn with_capacity(name: &str, capacity: usize) -> Self {
        let (sender, receiver) = mailbox(capacity);
        Self {
            id: ActorId::new(),
            name: name.to_owned(),
            sender,
            state: Arc::new(Mutex::new(CellState {
                inbox: Some(receiver),
                handler: None,
                stop: CancellationToken::new(),
                scope: None,
                tracker: None,
                sink: None,
                running: None,
            })),
        }
    }

    /// Sets the message handler invoked for every delivery. Replaces any
    /// previous handler; takes effect at the next start.
    pub fn set_handler<H>(&self, handler: H)
    where
        H: MessageHandler,
    {
        lock_state(&self.state).handler = Some(Box::new(handler));
    }
}

#[async_trait]
impl Actor for ActorCell {
    fn id(&self) -> ActorId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) {
        let previous = lock_state(&self.state).running.take();
        if let Some(previous) = previous {
            debug!("Actor {} waits for its previous run.", self.name);
            let _ = previous.await;
        }

        let (runner, tracker) = {
            let mut state = lock_state(&self.state);
            let Some(inbox) = state.inbox.take() else {
                warn!("Actor {} is already running.", self.name);
                return;
            };
            state.stop = CancellationToken::new();
            let runner = ActorRunner::new(
                self.id,
                self.name.clone(),
                inbox,
                state.handler.take(),
                state.stop.clone(),
                state.scope.clone().unwrap_or_default(),
                state.sink.clone(),
                self.state.clone(),
            );
            (runner, state.tracker.clone())
        };

        let handle = match tracker {
            Some(tracker) => tracker.spawn(runner.run()),
            None => tokio::spawn(runner.run()),
        };
        lock_state(&self.state).running = Some(handle);
    }

    fn stop(&self) {
        debug!("Stopping actor {}.", self.name);
        lock_state(&self.state).stop.cancel();
    }

    fn send_message(&self, payload: Payload) {
        match self.sender.try_send(payload) {
            Ok(()) => {}
            Err(TrySendError::Full(payload)) => {
                warn!(
                    "Mailbox of actor {} is full. Dropping message {:?}.",
                    self.name, payload
                );
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Mailbox of actor {} is closed.", self.name);
            }
        }
    }

    fn set_lifecycle_handle(&self, tracker: TaskTracker) {
        lock_state(&self.state).tracker = Some(tracker);
    }

    fn set_cancellation_scope(&self, scope: CancellationToken) {
        lock_state(&self.state).scope = Some(scope);
    }

    fn set_failure_sink(&self, sink: FailureSink) {
        lock_state(&self.state).sink = Some(sink);
    }
}
