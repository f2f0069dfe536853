// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Actor Run Loop
//!
//! This module provides the run loop executed by every started actor. The `ActorRunner` is the
//! component that turns an [`ActorCell`](crate::ActorCell) into a live unit of computation: it
//! owns the receiver half of the mailbox for the duration of one run, drains it serially, and
//! routes every failed delivery to the owning supervisor.
//!
//! # Execution Model
//!
//! Each started actor is executed by exactly one runner on its own Tokio task. The runner waits
//! concurrently on three conditions and acts on whichever becomes ready first:
//!
//! 1. **Stop signal**: the actor's own stop token, fired by [`Actor::stop`](crate::Actor::stop).
//! 2. **Cancellation scope**: the token assigned by the owning supervisor, fired when the whole
//!    subtree is being torn down.
//! 3. **Mailbox message**: the next payload queued by `send_message`.
//!
//! There is no priority between the three conditions. Shutdown is cooperative: a fired token
//! takes effect at the next loop wake and never interrupts a handler invocation that is already
//! in flight.
//!
//! # Delivery
//!
//! Message processing is strictly sequential. The runner exclusively owns the configured
//! [`MessageHandler`] while the actor runs, which is what guarantees that no two invocations of
//! the same actor's handler ever overlap. A delivery that fails produces a
//! [`FailureReport`] carrying the error, the requested directive and the payload that was being
//! processed; the report goes to the failure sink when the actor has one and is absorbed with a
//! diagnostic when it does not, which is the intended behavior for standalone actors.
//!
//! # Shutdown
//!
//! On exit the runner parks the mailbox receiver and the handler back into the cell, so a later
//! `start` on the same cell resumes consuming the queue where the previous run left it. Messages
//! queued while the actor is stopped are kept, not drained.

use crate::{
    actor::{lock_state, ActorId, CellState},
    handler::{
        Delivery, FailureReport, FailureSink, Fault, MailboxReceiver,
        MessageHandler, Payload,
    },
    Error,
};

use tokio::select;
use tokio_util::sync::CancellationToken;

use tracing::{debug, warn};

use std::sync::{Arc, Mutex};

/// One run of an actor: drains the mailbox until stopped or cancelled.
pub(crate) struct ActorRunner {
    /// Identifier of the actor being run.
    id: ActorId,
    /// Name of the actor being run.
    name: String,
    /// Receiver half of the mailbox, owned for the duration of the run.
    inbox: MailboxReceiver,
    /// The configured handler, if any.
    handler: Option<Box<dyn MessageHandler>>,
    /// Stop token of this run.
    stop: CancellationToken,
    /// Cancellation scope of the owning supervisor.
    scope: CancellationToken,
    /// Where failed deliveries are reported.
    sink: Option<FailureSink>,
    /// The cell state the mailbox and handler are parked into on exit.
    cell: Arc<Mutex<CellState>>,
}

impl ActorRunner {
    /// Creates the runner for one run of an actor.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: ActorId,
        name: String,
        inbox: MailboxReceiver,
        handler: Option<Box<dyn MessageHandler>>,
        stop: CancellationToken,
        scope: CancellationToken,
        sink: Option<FailureSink>,
        cell: Arc<Mutex<CellState>>,
    ) -> Self {
        Self {
            id,
            name,
            inbox,
            handler,
            stop,
            scope,
            sink,
            cell,
        }
    }

    /// Drains the mailbox until the stop token fires, the cancellation
    /// scope fires, or the mailbox closes.
    pub(crate) async fn run(mut self) {
        debug!("Actor {} is started.", self.name);

        loop {
            select! {
                _ = self.stop.cancelled() => {
                    debug!("Actor {} is stopped.", self.name);
                    break;
                }
                _ = self.scope.cancelled() => {
                    debug!("Actor {} is cancelled.", self.name);
                    break;
                }
                msg = self.inbox.recv() => {
                    match msg {
                        Some(payload) => self.deliver(payload).await,
                        None => {
                            debug!("Mailbox of actor {} is closed.", self.name);
                            break;
                        }
                    }
                }
            }
        }

        self.park();
    }

    /// Feeds one payload to the handler and routes the outcome.
    async fn deliver(&mut self, payload: Payload) {
        let outcome = match self.handler.as_mut() {
            Some(handler) => {
                let delivery = Delivery {
                    payload: payload.clone(),
                    actor_id: self.id,
                    actor_name: self.name.clone(),
                };
                handler.handle(delivery).await
            }
            None => Err(Fault::resume(Error::NoHandler(self.id))),
        };

        if let Err(fault) = outcome {
            self.report(fault, payload);
        }
    }

    /// Turns a fault into a [`FailureReport`] and pushes it to the sink.
    fn report(&self, fault: Fault, payload: Payload) {
        warn!(
            "Actor {} failed to process a message: {}",
            self.name, fault.error
        );
        let Some(sink) = &self.sink else {
            debug!("Actor {} has no failure sink. Error absorbed.", self.name);
            return;
        };

        let report = FailureReport {
            actor_id: self.id,
            actor_name: self.name.clone(),
            directive: fault.directive,
            error: fault.error,
            payload,
        };
        if sink.send(report).is_err() {
            debug!("Failure sink of actor {} is closed.", self.name);
        }
    }

    /// Parks the mailbox receiver and the handler back into the cell so a
    /// later start can reuse them.
    fn park(self) {
        let Self {
            inbox,
            handler,
            cell,
            ..
        } = self;
        let mut state = lock_state(&cell);
        state.inbox = Some(inbox);
        if state.handler.is_none() {
            state.handler = handler;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::handler::{mailbox, FnHandler};

    use futures::FutureExt;
    use tracing_test::traced_test;

    // A cell never drops its sender, so the closed-mailbox exit is only
    // reachable when a runner is driven directly.
    #[tokio::test]
    #[traced_test]
    async fn test_runner_parks_when_mailbox_closes() {
        let (sender, receiver) = mailbox(4);
        let cell = Arc::new(Mutex::new(CellState {
            inbox: None,
            handler: None,
            stop: CancellationToken::new(),
            scope: None,
            tracker: None,
            sink: None,
            running: None,
        }));
        let runner = ActorRunner::new(
            ActorId::new(),
            "direct".to_owned(),
            receiver,
            Some(Box::new(FnHandler::new(|_delivery: Delivery| {
                async move { Ok(()) }.boxed()
            }))),
            CancellationToken::new(),
            CancellationToken::new(),
            None,
            cell.clone(),
        );

        drop(sender);
        runner.run().await;
        assert!(logs_contain("is closed"));

        let state = lock_state(&cell);
        assert!(state.inbox.is_some());
        assert!(state.handler.is_some());
    }
}
