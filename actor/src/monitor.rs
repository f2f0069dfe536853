// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Failure monitors
//!
//! A monitor connects failure producers to a supervisor without ever blocking them: an inbound
//! unbounded channel, created lazily on first use, plus a single relay task that forwards each
//! received failure to the owning supervisor's handler. One relay per monitor is what serializes
//! failure handling while producers stay free to report concurrently.
//!
//! Relays hold only a weak handle to their supervisor. A relay exits when the supervisor's
//! shutdown completes, when its channel closes, or when the supervisor has been dropped.

use crate::{
    handler::{failure_channel, FailureSink, FailureStream},
    supervisor::{
        escalation_channel, EscalationSink, EscalationStream, Supervisor,
        SupervisorInner,
    },
};

use tokio::select;
use tokio_util::sync::CancellationToken;

use tracing::{debug, warn};

use std::sync::{OnceLock, Weak};

/// Relay for failures of the actors owned by one supervisor.
pub(crate) struct ActorMonitor {
    /// Inbound sink handed to every supervised actor. Created lazily.
    inbound: OnceLock<FailureSink>,
}

impl ActorMonitor {
    pub(crate) fn new() -> Self {
        Self {
            inbound: OnceLock::new(),
        }
    }

    /// Returns the inbound sink, creating the channel and spawning the
    /// relay on first use.
    pub(crate) fn inbound(&self, owner: &Supervisor) -> FailureSink {
        self.inbound
            .get_or_init(|| {
                let (sink, stream) = failure_channel();
                spawn_actor_relay(owner.downgrade(), owner.done_token(), stream);
                sink
            })
            .clone()
    }
}

/// Relay for escalations coming from nested supervisors.
pub(crate) struct SupervisorMonitor {
    /// Inbound sink handed to every nested child. Created lazily.
    inbound: OnceLock<EscalationSink>,
    /// Outbound sink to the parent. Set when this supervisor is nested.
    outbound: OnceLock<EscalationSink>,
}

impl SupervisorMonitor {
    pub(crate) fn new() -> Self {
        Self {
            inbound: OnceLock::new(),
            outbound: OnceLock::new(),
        }
    }

    /// Returns the inbound sink, creating the channel and spawning the
    /// relay on first use.
    pub(crate) fn inbound(&self, owner: &Supervisor) -> EscalationSink {
        self.inbound
            .get_or_init(|| {
                let (sink, stream) = escalation_channel();
                spawn_supervisor_relay(
                    owner.downgrade(),
                    owner.done_token(),
                    stream,
                );
                sink
            })
            .clone()
    }

    /// Wires the outbound side to the parent's inbound sink. A supervisor
    /// is attached to at most one parent.
    pub(crate) fn set_outbound(&self, sink: EscalationSink) {
        if self.outbound.set(sink).is_err() {
            warn!("Supervisor is already attached to a parent.");
        }
    }

    pub(crate) fn outbound(&self) -> Option<EscalationSink> {
        self.outbound.get().cloned()
    }
}

/// Forwards actor failure reports to the owning supervisor, one at a time.
fn spawn_actor_relay(
    owner: Weak<SupervisorInner>,
    done: CancellationToken,
    mut stream: FailureStream,
) {
    tokio::spawn(async move {
        loop {
            select! {
                _ = done.cancelled() => break,
                report = stream.recv() => {
                    let Some(report) = report else { break };
                    let Some(inner) = owner.upgrade() else { break };
                    Supervisor::from_inner(inner)
                        .handle_actor_failure(report)
                        .await;
                }
            }
        }
        debug!("Actor failure relay finished.");
    });
}

/// Forwards escalations to the owning supervisor, one at a time.
fn spawn_supervisor_relay(
    owner: Weak<SupervisorInner>,
    done: CancellationToken,
    mut stream: EscalationStream,
) {
    tokio::spawn(async move {
        loop {
            select! {
                _ = done.cancelled() => break,
                escalation = stream.recv() => {
                    let Some(escalation) = escalation else { break };
                    let Some(inner) = owner.upgrade() else { break };
                    Supervisor::from_inner(inner)
                        .handle_supervisor_failure(escalation)
                        .await;
                }
            }
        }
        debug!("Escalation relay finished.");
    });
}
