// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Supervision
//!
//! A supervisor owns a set of actors and a set of nested supervisors. It assigns every actor it
//! takes a lifecycle tracker, a cancellation scope and a failure sink, and it reacts to failure
//! reports with the directive the failing handler requested: resume, restart, retry or escalate.
//! Escalations travel supervisor by supervisor towards the root, where an unrecoverable failure
//! is logged and counted, never panicked on.
//!
//! Shutdown cascades top-down: the supervisor cancels its scope, stops every owned actor and
//! every nested supervisor, and then waits for all tracked tasks, bounded by the shutdown
//! timeout.

use crate::{
    actor::{Actor, ActorId, ActorRef},
    handler::{Directive, FailureReport},
    monitor::{ActorMonitor, SupervisorMonitor},
};

use futures::future::{BoxFuture, FutureExt};

use serde::{Deserialize, Serialize};

use tokio::{
    select,
    sync::{mpsc, RwLock},
    time::sleep,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use tracing::{debug, error, warn};

use uuid::Uuid;

use std::{
    collections::HashMap,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, OnceLock, Weak,
    },
    time::Duration,
};

/// Default time a supervisor waits for its tracked tasks on shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Unique supervisor identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SupervisorId(Uuid);

impl SupervisorId {
    /// Generates a fresh random identifier.
    pub(crate) fn new() -> Self {
        SupervisorId(Uuid::new_v4())
    }
}

impl fmt::Display for SupervisorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome of a supervisor shutdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Shutdown {
    /// Every task below the supervisor finished before the timeout.
    Clean,
    /// The timeout elapsed with tasks still running.
    Forced,
}

/// Failure forwarded from a nested supervisor to its parent.
#[derive(Clone, Debug)]
pub struct Escalation {
    /// Identifier of the supervisor the failure came through.
    pub origin: SupervisorId,
    /// Recovery action requested at this level.
    pub directive: Directive,
    /// The underlying actor failure.
    pub report: FailureReport,
}

/// Sender half of a supervisor's escalation channel.
pub(crate) type EscalationSink = mpsc::UnboundedSender<Escalation>;

/// Receiver half of a supervisor's escalation channel.
pub(crate) type EscalationStream = mpsc::UnboundedReceiver<Escalation>;

/// Creates the escalation channel wired between a child and its parent.
pub(crate) fn escalation_channel() -> (EscalationSink, EscalationStream) {
    mpsc::unbounded_channel()
}

/// Supervision node owning actors and nested supervisors.
///
/// Cheap to clone; all clones share the same node. Attachment calls are
/// expected to be serialized by the caller, failure handling and shutdown
/// are safe to drive from anywhere.
#[derive(Clone)]
pub struct Supervisor {
    inner: Arc<SupervisorInner>,
}

pub(crate) struct SupervisorInner {
    /// Unique identifier.
    id: SupervisorId,
    /// True once attached under a parent supervisor.
    nested: AtomicBool,
    /// Owned actors by identifier.
    actors: RwLock<HashMap<ActorId, ActorRef>>,
    /// Owned nested supervisors by identifier.
    children: RwLock<HashMap<SupervisorId, Supervisor>>,
    /// Join handle for every run task this supervisor starts.
    tracker: TaskTracker,
    /// Cancellation scope. Replaced when attached under a parent.
    scope: RwLock<CancellationToken>,
    /// Fired when shutdown has completed.
    done: CancellationToken,
    /// Set by the first `stop` call.
    stopping: AtomicBool,
    /// Outcome recorded by the stopping call.
    outcome: OnceLock<Shutdown>,
    /// How long `stop` waits for tracked tasks.
    shutdown_timeout: Duration,
    /// Relay for failures of owned actors.
    actor_monitor: ActorMonitor,
    /// Relay for escalations of nested supervisors.
    supervisor_monitor: SupervisorMonitor,
    /// Failure reports accepted by this supervisor.
    handled: AtomicU64,
    /// Failures that ended as unrecoverable root faults here.
    unrecovered: AtomicU64,
}

impl Supervisor {
    /// Creates a root supervisor with its own cancellation scope and the
    /// default shutdown timeout.
    pub fn new() -> Self {
        Self::build(CancellationToken::new(), DEFAULT_SHUTDOWN_TIMEOUT)
    }

    /// Creates a supervisor whose scope is derived from `parent`, so an
    /// application wide shutdown token reaches the whole tree.
    pub fn with_scope(parent: &CancellationToken) -> Self {
        Self::build(parent.child_token(), DEFAULT_SHUTDOWN_TIMEOUT)
    }

    /// Creates a root supervisor with an explicit shutdown timeout.
    pub fn with_shutdown_timeout(timeout: Duration) -> Self {
        Self::build(CancellationToken::new(), timeout)
    }

    fn build(scope: CancellationToken, shutdown_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(SupervisorInner {
                id: SupervisorId::new(),
                nested: AtomicBool::new(false),
                actors: RwLock::new(HashMap::new()),
                children: RwLock::new(HashMap::new()),
                tracker: TaskTracker::new(),
                scope: RwLock::new(scope),
                done: CancellationToken::new(),
                stopping: AtomicBool::new(false),
                outcome: OnceLock::new(),
                shutdown_timeout,
                actor_monitor: ActorMonitor::new(),
                supervisor_monitor: SupervisorMonitor::new(),
                handled: AtomicU64::new(0),
                unrecovered: AtomicU64::new(0),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<SupervisorInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<SupervisorInner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn done_token(&self) -> CancellationToken {
        self.inner.done.clone()
    }

    /// Unique identifier of this supervisor.
    pub fn id(&self) -> SupervisorId {
        self.inner.id
    }

    /// True once this supervisor has been attached under a parent.
    pub fn is_nested(&self) -> bool {
        self.inner.nested.load(Ordering::SeqCst)
    }

    /// Number of failure reports accepted by this supervisor.
    pub fn handled_failures(&self) -> u64 {
        self.inner.handled.load(Ordering::Relaxed)
    }

    /// Number of failures that ended here as unrecoverable root faults.
    pub fn unrecovered_failures(&self) -> u64 {
        self.inner.unrecovered.load(Ordering::Relaxed)
    }

    /// Takes ownership of an actor and starts it.
    ///
    /// The actor gets this supervisor's lifecycle tracker, a snapshot of
    /// its cancellation scope and the inbound side of its failure relay.
    pub async fn supervise_actor(&self, actor: ActorRef) {
        debug!(
            "Supervisor {} supervises actor {} ({}).",
            self.inner.id,
            actor.name(),
            actor.id()
        );
        actor.set_lifecycle_handle(self.inner.tracker.clone());
        actor.set_cancellation_scope(self.inner.scope.read().await.clone());
        actor.set_failure_sink(self.inner.actor_monitor.inbound(self));
        self.inner
            .actors
            .write()
            .await
            .insert(actor.id(), actor.clone());
        actor.start().await;
    }

    /// Takes ownership of a nested supervisor.
    ///
    /// The child is marked nested, its cancellation scope is replaced with
    /// a token derived from this supervisor's scope, and its escalations
    /// are wired to this supervisor. Actors of the child are not started
    /// here; the child manages its own.
    pub async fn supervise_supervisor(&self, child: Supervisor) {
        debug!(
            "Supervisor {} supervises child supervisor {}.",
            self.inner.id,
            child.id()
        );
        child.inner.nested.store(true, Ordering::SeqCst);
        let scope = self.inner.scope.read().await.child_token();
        *child.inner.scope.write().await = scope;
        child
            .inner
            .supervisor_monitor
            .set_outbound(self.inner.supervisor_monitor.inbound(self));
        self.inner.children.write().await.insert(child.id(), child);
    }

    /// Stops the whole subtree below this supervisor.
    ///
    /// Cancels the scope, stops every owned actor, stops every nested
    /// supervisor, and then waits for all tracked tasks bounded by the
    /// shutdown timeout. Idempotent: concurrent and repeated calls wait
    /// for the first one and return the same outcome.
    pub async fn stop(&self) -> Shutdown {
        if self.inner.stopping.swap(true, Ordering::SeqCst) {
            self.inner.done.cancelled().await;
            return self.outcome();
        }

        debug!("Stopping supervisor {}...", self.inner.id);
        self.inner.scope.read().await.cancel();

        let actors: Vec<ActorRef> =
            self.inner.actors.read().await.values().cloned().collect();
        for actor in actors {
            actor.stop();
        }

        let children: Vec<Supervisor> =
            self.inner.children.read().await.values().cloned().collect();
        let mut forced = false;
        for child in children {
            if child.stop_boxed().await == Shutdown::Forced {
                forced = true;
            }
        }

        self.inner.tracker.close();
        let joined = select! {
            _ = self.inner.tracker.wait() => true,
            _ = sleep(self.inner.shutdown_timeout) => false,
        };
        if !joined {
            warn!(
                "Supervisor {} timed out after {:?} waiting for its tasks.",
                self.inner.id, self.inner.shutdown_timeout
            );
        }

        let outcome = if joined && !forced {
            Shutdown::Clean
        } else {
            Shutdown::Forced
        };
        let _ = self.inner.outcome.set(outcome);
        self.inner.done.cancel();
        debug!("Supervisor {} stopped.", self.inner.id);
        outcome
    }

    /// Boxed recursion point for stopping nested supervisors.
    fn stop_boxed(&self) -> BoxFuture<'_, Shutdown> {
        self.stop().boxed()
    }

    /// Blocks until `stop` has completed, from any clone of this
    /// supervisor.
    pub async fn wait(&self) {
        self.inner.done.cancelled().await;
    }

    fn outcome(&self) -> Shutdown {
        self.inner
            .outcome
            .get()
            .copied()
            .unwrap_or(Shutdown::Forced)
    }

    /// Applies the directive of one actor failure report.
    pub async fn handle_actor_failure(&self, report: FailureReport) {
        self.inner.handled.fetch_add(1, Ordering::Relaxed);

        let actor = self
            .inner
            .actors
            .read()
            .await
            .get(&report.actor_id)
            .cloned();
        let Some(actor) = actor else {
            warn!(
                "Supervisor {} got a failure for unknown actor {}.",
                self.inner.id, report.actor_id
            );
            return;
        };

        match report.directive {
            Directive::Resume => {
                debug!(
                    "Actor {} resumes after error: {}",
                    report.actor_name, report.error
                );
            }
            Directive::Restart => {
                debug!("Restarting actor {}.", report.actor_name);
                self.restart_actor(&actor).await;
            }
            Directive::Retry => {
                debug!("Retrying last message of actor {}.", report.actor_name);
                self.restart_actor(&actor).await;
                actor.send_message(report.payload);
            }
            Directive::Escalate => {
                self.escalate(report).await;
            }
        }
    }

    /// Applies the directive of one escalation from a nested supervisor.
    pub async fn handle_supervisor_failure(&self, escalation: Escalation) {
        match escalation.directive {
            Directive::Resume => {
                debug!(
                    "Supervisor {} resumes after failure from supervisor {}.",
                    self.inner.id, escalation.origin
                );
            }
            Directive::Restart | Directive::Retry => {
                let child = self
                    .inner
                    .children
                    .read()
                    .await
                    .get(&escalation.origin)
                    .cloned();
                match child {
                    Some(child) => {
                        debug!(
                            "Supervisor {} restarts actors of supervisor {}.",
                            self.inner.id, escalation.origin
                        );
                        child.restart_actors().await;
                    }
                    None => {
                        warn!(
                            "Supervisor {} got a failure from unknown supervisor {}.",
                            self.inner.id, escalation.origin
                        );
                    }
                }
            }
            Directive::Escalate => {
                self.escalate(escalation.report).await;
            }
        }
    }

    /// Restarts every actor owned by this supervisor.
    pub async fn restart_actors(&self) {
        let actors: Vec<ActorRef> =
            self.inner.actors.read().await.values().cloned().collect();
        for actor in actors {
            self.restart_actor(&actor).await;
        }
    }

    /// Stop-then-start on the same actor. The scope is assigned again so
    /// an actor supervised before this supervisor was nested rejoins the
    /// current cancellation lineage.
    async fn restart_actor(&self, actor: &ActorRef) {
        actor.stop();
        actor.set_cancellation_scope(self.inner.scope.read().await.clone());
        actor.start().await;
    }

    /// Forwards a failure to the parent, or records it as an
    /// unrecoverable root fault when there is no parent.
    async fn escalate(&self, report: FailureReport) {
        if self.is_nested() {
            if let Some(outbound) = self.inner.supervisor_monitor.outbound() {
                debug!(
                    "Supervisor {} escalates failure of actor {}.",
                    self.inner.id, report.actor_name
                );
                let escalation = Escalation {
                    origin: self.inner.id,
                    directive: Directive::Escalate,
                    report,
                };
                if let Err(failed) = outbound.send(escalation) {
                    self.unrecoverable(failed.0.report);
                }
                return;
            }
        }
        self.unrecoverable(report);
    }

    fn unrecoverable(&self, report: FailureReport) {
        error!(
            "Supervisor {} cannot recover failure of actor {}: {}",
            self.inner.id, report.actor_name, report.error
        );
        self.inner.unrecovered.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new()
    }
}
