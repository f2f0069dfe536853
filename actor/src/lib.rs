// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Warden Actor System
//!
//! A lightweight actor runtime with hierarchical fault supervision for building concurrent,
//! fault-tolerant services in Rust. Actors are independent units of sequential computation that
//! communicate only through asynchronous messages; failures are contained and resolved by a tree
//! of supervisors instead of ad-hoc error returns on the send path.
//!
//! ## Overview
//!
//! Every actor owns a private bounded mailbox and a dedicated Tokio task that drains it, feeding
//! one message at a time to the configured [`MessageHandler`]. Sending is fire-and-forget and
//! never blocks: when a mailbox is full the message is dropped and the drop is observable only
//! in the logs. Shutdown is cooperative, driven by cancellation tokens that take effect at the
//! next loop wake and never interrupt a handler invocation in flight.
//!
//! On top of the runtime sits the supervision engine. A [`Supervisor`] owns actors and nested
//! supervisors; it assigns each actor its lifecycle tracker, cancellation scope and failure
//! sink, and reacts to failed deliveries with the [`Directive`] the handler requested:
//!
//! - **Resume**: log the failure and leave the actor as it is.
//! - **Restart**: stop and start the actor again; the failing message is discarded, queued
//!   messages survive.
//! - **Retry**: restart the actor, then send the failing message again.
//! - **Escalate**: hand the failure to the parent supervisor. At the root an escalated failure
//!   is logged and counted, never panicked on.
//!
//! ## Core Architecture
//!
//! ### Actors and mailboxes
//!
//! [`ActorCell`] is the mailbox-driven implementation of the [`Actor`] contract. The run task
//! exclusively owns the handler while the actor runs, which guarantees that no two invocations
//! of the same actor's handler ever overlap. Restart is a plain stop-then-start on the same
//! cell: the mailbox is kept, so messages queued across a restart are not lost.
//!
//! ### Supervision tree
//!
//! Supervisors nest: [`Supervisor::supervise_supervisor`] re-derives the child's cancellation
//! scope from the parent's, so cancelling a supervisor reaches everything transitively below
//! it. Stopping cascades top-down and is time-bounded: [`Supervisor::stop`] reports whether
//! every task finished in time ([`Shutdown::Clean`]) or the deadline won ([`Shutdown::Forced`]).
//!
//! ### Failure routing
//!
//! A failed delivery becomes a [`FailureReport`] pushed to the owning supervisor's failure
//! relay. Exactly one relay per supervisor serializes failure handling while actors stay free
//! to fail concurrently. Escalations travel the same way, one supervisor level at a time,
//! towards the root.
//!
//! ## Getting Started
//!
//! ### A supervised actor
//!
//! ```ignore
//! use actor::{ActorCell, Directive, Error, Fault, FnHandler, Payload, Supervisor};
//! use futures::FutureExt;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let worker = ActorCell::new("worker");
//!     worker.set_handler(FnHandler::new(|delivery| {
//!         async move {
//!             match delivery.payload {
//!                 Payload::Text(text) => {
//!                     println!("{} got {}", delivery.actor_name, text);
//!                     Ok(())
//!                 }
//!                 _ => Err(Fault::restart(Error::Handler(
//!                     "unsupported payload".to_owned(),
//!                 ))),
//!             }
//!         }
//!         .boxed()
//!     }));
//!
//!     let supervisor = Supervisor::new();
//!     let worker = Arc::new(worker);
//!     supervisor.supervise_actor(worker.clone()).await;
//!
//!     worker.send_message(Payload::from("hello"));
//!
//!     supervisor.stop().await;
//! }
//! ```
//!
//! ### A supervision tree
//!
//! ```ignore
//! use actor::{Shutdown, Supervisor};
//!
//! let root = Supervisor::new();
//! let workers = Supervisor::new();
//! root.supervise_supervisor(workers.clone()).await;
//!
//! // Actors attached to `workers` now live under `root`: stopping the
//! // root stops them too.
//! assert_eq!(root.stop().await, Shutdown::Clean);
//! ```
//!
//! ### Standalone actors
//!
//! An actor does not need a supervisor. Without a failure sink its faults are absorbed with a
//! diagnostic; with a hand-made [`failure_channel`] the caller can consume them directly:
//!
//! ```ignore
//! use actor::{failure_channel, ActorCell, Payload};
//!
//! let (sink, mut failures) = failure_channel();
//! let actor = ActorCell::new("loner");
//! actor.set_failure_sink(sink);
//! actor.start().await;
//!
//! actor.send_message(Payload::from("work"));
//! if let Some(report) = failures.recv().await {
//!     println!("{} failed: {}", report.actor_name, report.error);
//! }
//! ```
//!
//! ## Naming and discovery
//!
//! The [`Registry`] is a concurrent name-to-actor directory with no lifecycle ownership, and
//! the [`MessageBroker`] trait is the publish-subscribe seam towards transport backends, with
//! [`InMemoryBroker`] as the in-process reference implementation.
//!
//! ## API Organization
//!
//! - **Core actor types**: [`Actor`], [`ActorCell`], [`ActorId`], [`ActorRef`]
//! - **Messaging**: [`Payload`], [`Delivery`], [`MessageHandler`], [`FnHandler`]
//! - **Failure handling**: [`Fault`], [`Directive`], [`FailureReport`], [`failure_channel`]
//! - **Supervision**: [`Supervisor`], [`SupervisorId`], [`Escalation`], [`Shutdown`]
//! - **Discovery and transport**: [`Registry`], [`MessageBroker`], [`InMemoryBroker`]
//! - **Error handling**: [`Error`]
//!

// Private modules containing the implementation
mod actor;
mod broker;
mod error;
mod handler;
mod monitor;
mod registry;
mod runner;
mod supervisor;

//
// Core Actor Types
//

/// Contract between a supervisor and the units it owns.
///
/// Implemented by [`ActorCell`] and by any custom mailbox-driven unit that
/// should be placed under supervision. A supervisor drives lifecycle,
/// cancellation and failure routing exclusively through this trait.
pub use actor::Actor;

/// Mailbox-driven [`Actor`] implementation.
///
/// A bounded FIFO mailbox drained by a dedicated task that feeds each
/// message to the configured [`MessageHandler`], one at a time. Restart is
/// stop-then-start on the same cell and keeps the mailbox contents.
pub use actor::ActorCell;

/// Unique actor identifier, assigned at construction.
pub use actor::ActorId;

/// Shared reference to a supervised actor.
///
/// Cloneable and cheap to pass around; all clones address the same actor.
pub use actor::ActorRef;

/// Mailbox capacity used by [`ActorCell::new`].
pub use actor::DEFAULT_MAILBOX_CAPACITY;

//
// Messaging
//

/// A message as seen by a handler: the payload plus the identity of the
/// receiving actor.
pub use handler::Delivery;

/// Adapter turning an async closure into a [`MessageHandler`].
pub use handler::FnHandler;

/// Message handler trait processing actor deliveries.
///
/// The runtime guarantees at most one invocation runs at a time per actor,
/// so handler state needs no further synchronization.
pub use handler::MessageHandler;

/// Opaque message payload: UTF-8 text, raw bytes, or any shared value for
/// in-process messaging.
pub use handler::Payload;

//
// Failure Handling
//

/// Recovery action a failing handler requests from its supervisor.
pub use handler::Directive;

/// Failure produced by a message handler: the processing error plus the
/// requested [`Directive`].
pub use handler::Fault;

/// Failure record routed from a failing actor to its supervisor, echoing
/// the payload that was being processed.
pub use handler::FailureReport;

/// Sender half of a failure channel, assigned to actors as their failure
/// sink.
pub use handler::FailureSink;

/// Receiver half of a failure channel, for standalone failure consumption.
pub use handler::FailureStream;

/// Creates a failure channel for consuming an actor's failures without a
/// supervisor.
pub use handler::failure_channel;

//
// Error Handling
//

/// Error type for the actor runtime.
pub use error::Error;

//
// Supervision
//

/// Time a supervisor waits for its tracked tasks on shutdown, unless
/// configured otherwise.
pub use supervisor::DEFAULT_SHUTDOWN_TIMEOUT;

/// Failure forwarded from a nested supervisor to its parent.
pub use supervisor::Escalation;

/// Outcome of a supervisor shutdown: every task joined in time, or the
/// deadline won.
pub use supervisor::Shutdown;

/// Supervision node owning actors and nested supervisors.
///
/// Assigns supervised actors their lifecycle tracker, cancellation scope
/// and failure sink; applies restart policy; escalates what it cannot
/// recover.
pub use supervisor::Supervisor;

/// Unique supervisor identifier, assigned at construction.
pub use supervisor::SupervisorId;

//
// Discovery and Transport
//

/// In-memory [`MessageBroker`] fanning out to local subscribers.
pub use broker::InMemoryBroker;

/// Publish and subscribe contract for actor messaging backends.
pub use broker::MessageBroker;

/// Capacity hint used by [`Registry::new`].
pub use registry::DEFAULT_REGISTRY_CAPACITY;

/// Concurrent directory of actors by name, owning no lifecycle.
pub use registry::Registry;
