

//! Core library for the Warden framework.
//! Provides the foundational components for building actor-based applications.
//! This library includes the actor runtime, message passing, and the hierarchical
//! supervision engine that contains and resolves actor failures.

pub use actor::{
    failure_channel, Actor, ActorCell, ActorId, ActorRef, Delivery, Directive,
    Error as ActorError, Escalation, FailureReport, FailureSink, FailureStream,
    Fault, FnHandler, InMemoryBroker, MessageBroker, MessageHandler, Payload,
    Registry, Shutdown, Supervisor, SupervisorId, DEFAULT_MAILBOX_CAPACITY,
    DEFAULT_REGISTRY_CAPACITY, DEFAULT_SHUTDOWN_TIMEOUT,
};
