// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Message broker
//!
//! The publish and subscribe contract between actors and a transport backend, together with the
//! in-memory reference implementation. Delivery inherits the mailbox semantics: fan-out is
//! fire-and-forget and a subscriber with a full mailbox drops the message.

use crate::{
    actor::{Actor, ActorRef},
    handler::Payload,
    Error,
};

use async_trait::async_trait;

use tokio::sync::RwLock;

use tracing::debug;

use std::{collections::HashMap, sync::Arc};

/// Publish and subscribe contract for actor messaging backends.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Delivers a message to every subscriber of the topic.
    async fn publish(&self, topic: &str, message: Payload) -> Result<(), Error>;

    /// Subscribes an actor to a topic.
    async fn subscribe(&self, topic: &str, actor: ActorRef) -> Result<(), Error>;
}

/// In-memory [`MessageBroker`] fanning out to local subscribers.
///
/// Publishing to a topic nobody subscribed to is an error, so callers can
/// tell an idle topic from a missing one.
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    /// Subscribed actors by topic.
    subscribers: Arc<RwLock<HashMap<String, Vec<ActorRef>>>>,
}

impl InMemoryBroker {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn publish(&self, topic: &str, message: Payload) -> Result<(), Error> {
        let subscribers = self.subscribers.read().await;
        match subscribers.get(topic) {
            Some(actors) if !actors.is_empty() => {
                debug!(
                    "Publishing to {} subscribers of topic {}.",
                    actors.len(),
                    topic
                );
                for actor in actors {
                    actor.send_message(message.clone());
                }
                Ok(())
            }
            _ => Err(Error::NoSubscribers(topic.to_owned())),
        }
    }

    async fn subscribe(&self, topic: &str, actor: ActorRef) -> Result<(), Error> {
        debug!("Actor {} subscribes to topic {}.", actor.name(), topic);
        self.subscribers
            .write()
            .await
            .entry(topic.to_owned())
            .or_default()
            .push(actor);
        Ok(())
    }
}
