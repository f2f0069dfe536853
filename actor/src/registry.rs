// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Actor registry
//!

use crate::actor::{Actor, ActorRef};

use tokio::sync::RwLock;

use tracing::debug;

use std::{collections::HashMap, sync::Arc};

/// Default capacity hint for the registry map.
pub const DEFAULT_REGISTRY_CAPACITY: usize = 100;

/// Concurrent directory of actors by name.
///
/// The registry owns no lifecycle: it only hands out references.
/// Registering a second actor under the same name replaces the first.
#[derive(Clone)]
pub struct Registry {
    /// The registered actors by name.
    actors: Arc<RwLock<HashMap<String, ActorRef>>>,
}

impl Registry {
    /// Creates a registry with the default capacity hint.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REGISTRY_CAPACITY)
    }

    /// Creates a registry with an explicit capacity hint.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            actors: Arc::new(RwLock::new(HashMap::with_capacity(capacity))),
        }
    }

    /// Registers an actor under its name.
    pub async fn register(&self, actor: ActorRef) {
        let name = actor.name().to_owned();
        debug!("Registering actor {}.", name);
        if self
            .actors
            .write()
            .await
            .insert(name.clone(), actor)
            .is_some()
        {
            debug!("Registry replaced actor {}.", name);
        }
    }

    /// Looks an actor up by name.
    pub async fn lookup(&self, name: &str) -> Option<ActorRef> {
        self.actors.read().await.get(name).cloned()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
