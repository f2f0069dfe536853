// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Errors module
//!

use crate::ActorId;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for the actor runtime.
#[derive(Clone, Debug, Error, PartialEq, Serialize, Deserialize)]
pub enum Error {
    /// A message arrived at an actor with no handler configured.
    #[error("No handler defined for actor {0}.")]
    NoHandler(ActorId),
    /// A topic was published to with no subscribers.
    #[error("No subscribers for topic {0}.")]
    NoSubscribers(String),
    /// A message handler failed while processing a delivery.
    #[error("Handler error: {0}")]
    Handler(String),
}
