//! Error types for the waitline core library
//!
//! # Error Hierarchy
//!
//! ```text
//! QueueError     - structural and precondition failures reported to the driver
//! ConnectError   - backend admission failure, reported to the affected entrant
//! ```
//!
//! `QueueError::EmptyQueue` is benign: the driver treats it as a skipped tick.
//! `QueueError::MemoryCleanup` never leaves the deferred purge task; it only
//! exists so the failure can be traced.

use thiserror::Error;

use crate::gate::BlockReason;

/// Errors raised by queue and dispatcher operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Pop or send attempted while nobody is waiting
    #[error("Queue for {target} is empty")]
    EmptyQueue { target: String },

    /// Send attempted while the admission gate is closed
    #[error("Cannot send next entrant to {target}: {reason}")]
    InvalidState { target: String, reason: BlockReason },

    /// The identity is already waiting in this queue
    #[error("{entrant} is already waiting for {target}")]
    AlreadyQueued { entrant: String, target: String },

    /// Purging an expired remembered position failed
    #[error("Failed to purge remembered position for {key}: {message}")]
    MemoryCleanup { key: String, message: String },
}

impl QueueError {
    /// Create an empty queue error
    pub fn empty(target: impl Into<String>) -> Self {
        Self::EmptyQueue {
            target: target.into(),
        }
    }

    /// Create an invalid state error
    pub fn invalid_state(target: impl Into<String>, reason: BlockReason) -> Self {
        Self::InvalidState {
            target: target.into(),
            reason,
        }
    }

    /// Create a duplicate entrant error
    pub fn already_queued(entrant: impl Into<String>, target: impl Into<String>) -> Self {
        Self::AlreadyQueued {
            entrant: entrant.into(),
            target: target.into(),
        }
    }

    /// Create a memory cleanup error
    pub fn memory_cleanup(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MemoryCleanup {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Whether the driver may simply skip this tick
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::EmptyQueue { .. } | Self::MemoryCleanup { .. })
    }
}

/// Reason reported by the host when an admission attempt fails
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ConnectError(String);

impl ConnectError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}
