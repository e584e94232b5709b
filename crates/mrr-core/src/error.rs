//! Unified error types for the mrr core.
//!
//! Framework-level errors (response, extraction, handler, routing) live in
//! `mrr-framework`; the ones here are shared by every layer.

use thiserror::Error;

// =============================================================================
// Core Errors
// =============================================================================

/// Errors raised while constructing core value types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A delivery-quality level outside `0..=2`.
    #[error("invalid QoS level: {0}")]
    InvalidQos(u8),
}

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors reported by a [`Transport`](crate::transport::Transport) implementation.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// An established connection dropped.
    #[error("connection lost: {reason}")]
    ConnectionLost {
        /// Reason for the loss.
        reason: String,
    },

    /// The operation needs a live connection and there is none.
    #[error("transport is not connected")]
    NotConnected,

    /// Subscribing to a topic was rejected.
    #[error("failed to subscribe to '{topic}': {reason}")]
    SubscribeFailed {
        /// The topic that could not be subscribed.
        topic: String,
        /// Reason for failure.
        reason: String,
    },

    /// Publishing a message failed.
    #[error("failed to publish to '{topic}': {reason}")]
    PublishFailed {
        /// The destination topic.
        topic: String,
        /// Reason for failure.
        reason: String,
    },
}

impl TransportError {
    /// Creates a subscribe failure for `topic`.
    pub fn subscribe(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SubscribeFailed {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    /// Creates a publish failure for `topic`.
    pub fn publish(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PublishFailed {
            topic: topic.into(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for core value construction.
pub type CoreResult<T> = Result<T, CoreError>;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
