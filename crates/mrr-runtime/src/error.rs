//! Runtime error types.

use thiserror::Error;

use mrr_core::TransportError;
use mrr_framework::RouteError;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The transport could not connect.
    #[error("Connection error: {0}")]
    Connect(#[from] TransportError),

    /// A route was rejected by the dispatcher.
    #[error("Route error: {0}")]
    Route(#[from] RouteError),

    /// Shutdown signal handlers could not be installed.
    #[error("Signal handler error: {0}")]
    Signal(#[from] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
