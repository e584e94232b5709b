//! Error types for the mrr framework.

use thiserror::Error;

use mrr_core::TransportError;

use crate::handler::InvocationStrategy;

/// Errors raised while emitting a response.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// The response value could not be marshaled; nothing was published.
    #[error("failed to marshal response: {0}")]
    Marshal(#[from] serde_json::Error),

    /// The primary publish was rejected by the transport.
    #[error(transparent)]
    Publish(#[from] TransportError),
}

/// Errors that can occur while resolving a handler argument.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    /// No instance of the requested type is available to the invocation.
    #[error("no instance registered for argument type '{type_name}'")]
    Unresolved {
        /// Name of the unresolvable type.
        type_name: &'static str,
    },

    /// Custom extraction error.
    #[error("{0}")]
    Custom(String),
}

impl ExtractError {
    /// Creates a custom extraction error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

/// Errors returned by a handler invocation.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Emitting the response failed.
    #[error(transparent)]
    Response(#[from] ResponseError),

    /// An injected argument could not be resolved.
    #[error(transparent)]
    Extract(#[from] ExtractError),

    /// Failure reported by user code.
    #[error("{0}")]
    Custom(String),
}

impl HandlerError {
    /// Creates a custom handler error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

/// Errors raised at route registration time.
#[derive(Debug, Clone, Error)]
pub enum RouteError {
    /// The handler variant does not match the dispatcher's strategy.
    #[error("handler uses {got} invocation but the dispatcher is configured for {expected}")]
    StrategyMismatch {
        /// The dispatcher's strategy.
        expected: InvocationStrategy,
        /// The handler's variant.
        got: InvocationStrategy,
    },
}

/// Result type for response emission.
pub type ResponseResult<T> = Result<T, ResponseError>;

/// Result type for argument extraction.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Result returned by every handler.
pub type HandlerResult = Result<(), HandlerError>;

/// Result type for route registration.
pub type RouteResult<T> = Result<T, RouteError>;
