//! mrr runtime: configuration, logging and process lifecycle around the
//! dispatcher.
//!
//! - Layered configuration ([`ConfigLoader`]): defaults, `mrr.toml`,
//!   `MRR_*` environment variables, programmatic overrides
//! - `tracing` subscriber setup ([`LoggingBuilder`])
//! - [`MrrRuntime`]: connect, register routes, run until shutdown
//!
//! ```ignore
//! use mrr_runtime::MrrRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = MrrRuntime::builder().build(transport)?;
//!     runtime.connect().await?;
//!     runtime.route("echo", QoS::AtMostOnce, Handler::direct(echo)).await?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, MrrConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{MrrRuntime, RuntimeBuilder};

// Re-export tracing for use by handler crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for handler code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
