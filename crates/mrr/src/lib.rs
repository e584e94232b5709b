//! # mrr
//!
//! Request/response dispatch over publish/subscribe messaging.
//!
//! A service subscribes to request topics; every inbound message becomes a
//! [`Conversation`](prelude::Conversation) carrying the decoded JSON
//! parameters and a response topic. Handlers reply through the
//! conversation, which publishes to `<topic>/_response` unless the caller
//! asked for another topic with `_rt`/`_rq`.
//!
//! ```text
//! ┌───────────┐     ┌────────────┐     ┌────────────┐     ┌─────────┐
//! │ Transport │────▶│ Dispatcher │────▶│ RouteTable │────▶│ Handler │
//! │ (broker)  │◀────│            │     └────────────┘     └────┬────┘
//! └───────────┘     └────────────┘◀── conversation.json() ────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mrr::prelude::*;
//!
//! async fn add(conv: Conversation) -> HandlerResult {
//!     let sum = conv.param_f64("a") + conv.param_f64("b");
//!     conv.json(200, &serde_json::json!({ "sum": sum })).await?;
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = MrrRuntime::builder().build(transport)?;
//!     runtime.connect().await?;
//!     runtime.route("math/add", QoS::AtLeastOnce, Handler::direct(add)).await?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use mrr_core as core;
pub use mrr_framework as framework;
pub use mrr_runtime as runtime;
pub use mrr_transport as transport;

/// Commonly used types for writing services.
pub mod prelude {
    pub use mrr_runtime::{MrrConfig, MrrRuntime, RuntimeError, RuntimeResult};

    pub use mrr_framework::{
        Conversation, DispatchOutcome, Dispatcher, FromScope, Handler, HandlerError,
        HandlerResult, Inbound, InvocationScope, InvocationStrategy, Payload, ResponseError,
        Service,
    };

    pub use mrr_core::{
        BoxedTransport, ConnectionEvents, MessageHandler, ParamValue, Params, QoS, Request,
        Topic, Transport, TransportError,
    };

    pub use mrr_runtime::prelude::*;
}
