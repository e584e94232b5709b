//! # mrr core
//!
//! Value types and capabilities shared by every layer of the mrr
//! request/response dispatch stack:
//!
//! - **Topics**: [`Topic`] and [`QoS`]
//! - **Parameters**: [`Params`] and the dynamically typed [`ParamValue`]
//! - **Requests**: [`Request`], one per inbound message
//! - **Transport**: the [`Transport`] capability and its [`MessageHandler`] callback
//!
//! ```text
//! ┌───────────┐  on_message  ┌────────────┐  handler(conversation)  ┌─────────┐
//! │ Transport │─────────────▶│ Dispatcher │────────────────────────▶│ Handler │
//! │  (broker) │◀─────────────│            │◀────────────────────────│         │
//! └───────────┘   publish    └────────────┘   conversation.blob()   └─────────┘
//! ```

pub mod error;
pub mod params;
pub mod request;
pub mod topic;
pub mod transport;

pub use error::{CoreError, CoreResult, TransportError, TransportResult};
pub use params::{ParamValue, Params, format_number};
pub use request::Request;
pub use topic::{QoS, RESPONSE_SUFFIX, Topic};
pub use transport::{
    BoxedTransport, ConnectionEvents, LoggingConnectionEvents, MessageHandler, Transport,
};

// Re-exported so downstream crates agree on the token type.
pub use tokio_util::sync::CancellationToken;
