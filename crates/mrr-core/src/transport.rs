//! Transport capability consumed by the dispatch layer.
//!
//! The dispatch layer never talks to a broker directly. It needs exactly
//! three primitives, expressed by [`Transport`], and it receives inbound
//! messages through a [`MessageHandler`] registered at subscribe time.
//! Delivery guarantees, encoding and security are the transport's business.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::error::{TransportError, TransportResult};
use crate::topic::QoS;

/// Receiver of inbound messages for a subscription.
///
/// Implementations may be invoked concurrently for distinct topics.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Processes one inbound message.
    async fn on_message(&self, topic: &str, qos: QoS, payload: &[u8]);
}

/// Connect/subscribe/publish primitives of a pub/sub transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establishes the broker connection.
    async fn connect(&self) -> TransportResult<()>;

    /// Subscribes to `topic` and routes its messages to `handler`.
    async fn subscribe(
        &self,
        topic: &str,
        qos: QoS,
        handler: Arc<dyn MessageHandler>,
    ) -> TransportResult<()>;

    /// Publishes `payload` to `topic`.
    async fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: &[u8],
    ) -> TransportResult<()>;
}

/// A shared transport handle.
pub type BoxedTransport = Arc<dyn Transport>;

/// Connection lifecycle hooks.
///
/// Both hooks are observability-only; the defaults just log.
pub trait ConnectionEvents: Send + Sync {
    /// Called once the transport reports a live connection.
    fn on_connect(&self) {
        info!("MQTT client connected");
    }

    /// Called when an established connection drops.
    fn on_connection_lost(&self, err: &TransportError) {
        error!(error = %err, "MQTT connection lost");
    }
}

/// The default [`ConnectionEvents`] implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingConnectionEvents;

impl ConnectionEvents for LoggingConnectionEvents {}
