//! In-process loopback broker.
//!
//! [`MemoryTransport`] keeps its subscriptions in memory and records every
//! publish. With loopback enabled, a publish is also delivered to every
//! local subscriber of the exact same topic name, each on its own task,
//! which mimics a broker's asynchronous fan-out.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, trace};

use mrr_core::{MessageHandler, QoS, Transport, TransportError, TransportResult};

/// A message observed by [`MemoryTransport::publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Destination topic name.
    pub topic: String,
    /// Requested delivery level.
    pub qos: QoS,
    /// Retain flag.
    pub retain: bool,
    /// Message body.
    pub payload: Vec<u8>,
}

struct Subscription {
    topic: String,
    qos: QoS,
    handler: Arc<dyn MessageHandler>,
}

#[derive(Default)]
struct State {
    connected: bool,
    dropped: bool,
    subscriptions: Vec<Subscription>,
    published: Vec<PublishedMessage>,
    failing_subscribes: HashSet<String>,
    failing_publishes: HashSet<String>,
}

/// An in-memory [`Transport`].
#[derive(Default)]
pub struct MemoryTransport {
    state: Mutex<State>,
    loopback: bool,
}

impl MemoryTransport {
    /// Creates a transport that records publishes without delivering them.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport that also delivers publishes to local subscribers.
    ///
    /// Delivery spawns tasks, so it must be used inside a Tokio runtime.
    pub fn loopback() -> Self {
        Self {
            loopback: true,
            ..Self::default()
        }
    }

    /// Makes every later `subscribe` to `topic` fail.
    pub fn fail_subscribe(self, topic: impl Into<String>) -> Self {
        self.state.lock().failing_subscribes.insert(topic.into());
        self
    }

    /// Makes every later `publish` to `topic` fail.
    pub fn fail_publish(self, topic: impl Into<String>) -> Self {
        self.state.lock().failing_publishes.insert(topic.into());
        self
    }

    /// Returns `true` once [`connect`](Transport::connect) succeeded.
    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Simulates a dropped broker connection.
    ///
    /// Until the next [`connect`](Transport::connect), subscribe and publish
    /// fail with [`TransportError::NotConnected`].
    pub fn disconnect(&self) {
        let mut state = self.state.lock();
        state.connected = false;
        state.dropped = true;
        debug!("Memory transport disconnected");
    }

    /// Returns the active subscriptions as `(topic, qos)` pairs.
    pub fn subscriptions(&self) -> Vec<(String, QoS)> {
        self.state
            .lock()
            .subscriptions
            .iter()
            .map(|s| (s.topic.clone(), s.qos))
            .collect()
    }

    /// Returns every message published so far.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.state.lock().published.clone()
    }

    /// Returns and clears the publish log.
    pub fn take_published(&self) -> Vec<PublishedMessage> {
        std::mem::take(&mut self.state.lock().published)
    }

    /// Simulates an inbound message from the broker.
    ///
    /// Every subscriber of `topic` is awaited in subscription order. Returns
    /// the number of subscribers that received the message.
    pub async fn inject(&self, topic: &str, qos: QoS, payload: &[u8]) -> usize {
        let handlers = self.handlers_for(topic);
        for handler in &handlers {
            handler.on_message(topic, qos, payload).await;
        }
        handlers.len()
    }

    fn handlers_for(&self, topic: &str) -> Vec<Arc<dyn MessageHandler>> {
        self.state
            .lock()
            .subscriptions
            .iter()
            .filter(|s| s.topic == topic)
            .map(|s| Arc::clone(&s.handler))
            .collect()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self) -> TransportResult<()> {
        let mut state = self.state.lock();
        state.connected = true;
        state.dropped = false;
        debug!("Memory transport connected");
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        qos: QoS,
        handler: Arc<dyn MessageHandler>,
    ) -> TransportResult<()> {
        let mut state = self.state.lock();
        if state.dropped {
            return Err(TransportError::NotConnected);
        }
        if state.failing_subscribes.contains(topic) {
            return Err(TransportError::subscribe(topic, "subscription rejected"));
        }
        state.subscriptions.push(Subscription {
            topic: topic.to_owned(),
            qos,
            handler,
        });
        Ok(())
    }

    async fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: &[u8],
    ) -> TransportResult<()> {
        {
            let mut state = self.state.lock();
            if state.dropped {
                return Err(TransportError::NotConnected);
            }
            if state.failing_publishes.contains(topic) {
                return Err(TransportError::publish(topic, "publish rejected"));
            }
            state.published.push(PublishedMessage {
                topic: topic.to_owned(),
                qos,
                retain,
                payload: payload.to_vec(),
            });
        }
        trace!(topic, len = payload.len(), "Recorded publish");

        if self.loopback {
            for handler in self.handlers_for(topic) {
                let topic = topic.to_owned();
                let payload = payload.to_vec();
                tokio::spawn(async move {
                    handler.on_message(&topic, qos, &payload).await;
                });
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryTransport")
            .field("connected", &state.connected)
            .field("subscriptions", &state.subscriptions.len())
            .field("published", &state.published.len())
            .field("loopback", &self.loopback)
            .finish()
    }
}
