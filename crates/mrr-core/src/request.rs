//! The inbound request as seen by the dispatch layer.

use tokio_util::sync::CancellationToken;

use crate::topic::Topic;

/// One inbound message.
///
/// Created fresh by the dispatcher for every delivery. The response topic is
/// not known at receive time; it is filled in while the conversation is
/// being built, from the reserved `_rt`/`_rq` parameters.
#[derive(Debug, Clone)]
pub struct Request {
    topic: Topic,
    payload: Vec<u8>,
    response_topic: Option<Topic>,
    cancellation: Option<CancellationToken>,
}

impl Request {
    /// Creates a request for a message received on `topic`.
    pub fn new(topic: Topic, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic,
            payload: payload.into(),
            response_topic: None,
            cancellation: None,
        }
    }

    /// Attaches a cancellation token for timeout/abort propagation.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// The topic the message arrived on.
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// The raw payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The explicit reply destination, if the sender asked for one.
    pub fn response_topic(&self) -> Option<&Topic> {
        self.response_topic.as_ref()
    }

    /// Sets or clears the explicit reply destination.
    pub fn set_response_topic(&mut self, topic: Option<Topic>) {
        self.response_topic = topic;
    }

    /// Returns the request's cancellation token.
    ///
    /// Never absent: a request without an attached token gets a fresh one
    /// that is never cancelled.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone().unwrap_or_default()
    }
}
