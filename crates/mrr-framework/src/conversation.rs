//! Per-message conversation context.
//!
//! A [`Conversation`] bundles the inbound [`Request`], its decoded
//! [`Params`], and the operations a handler uses to reply. It is built by
//! the dispatcher for exactly one handler invocation and dropped afterwards.
//!
//! # Reply destination
//!
//! Every emission operation reduces to [`Conversation::blob`], which picks
//! the destination as follows:
//!
//! 1. the explicit response topic, when the sender supplied `_rt` (and
//!    optionally `_rq`) in the payload;
//! 2. otherwise `<inbound topic>/_response` at the inbound QoS.
//!
//! When the dispatcher has a debug topic configured, the same bytes are
//! mirrored there after the primary publish.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing::{debug, trace, warn};

use mrr_core::{BoxedTransport, ParamValue, Params, QoS, Request, Topic};

use crate::error::ResponseResult;

/// Reserved parameter carrying the reply topic name.
pub const RESPONSE_TOPIC_PARAM: &str = "_rt";

/// Reserved parameter carrying the reply QoS, decoded with [`Params::byte`].
pub const RESPONSE_QOS_PARAM: &str = "_rq";

/// Publishing capability handed to each conversation by its dispatcher.
#[derive(Clone)]
pub struct Responder {
    transport: BoxedTransport,
    debug_topic: Option<Topic>,
}

impl Responder {
    /// Creates a responder. An empty-named debug topic counts as unset.
    pub fn new(transport: BoxedTransport, debug_topic: Option<Topic>) -> Self {
        Self {
            transport,
            debug_topic: debug_topic.filter(|t| !t.is_empty()),
        }
    }

    /// The wire-tap destination, if configured.
    pub fn debug_topic(&self) -> Option<&Topic> {
        self.debug_topic.as_ref()
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("debug_topic", &self.debug_topic)
            .finish_non_exhaustive()
    }
}

/// The context object passed to handlers.
#[derive(Debug)]
pub struct Conversation {
    request: Request,
    params: Params,
    responder: Responder,
}

impl Conversation {
    /// Builds the conversation for `request`.
    ///
    /// The payload is decoded synchronously (an undecodable payload leaves
    /// the parameters empty) and the `_rt`/`_rq` convention is applied.
    pub fn new(request: Request, responder: Responder) -> Self {
        let params = decode_or(Params::new(), request.payload());
        let mut conversation = Self {
            request,
            params,
            responder,
        };

        let name = conversation.param_string(RESPONSE_TOPIC_PARAM);
        let qos = conversation.param_byte(RESPONSE_QOS_PARAM);
        conversation.set_response_topic(&name, qos);
        conversation
    }

    /// The inbound request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// The decoded parameters.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Decodes `data` into the parameters.
    ///
    /// On failure the current parameters are kept as they are, so handlers
    /// still run and simply see default values.
    pub fn set_payload(&mut self, data: &[u8]) {
        let current = std::mem::take(&mut self.params);
        self.params = decode_or(current, data);
    }

    /// Overrides the reply destination. An empty `name` leaves it unchanged.
    ///
    /// `qos` is the raw byte from the `_rq` convention; levels above 2 fall
    /// back to QoS 0.
    pub fn set_response_topic(&mut self, name: &str, qos: u8) {
        if name.is_empty() {
            return;
        }
        if QoS::try_from(qos).is_err() {
            warn!(topic = name, level = qos, "Reply QoS out of range, using 0");
        }
        self.request
            .set_response_topic(Some(Topic::new(name, QoS::from_byte_lossy(qos))));
    }

    /// Returns the destination a response will be published to.
    pub fn response_topic(&self) -> Topic {
        match self.request.response_topic() {
            Some(topic) if !topic.is_empty() => topic.clone(),
            _ => Topic::response_for(self.request.topic()),
        }
    }

    // =========================================================================
    // Parameter access
    // =========================================================================

    /// Raw parameter value, if present.
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    /// Boolean parameter; non-boolean values yield `false`.
    pub fn param_bool(&self, name: &str) -> bool {
        self.params.bool(name)
    }

    /// Float parameter, parsing strings; see [`ParamValue::as_f64`].
    pub fn param_f64(&self, name: &str) -> f64 {
        self.params.f64(name)
    }

    /// Integer parameter, truncated toward zero.
    pub fn param_i64(&self, name: &str) -> i64 {
        self.params.i64(name)
    }

    /// Byte parameter, decoded from the float's bit pattern; see [`ParamValue::as_byte`].
    pub fn param_byte(&self, name: &str) -> u8 {
        self.params.byte(name)
    }

    /// String parameter; numbers are formatted, other types yield `""`.
    pub fn param_string(&self, name: &str) -> String {
        self.params.string(name)
    }

    // =========================================================================
    // Response emission
    // =========================================================================

    /// Sends a UTF-8 string.
    pub async fn string(&self, code: u16, body: &str) -> ResponseResult<()> {
        self.blob(code, body.as_bytes()).await
    }

    /// Marshals `value` as compact JSON and sends it.
    pub async fn json<T: Serialize + ?Sized>(&self, code: u16, value: &T) -> ResponseResult<()> {
        let body = serde_json::to_vec(value)?;
        self.json_blob(code, &body).await
    }

    /// Marshals `value` as JSON indented with `indent` and sends it.
    pub async fn json_pretty<T: Serialize + ?Sized>(
        &self,
        code: u16,
        value: &T,
        indent: &str,
    ) -> ResponseResult<()> {
        let mut body = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(
            &mut body,
            PrettyFormatter::with_indent(indent.as_bytes()),
        );
        value.serialize(&mut ser)?;
        self.json_blob(code, &body).await
    }

    /// Sends bytes that are already JSON.
    pub async fn json_blob(&self, code: u16, body: &[u8]) -> ResponseResult<()> {
        self.blob(code, body).await
    }

    /// Publishes `body` to the resolved reply destination.
    ///
    /// The retain flag is always cleared. `code` is recorded in the trace
    /// output only. A failing debug mirror is logged and never affects the
    /// result, which reflects the primary publish.
    pub async fn blob(&self, code: u16, body: &[u8]) -> ResponseResult<()> {
        let target = self.response_topic();
        debug!(
            topic = target.name(),
            qos = %target.qos(),
            code,
            len = body.len(),
            "Publishing response"
        );
        let primary = self
            .responder
            .transport
            .publish(target.name(), target.qos(), false, body)
            .await;

        if let Some(debug_topic) = &self.responder.debug_topic
            && let Err(e) = self
                .responder
                .transport
                .publish(debug_topic.name(), debug_topic.qos(), false, body)
                .await
        {
            warn!(topic = debug_topic.name(), error = %e, "Debug mirror publish failed");
        }

        primary.map_err(Into::into)
    }
}

/// Decodes `data`, falling back to `current` when it is not a parameter
/// document.
fn decode_or(current: Params, data: &[u8]) -> Params {
    match Params::decode(data) {
        Ok(params) => {
            trace!(count = params.len(), "Payload decoded");
            params
        }
        Err(e) => {
            trace!(error = %e, "Payload is not a key/value document, keeping parameters");
            current
        }
    }
}
