//! Message dispatcher for mrr.
//!
//! The [`Dispatcher`] is the transport-facing entry point. It owns the
//! route table and is registered as the [`MessageHandler`] of every
//! subscription it makes. For each inbound message:
//!
//! 1. a [`Request`] and its [`Conversation`] are built, decoding the payload
//!    and applying the `_rt`/`_rq` reply convention
//! 2. the route table is searched by exact topic name; a miss drops the
//!    message quietly
//! 3. the route's handler is invoked with the conversation
//! 4. a handler error is logged and swallowed
//!
//! ```rust,ignore
//! use mrr_framework::{Dispatcher, Handler, InvocationStrategy};
//!
//! let dispatcher = Arc::new(Dispatcher::new(transport, InvocationStrategy::Direct));
//! dispatcher.set_debug_topic("debug/responses", QoS::AtMostOnce);
//! dispatcher
//!     .register_route("devices/cmd", QoS::AtLeastOnce, Handler::direct(on_command))
//!     .await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{Instrument, Level, debug, error, info, span, trace};

use mrr_core::{BoxedTransport, CancellationToken, MessageHandler, QoS, Request, Topic};

use crate::conversation::{Conversation, Responder};
use crate::error::{HandlerError, RouteError, RouteResult};
use crate::extractor::Services;
use crate::handler::{Handler, InvocationStrategy};
use crate::route::{Route, RouteTable};

/// What happened to one inbound message.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The handler ran and returned `Ok`.
    Handled,
    /// No route matched; nothing was invoked or published.
    Dropped,
    /// The handler (or its argument resolution) failed.
    Failed(HandlerError),
}

impl DispatchOutcome {
    /// Returns `true` for [`DispatchOutcome::Handled`].
    pub fn is_handled(&self) -> bool {
        matches!(self, Self::Handled)
    }

    /// Returns `true` for [`DispatchOutcome::Dropped`].
    pub fn is_dropped(&self) -> bool {
        matches!(self, Self::Dropped)
    }
}

/// The central request/response dispatcher.
///
/// # Thread Safety
///
/// `Dispatcher` is `Send + Sync`. Registration takes a write lock on the
/// route table and lookups take a read lock, so routes may be added while
/// messages are being delivered. No lock is held across an await.
pub struct Dispatcher {
    transport: BoxedTransport,
    strategy: InvocationStrategy,
    routes: RwLock<RouteTable>,
    debug_topic: RwLock<Option<Topic>>,
    services: RwLock<Arc<Services>>,
    cancellation: CancellationToken,
}

impl Dispatcher {
    /// Creates a dispatcher publishing through `transport`.
    pub fn new(transport: BoxedTransport, strategy: InvocationStrategy) -> Self {
        Self {
            transport,
            strategy,
            routes: RwLock::new(RouteTable::new()),
            debug_topic: RwLock::new(None),
            services: RwLock::new(Arc::new(Services::new())),
            cancellation: CancellationToken::new(),
        }
    }

    /// Uses `token` as the parent of every request's cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// The invocation strategy.
    pub fn strategy(&self) -> InvocationStrategy {
        self.strategy
    }

    /// The underlying transport.
    pub fn transport(&self) -> &BoxedTransport {
        &self.transport
    }

    /// Mirrors every response to `name`. An empty name disables mirroring.
    pub fn set_debug_topic(&self, name: impl Into<String>, qos: QoS) {
        let topic = Topic::new(name, qos);
        *self.debug_topic.write() = (!topic.is_empty()).then_some(topic);
    }

    /// The configured debug topic.
    pub fn debug_topic(&self) -> Option<Topic> {
        self.debug_topic.read().clone()
    }

    /// Makes `value` available to injected handlers as [`Service<T>`](crate::Service).
    ///
    /// Providing another value of the same type replaces it for later
    /// invocations; invocations already running keep their snapshot.
    pub fn provide<T: Send + Sync + 'static>(&self, value: T) {
        let mut guard = self.services.write();
        let mut services = Services::clone(&guard);
        services.provide(value);
        *guard = Arc::new(services);
    }

    /// Appends a route for `topic_name` and subscribes to it.
    ///
    /// The route is in the table before the subscribe request goes out, so
    /// messages the broker delivers while subscribing (retained ones) are
    /// routed. A subscribe failure does not fail registration: it is logged
    /// and recorded on the route, which then keeps its slot without ever
    /// being matched. Only a handler of the wrong variant is rejected.
    pub async fn register_route(
        self: &Arc<Self>,
        topic_name: &str,
        qos: QoS,
        handler: Handler,
    ) -> RouteResult<()> {
        if handler.strategy() != self.strategy {
            return Err(RouteError::StrategyMismatch {
                expected: self.strategy,
                got: handler.strategy(),
            });
        }

        let slot = self
            .routes
            .write()
            .push(Route::new(Topic::new(topic_name, qos), handler));

        let callback: Arc<dyn MessageHandler> = Arc::clone(self) as Arc<dyn MessageHandler>;
        match self.transport.subscribe(topic_name, qos, callback).await {
            Ok(()) => info!(topic = topic_name, %qos, "Subscribed to topic"),
            Err(e) => {
                error!(topic = topic_name, error = %e, "Error subscribing to topic");
                self.routes.write().mark_failed(slot, e);
            }
        }
        Ok(())
    }

    /// Looks up the route for an inbound topic name.
    pub fn find_route(&self, topic_name: &str) -> Option<Route> {
        self.routes.read().find(topic_name).cloned()
    }

    /// Number of registered routes, inert ones included.
    pub fn route_count(&self) -> usize {
        self.routes.read().len()
    }

    /// Builds the conversation for an inbound message.
    pub fn conversation(&self, topic: Topic, payload: &[u8]) -> Conversation {
        let request = Request::new(topic, payload).with_cancellation(self.cancellation.child_token());
        Conversation::new(request, Responder::new(Arc::clone(&self.transport), self.debug_topic()))
    }

    /// Runs one inbound message through build, route and invoke.
    pub async fn handle_message(&self, topic: &str, qos: QoS, payload: &[u8]) -> DispatchOutcome {
        let span = span!(Level::DEBUG, "dispatch", topic = %topic, %qos);
        self.dispatch(topic, qos, payload).instrument(span).await
    }

    async fn dispatch(&self, topic: &str, qos: QoS, payload: &[u8]) -> DispatchOutcome {
        let conversation = self.conversation(Topic::new(topic, qos), payload);

        let Some(route) = self.find_route(topic) else {
            trace!(len = payload.len(), "No route for topic, dropping message");
            return DispatchOutcome::Dropped;
        };

        let services = Arc::clone(&self.services.read());
        match route.handler().invoke(conversation, services).await {
            Ok(()) => {
                debug!("Handler completed");
                DispatchOutcome::Handled
            }
            Err(e) => {
                error!(error = %e, "Error invoking handler");
                DispatchOutcome::Failed(e)
            }
        }
    }
}

#[async_trait]
impl MessageHandler for Dispatcher {
    async fn on_message(&self, topic: &str, qos: QoS, payload: &[u8]) {
        self.handle_message(topic, qos, payload).await;
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("strategy", &self.strategy)
            .field("route_count", &self.route_count())
            .field("debug_topic", &self.debug_topic())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use mrr_transport::MemoryTransport;

    use crate::error::{ExtractError, HandlerResult};
    use crate::extractor::Service;

    fn setup(strategy: InvocationStrategy) -> (Arc<MemoryTransport>, Arc<Dispatcher>) {
        let transport = Arc::new(MemoryTransport::new());
        let dispatcher = Arc::new(Dispatcher::new(transport.clone(), strategy));
        (transport, dispatcher)
    }

    fn counting(counter: &Arc<AtomicUsize>, step: usize) -> Handler {
        let counter = Arc::clone(counter);
        Handler::direct(move |conv: Conversation| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(step, Ordering::SeqCst);
                conv.string(200, "ok").await?;
                HandlerResult::Ok(())
            }
        })
    }

    #[tokio::test]
    async fn test_register_subscribes() {
        let (transport, dispatcher) = setup(InvocationStrategy::Direct);
        let counter = Arc::new(AtomicUsize::new(0));
        dispatcher
            .register_route("a", QoS::AtLeastOnce, counting(&counter, 1))
            .await
            .unwrap();

        assert_eq!(
            transport.subscriptions(),
            vec![("a".to_owned(), QoS::AtLeastOnce)]
        );
        assert_eq!(dispatcher.route_count(), 1);
    }

    #[tokio::test]
    async fn test_routes_by_exact_name() {
        let (transport, dispatcher) = setup(InvocationStrategy::Direct);
        let a = Arc::new(AtomicUsize::new(0));
        let b = Arc::new(AtomicUsize::new(0));
        dispatcher
            .register_route("t1", QoS::AtMostOnce, counting(&a, 1))
            .await
            .unwrap();
        dispatcher
            .register_route("t2", QoS::AtMostOnce, counting(&b, 1))
            .await
            .unwrap();

        transport.inject("t1", QoS::AtMostOnce, b"{}").await;
        assert_eq!((a.load(Ordering::SeqCst), b.load(Ordering::SeqCst)), (1, 0));
        transport.inject("t2", QoS::AtMostOnce, b"{}").await;
        assert_eq!((a.load(Ordering::SeqCst), b.load(Ordering::SeqCst)), (1, 1));
    }

    #[tokio::test]
    async fn test_shadowed_duplicate_never_runs() {
        let (transport, dispatcher) = setup(InvocationStrategy::Direct);
        let counter = Arc::new(AtomicUsize::new(0));
        dispatcher
            .register_route("dup", QoS::AtMostOnce, counting(&counter, 1))
            .await
            .unwrap();
        dispatcher
            .register_route("dup", QoS::AtMostOnce, counting(&counter, 100))
            .await
            .unwrap();

        // Both subscriptions deliver, both resolve to the first route.
        assert_eq!(transport.inject("dup", QoS::AtMostOnce, b"{}").await, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unroutable_topic_is_dropped() {
        let (transport, dispatcher) = setup(InvocationStrategy::Direct);
        let counter = Arc::new(AtomicUsize::new(0));
        dispatcher
            .register_route("known", QoS::AtMostOnce, counting(&counter, 1))
            .await
            .unwrap();

        let outcome = dispatcher
            .handle_message("unknown", QoS::AtMostOnce, b"{}")
            .await;
        assert!(outcome.is_dropped());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(transport.published().is_empty());
    }

    #[tokio::test]
    async fn test_failed_subscribe_records_error() {
        let transport = Arc::new(MemoryTransport::new().fail_subscribe("bad"));
        let dispatcher = Arc::new(Dispatcher::new(
            transport.clone(),
            InvocationStrategy::Direct,
        ));
        let counter = Arc::new(AtomicUsize::new(0));
        dispatcher
            .register_route("bad", QoS::AtMostOnce, counting(&counter, 1))
            .await
            .unwrap();

        assert_eq!(dispatcher.route_count(), 1);
        assert!(dispatcher.find_route("bad").is_none());
        let outcome = dispatcher.handle_message("bad", QoS::AtMostOnce, b"{}").await;
        assert!(outcome.is_dropped());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_handler_error_is_reported() {
        let (_transport, dispatcher) = setup(InvocationStrategy::Direct);
        dispatcher
            .register_route(
                "boom",
                QoS::AtMostOnce,
                Handler::direct(|_: Conversation| async {
                    HandlerResult::Err(HandlerError::custom("boom"))
                }),
            )
            .await
            .unwrap();

        let outcome = dispatcher.handle_message("boom", QoS::AtMostOnce, b"{}").await;
        assert!(matches!(outcome, DispatchOutcome::Failed(HandlerError::Custom(_))));
    }

    #[tokio::test]
    async fn test_malformed_payload_still_invokes() {
        let (transport, dispatcher) = setup(InvocationStrategy::Direct);
        let counter = Arc::new(AtomicUsize::new(0));
        dispatcher
            .register_route("a", QoS::AtMostOnce, counting(&counter, 1))
            .await
            .unwrap();

        let outcome = dispatcher.handle_message("a", QoS::AtMostOnce, b"not-json").await;
        assert!(outcome.is_handled());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(transport.published()[0].topic, "a/_response");
    }

    #[tokio::test]
    async fn test_debug_topic_mirrors_responses() {
        let (transport, dispatcher) = setup(InvocationStrategy::Direct);
        let counter = Arc::new(AtomicUsize::new(0));
        dispatcher
            .register_route("a", QoS::AtMostOnce, counting(&counter, 1))
            .await
            .unwrap();

        dispatcher.handle_message("a", QoS::AtMostOnce, b"{}").await;
        assert_eq!(transport.take_published().len(), 1);

        dispatcher.set_debug_topic("debug", QoS::AtMostOnce);
        dispatcher.handle_message("a", QoS::AtMostOnce, b"{}").await;
        let published = transport.take_published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[1].topic, "debug");

        dispatcher.set_debug_topic("", QoS::AtMostOnce);
        assert!(dispatcher.debug_topic().is_none());
    }

    #[tokio::test]
    async fn test_strategy_mismatch_rejected() {
        let (transport, dispatcher) = setup(InvocationStrategy::Injected);
        let counter = Arc::new(AtomicUsize::new(0));
        let result = dispatcher
            .register_route("a", QoS::AtMostOnce, counting(&counter, 1))
            .await;

        assert!(matches!(result, Err(RouteError::StrategyMismatch { .. })));
        assert!(transport.subscriptions().is_empty());
        assert_eq!(dispatcher.route_count(), 0);
    }

    struct Greeting(&'static str);

    async fn greet(conversation: Arc<Conversation>, greeting: Service<Greeting>) -> HandlerResult {
        let name = conversation.param_string("name");
        conversation
            .string(200, &format!("{} {name}", greeting.0))
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_injected_dispatch() {
        let (transport, dispatcher) = setup(InvocationStrategy::Injected);
        dispatcher.provide(Greeting("hello"));
        dispatcher.provide(Greeting("hi"));
        dispatcher
            .register_route("greet", QoS::AtMostOnce, Handler::injected(greet))
            .await
            .unwrap();

        let outcome = dispatcher
            .handle_message("greet", QoS::AtMostOnce, br#"{"name": "ada"}"#)
            .await;
        assert!(outcome.is_handled());
        assert_eq!(transport.published()[0].payload, b"hi ada");
    }

    #[tokio::test]
    async fn test_injected_unresolved_is_not_fatal() {
        let (transport, dispatcher) = setup(InvocationStrategy::Injected);
        dispatcher
            .register_route("greet", QoS::AtMostOnce, Handler::injected(greet))
            .await
            .unwrap();

        let outcome = dispatcher.handle_message("greet", QoS::AtMostOnce, b"{}").await;
        assert!(matches!(
            outcome,
            DispatchOutcome::Failed(HandlerError::Extract(ExtractError::Unresolved { .. }))
        ));
        assert!(transport.published().is_empty());
        assert_eq!(dispatcher.route_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_conversations_stay_isolated() {
        let (transport, dispatcher) = setup(InvocationStrategy::Injected);
        dispatcher.provide(Greeting("id"));
        dispatcher
            .register_route("greet", QoS::AtMostOnce, Handler::injected(greet))
            .await
            .unwrap();

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    let payload = format!(r#"{{"name": "{i}", "_rt": "reply/{i}"}}"#);
                    dispatcher
                        .handle_message("greet", QoS::AtMostOnce, payload.as_bytes())
                        .await
                })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_handled());
        }

        let published = transport.published();
        assert_eq!(published.len(), 32);
        for message in published {
            let i = message.topic.strip_prefix("reply/").unwrap();
            assert_eq!(message.payload, format!("id {i}").into_bytes());
        }
    }

    /// Delivers a retained message from inside `subscribe`, the way a broker
    /// does right after acknowledging the subscription.
    struct RetainingTransport {
        retained: &'static [u8],
    }

    #[async_trait]
    impl mrr_core::Transport for RetainingTransport {
        async fn connect(&self) -> mrr_core::TransportResult<()> {
            Ok(())
        }

        async fn subscribe(
            &self,
            topic: &str,
            qos: QoS,
            handler: Arc<dyn MessageHandler>,
        ) -> mrr_core::TransportResult<()> {
            handler.on_message(topic, qos, self.retained).await;
            Ok(())
        }

        async fn publish(
            &self,
            _topic: &str,
            _qos: QoS,
            _retain: bool,
            _payload: &[u8],
        ) -> mrr_core::TransportResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_message_during_subscribe_is_routed() {
        let transport = Arc::new(RetainingTransport {
            retained: br#"{"mode": "eco"}"#,
        });
        let dispatcher = Arc::new(Dispatcher::new(transport, InvocationStrategy::Direct));
        let counter = Arc::new(AtomicUsize::new(0));
        dispatcher
            .register_route("cfg", QoS::AtLeastOnce, counting(&counter, 1))
            .await
            .unwrap();

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(dispatcher.find_route("cfg").is_some());
    }
}
