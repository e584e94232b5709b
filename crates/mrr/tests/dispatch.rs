//! End-to-end dispatch behavior over the in-memory transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use mrr::prelude::*;
use mrr::transport::MemoryTransport;
use serde::Serialize;

fn dispatcher(transport: &Arc<MemoryTransport>) -> Arc<Dispatcher> {
    Arc::new(Dispatcher::new(
        Arc::clone(transport) as BoxedTransport,
        InvocationStrategy::Direct,
    ))
}

fn counting(counter: Arc<AtomicUsize>) -> Handler {
    Handler::direct(move |_conv: Conversation| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            HandlerResult::Ok(())
        }
    })
}

#[tokio::test]
async fn routes_match_only_their_own_topic() {
    let transport = Arc::new(MemoryTransport::new());
    let dispatcher = dispatcher(&transport);
    let a = Arc::new(AtomicUsize::new(0));
    let b = Arc::new(AtomicUsize::new(0));

    dispatcher
        .register_route("lights/on", QoS::AtMostOnce, counting(a.clone()))
        .await
        .unwrap();
    dispatcher
        .register_route("lights/off", QoS::AtMostOnce, counting(b.clone()))
        .await
        .unwrap();

    transport.inject("lights/on", QoS::AtMostOnce, b"{}").await;
    transport.inject("lights/on", QoS::AtMostOnce, b"{}").await;
    transport.inject("lights/off", QoS::AtMostOnce, b"{}").await;

    assert_eq!(a.load(Ordering::SeqCst), 2);
    assert_eq!(b.load(Ordering::SeqCst), 1);

    // wildcard-looking inbound names never cross-match
    let outcome = dispatcher
        .handle_message("lights/+", QoS::AtMostOnce, b"{}")
        .await;
    assert!(outcome.is_dropped());
}

#[tokio::test]
async fn first_registration_shadows_later_ones() {
    let transport = Arc::new(MemoryTransport::new());
    let dispatcher = dispatcher(&transport);
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    dispatcher
        .register_route("dup", QoS::AtMostOnce, counting(first.clone()))
        .await
        .unwrap();
    dispatcher
        .register_route("dup", QoS::AtMostOnce, counting(second.clone()))
        .await
        .unwrap();

    for _ in 0..3 {
        dispatcher.handle_message("dup", QoS::AtMostOnce, b"{}").await;
    }
    assert_eq!(first.load(Ordering::SeqCst), 3);
    assert_eq!(second.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn typed_parameters_reach_the_handler() {
    #[derive(Serialize)]
    struct Reading {
        value: f64,
        flag: bool,
        channel: u8,
    }

    let transport = Arc::new(MemoryTransport::new());
    let dispatcher = dispatcher(&transport);
    dispatcher
        .register_route(
            "sensors/1",
            QoS::AtLeastOnce,
            Handler::direct(|conv: Conversation| async move {
                let reading = Reading {
                    value: conv.param_f64("x"),
                    flag: conv.param_bool("flag"),
                    channel: conv.param_byte("ch"),
                };
                conv.json(200, &reading).await?;
                Ok::<_, HandlerError>(())
            }),
        )
        .await
        .unwrap();

    let cases: [(&[u8], f64); 3] = [
        (br#"{"x": "3.5"}"#, 3.5),
        (br#"{"x": 3.5}"#, 3.5),
        (br#"{"x": true}"#, 0.0),
    ];
    for (payload, expected) in cases {
        transport.inject("sensors/1", QoS::AtLeastOnce, payload).await;
        let published = transport.take_published();
        assert_eq!(published.len(), 1);
        let body: serde_json::Value = serde_json::from_slice(&published[0].payload).unwrap();
        assert_eq!(body["value"], serde_json::json!(expected));
    }

    transport
        .inject("sensors/1", QoS::AtLeastOnce, br#"{"flag": true, "ch": 2.0}"#)
        .await;
    let published = transport.take_published();
    let body: serde_json::Value = serde_json::from_slice(&published[0].payload).unwrap();
    assert_eq!(body["flag"], serde_json::json!(true));
    assert_eq!(
        body["channel"],
        serde_json::json!(2.0f64.to_bits().to_le_bytes()[0])
    );
}

#[tokio::test]
async fn replies_follow_response_topic_resolution() {
    let transport = Arc::new(MemoryTransport::new());
    let dispatcher = dispatcher(&transport);
    dispatcher
        .register_route(
            "sensors/1",
            QoS::AtLeastOnce,
            Handler::direct(|conv: Conversation| async move {
                conv.blob(200, b"ok").await?;
                Ok::<_, HandlerError>(())
            }),
        )
        .await
        .unwrap();

    transport.inject("sensors/1", QoS::AtLeastOnce, b"{}").await;
    transport
        .inject(
            "sensors/1",
            QoS::AtLeastOnce,
            br#"{"_rt": "custom/reply"}"#,
        )
        .await;

    let published = transport.take_published();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].topic, "sensors/1/_response");
    assert_eq!(published[0].qos, QoS::AtLeastOnce);
    assert_eq!(published[0].payload, b"ok");
    assert_eq!(published[1].topic, "custom/reply");
}

#[tokio::test]
async fn debug_topic_doubles_every_publish() {
    let transport = Arc::new(MemoryTransport::new());
    let dispatcher = dispatcher(&transport);
    dispatcher
        .register_route(
            "ping",
            QoS::AtMostOnce,
            Handler::direct(|conv: Conversation| async move {
                conv.string(200, "pong").await?;
                Ok::<_, HandlerError>(())
            }),
        )
        .await
        .unwrap();

    transport.inject("ping", QoS::AtMostOnce, b"{}").await;
    assert_eq!(transport.take_published().len(), 1);

    dispatcher.set_debug_topic("debug/mirror", QoS::AtMostOnce);
    transport.inject("ping", QoS::AtMostOnce, b"{}").await;
    let published = transport.take_published();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].topic, "ping/_response");
    assert_eq!(published[1].topic, "debug/mirror");
    assert_eq!(published[0].payload, published[1].payload);
}

#[tokio::test]
async fn malformed_payload_still_invokes_handler() {
    let transport = Arc::new(MemoryTransport::new());
    let dispatcher = dispatcher(&transport);
    let seen = Arc::new(AtomicUsize::new(0));
    dispatcher
        .register_route("cmd", QoS::AtMostOnce, {
            let seen = seen.clone();
            Handler::direct(move |conv: Conversation| {
                let seen = seen.clone();
                async move {
                    assert!(conv.param("anything").is_none());
                    assert_eq!(conv.param_string("anything"), "");
                    assert_eq!(conv.param_i64("anything"), 0);
                    seen.fetch_add(1, Ordering::SeqCst);
                    HandlerResult::Ok(())
                }
            })
        })
        .await
        .unwrap();

    let outcome = dispatcher
        .handle_message("cmd", QoS::AtMostOnce, b"not-json")
        .await;
    assert!(outcome.is_handled());
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unroutable_topic_is_silent() {
    let transport = Arc::new(MemoryTransport::new());
    let dispatcher = dispatcher(&transport);
    let count = Arc::new(AtomicUsize::new(0));
    dispatcher
        .register_route("known", QoS::AtMostOnce, counting(count.clone()))
        .await
        .unwrap();
    dispatcher.set_debug_topic("debug", QoS::AtMostOnce);

    let outcome = dispatcher
        .handle_message("unknown", QoS::AtMostOnce, b"{}")
        .await;
    assert!(outcome.is_dropped());
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert!(transport.published().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_requests_keep_their_own_reply_topics() {
    let transport = Arc::new(MemoryTransport::new());
    let dispatcher = Arc::new(
        Dispatcher::new(
            Arc::clone(&transport) as BoxedTransport,
            InvocationStrategy::Injected,
        ),
    );
    dispatcher.provide(String::from("svc"));

    async fn reply(conv: Arc<Conversation>, params: Params, name: Service<String>) -> HandlerResult {
        let id = params.i64("id");
        tokio::task::yield_now().await;
        conv.string(200, &format!("{}:{id}", name.as_str())).await?;
        Ok(())
    }

    dispatcher
        .register_route("work", QoS::AtMostOnce, Handler::injected(reply))
        .await
        .unwrap();

    let jobs = (0..16).map(|id| {
        let dispatcher = Arc::clone(&dispatcher);
        tokio::spawn(async move {
            let payload = format!(r#"{{"id": {id}, "_rt": "reply/{id}"}}"#);
            dispatcher
                .handle_message("work", QoS::AtMostOnce, payload.as_bytes())
                .await
        })
    });
    for outcome in futures::future::join_all(jobs).await {
        assert!(outcome.unwrap().is_handled());
    }

    let mut published = transport.published();
    assert_eq!(published.len(), 16);
    published.sort_by(|a, b| a.topic.cmp(&b.topic));
    for message in published {
        let id = message.topic.trim_start_matches("reply/");
        assert_eq!(message.payload, format!("svc:{id}").into_bytes());
    }
}

#[tokio::test]
async fn runtime_wires_config_into_dispatch() {
    let mut config = MrrConfig::default();
    config.dispatch.debug_topic = "debug/all".into();
    let transport = Arc::new(MemoryTransport::loopback());

    let runtime = MrrRuntime::builder()
        .config(config)
        .without_logging()
        .build(Arc::clone(&transport) as BoxedTransport)
        .unwrap();
    runtime.connect().await.unwrap();
    runtime
        .route(
            "echo",
            QoS::AtMostOnce,
            Handler::direct(|conv: Conversation| async move {
                let text = conv.param_string("text");
                conv.string(200, &text).await?;
                Ok::<_, HandlerError>(())
            }),
        )
        .await
        .unwrap();

    transport
        .inject("echo", QoS::AtMostOnce, br#"{"text": "hi"}"#)
        .await;
    let topics: Vec<_> = transport
        .published()
        .into_iter()
        .map(|m| (m.topic, m.payload))
        .collect();
    assert_eq!(
        topics,
        vec![
            ("echo/_response".to_string(), b"hi".to_vec()),
            ("debug/all".to_string(), b"hi".to_vec()),
        ]
    );
}
