//! Echo Service Example
//!
//! Runs an mrr service and a small client against the in-memory loopback
//! broker:
//!
//! ```text
//! client ── echo {"text": "..."} ─────────▶ echo handler
//! client ◀─ echo/_response ─────────────── conversation.json()
//! client ── stats {"_rt": "client/stats"} ▶ stats handler
//! client ◀─ client/stats ───────────────── conversation.json()
//! ```
//!
//! # Usage
//!
//! ```bash
//! MRR_LOGGING__LEVEL=debug cargo run --package echo-service
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use mrr::prelude::*;
use mrr::transport::MemoryTransport;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Number of echo requests served so far.
#[derive(Default)]
struct EchoCount(AtomicUsize);

// ============================================================================
// Handlers
// ============================================================================

/// Replies with the `text` parameter and a running count.
async fn echo(
    conv: Arc<Conversation>,
    params: Params,
    count: Service<EchoCount>,
) -> HandlerResult {
    let n = count.0.fetch_add(1, Ordering::SeqCst) + 1;
    let reply = serde_json::json!({
        "text": params.string("text"),
        "count": n,
    });
    conv.json(200, &reply).await?;
    Ok(())
}

/// Reports how many echoes were served.
async fn stats(conv: Arc<Conversation>, count: Service<EchoCount>) -> HandlerResult {
    let served = count.0.load(Ordering::SeqCst);
    conv.json_pretty(200, &serde_json::json!({ "served": served }), "  ")
        .await?;
    Ok(())
}

// ============================================================================
// Client side
// ============================================================================

/// Forwards every reply it receives to a channel.
struct ReplyCollector(mpsc::UnboundedSender<(String, Vec<u8>)>);

#[async_trait]
impl MessageHandler for ReplyCollector {
    async fn on_message(&self, topic: &str, _qos: QoS, payload: &[u8]) {
        let _ = self.0.send((topic.to_string(), payload.to_vec()));
    }
}

async fn await_replies(rx: &mut mpsc::UnboundedReceiver<(String, Vec<u8>)>, n: usize) {
    for _ in 0..n {
        match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Some((topic, payload))) => {
                info!(%topic, reply = %String::from_utf8_lossy(&payload), "Reply received");
            }
            Ok(None) => return,
            Err(_) => {
                warn!("Timed out waiting for a reply");
                return;
            }
        }
    }
}

async fn run_client(
    transport: Arc<MemoryTransport>,
    shutdown: mrr::core::CancellationToken,
) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let collector: Arc<dyn MessageHandler> = Arc::new(ReplyCollector(tx));
    transport
        .subscribe("echo/_response", QoS::AtMostOnce, Arc::clone(&collector))
        .await?;
    transport
        .subscribe("client/stats", QoS::AtMostOnce, collector)
        .await?;

    for text in ["hello", "mrr", "goodbye"] {
        let body = serde_json::json!({ "text": text }).to_string();
        transport
            .publish("echo", QoS::AtMostOnce, false, body.as_bytes())
            .await?;
    }
    await_replies(&mut rx, 3).await;

    transport
        .publish("stats", QoS::AtMostOnce, false, br#"{"_rt": "client/stats"}"#)
        .await?;
    await_replies(&mut rx, 1).await;

    shutdown.cancel();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let transport = Arc::new(MemoryTransport::loopback());

    let mut config = mrr::runtime::config::load_config()?;
    config.dispatch.strategy = InvocationStrategy::Injected;
    let runtime = MrrRuntime::builder()
        .config(config)
        .build(Arc::clone(&transport) as BoxedTransport)?;

    runtime.provide(EchoCount::default());
    runtime.connect().await?;
    runtime
        .route("echo", QoS::AtMostOnce, Handler::injected(echo))
        .await?;
    runtime
        .route("stats", QoS::AtMostOnce, Handler::injected(stats))
        .await?;

    let client = tokio::spawn(run_client(transport, runtime.shutdown_token()));
    runtime.run().await?;
    client.await??;

    Ok(())
}
