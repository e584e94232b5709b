//! Process-level orchestration: configuration, logging, connection and
//! shutdown around a single [`Dispatcher`].
//!
//! ```rust,ignore
//! use mrr_runtime::MrrRuntime;
//!
//! let runtime = MrrRuntime::builder()
//!     .config_file("config/mrr.toml")
//!     .build(transport)?;
//!
//! runtime.connect().await?;
//! runtime.route("sensors/read", QoS::AtLeastOnce, Handler::direct(read)).await?;
//! runtime.run().await?;
//! ```

use std::path::Path;
use std::sync::Arc;

use tokio::signal;
use tracing::info;

use mrr_core::{
    BoxedTransport, CancellationToken, ConnectionEvents, LoggingConnectionEvents, QoS,
    TransportError,
};
use mrr_framework::{Dispatcher, Handler};

use crate::config::{ConfigLoader, MrrConfig, validate_config};
use crate::error::RuntimeResult;
use crate::logging;

/// Owns the dispatcher for one broker connection.
pub struct MrrRuntime {
    config: MrrConfig,
    dispatcher: Arc<Dispatcher>,
    events: Arc<dyn ConnectionEvents>,
    shutdown: CancellationToken,
}

impl MrrRuntime {
    /// Creates a runtime builder.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Validates `config`, initializes logging and builds the dispatcher.
    pub fn from_config(config: &MrrConfig, transport: BoxedTransport) -> RuntimeResult<Self> {
        Self::assemble(config, transport, Arc::new(LoggingConnectionEvents), true)
    }

    fn assemble(
        config: &MrrConfig,
        transport: BoxedTransport,
        events: Arc<dyn ConnectionEvents>,
        init_logging: bool,
    ) -> RuntimeResult<Self> {
        validate_config(config)?;
        if init_logging {
            logging::init_from_config(&config.logging);
        }

        let shutdown = CancellationToken::new();
        let dispatcher = Dispatcher::new(transport, config.dispatch.strategy)
            .with_cancellation(shutdown.clone());
        dispatcher.set_debug_topic(config.dispatch.debug_topic.as_str(), config.dispatch.debug_qos);

        info!(
            broker = %config.broker.url,
            client_id = %config.broker.client_id,
            strategy = %config.dispatch.strategy,
            log_level = %config.logging.level,
            "Runtime initialized from configuration"
        );

        Ok(Self {
            config: config.clone(),
            dispatcher: Arc::new(dispatcher),
            events,
            shutdown,
        })
    }

    /// The configuration in effect.
    pub fn config(&self) -> &MrrConfig {
        &self.config
    }

    /// The dispatcher.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Connects the transport and fires `on_connect`.
    pub async fn connect(&self) -> RuntimeResult<()> {
        info!(broker = %self.config.broker.url, "Connecting to broker");
        self.dispatcher.transport().connect().await?;
        self.events.on_connect();
        Ok(())
    }

    /// Reports a dropped connection to the connection hooks.
    pub fn notify_connection_lost(&self, err: &TransportError) {
        self.events.on_connection_lost(err);
    }

    /// Registers a route on the dispatcher.
    pub async fn route(&self, topic: &str, qos: QoS, handler: Handler) -> RuntimeResult<()> {
        self.dispatcher.register_route(topic, qos, handler).await?;
        Ok(())
    }

    /// Makes `value` available to injected handlers.
    pub fn provide<T: Send + Sync + 'static>(&self, value: T) {
        self.dispatcher.provide(value);
    }

    /// Cancelling this token stops [`run`](Self::run) and every request's
    /// cancellation token.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Serves until Ctrl+C, SIGTERM or the shutdown token fires.
    pub async fn run(&self) -> RuntimeResult<()> {
        info!(routes = self.dispatcher.route_count(), "mrr runtime is now running");
        self.wait_for_shutdown().await?;
        self.shutdown.cancel();
        info!("Runtime stopped");
        Ok(())
    }

    async fn wait_for_shutdown(&self) -> RuntimeResult<()> {
        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
            tokio::select! {
                res = signal::ctrl_c() => {
                    res?;
                    info!("Received Ctrl+C, shutting down");
                }
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                _ = self.shutdown.cancelled() => info!("Shutdown requested"),
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                res = signal::ctrl_c() => {
                    res?;
                    info!("Received Ctrl+C, shutting down");
                }
                _ = self.shutdown.cancelled() => info!("Shutdown requested"),
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for MrrRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MrrRuntime")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for an [`MrrRuntime`] with custom configuration sources.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    config: Option<MrrConfig>,
    events: Arc<dyn ConnectionEvents>,
    init_logging: bool,
}

impl RuntimeBuilder {
    /// Creates a builder that loads configuration from the default
    /// locations and the environment, with logging connection hooks.
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            config: None,
            events: Arc::new(LoggingConnectionEvents),
            init_logging: true,
        }
    }

    /// Loads exactly this configuration file.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables the `MRR_*` environment layer.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Uses `config` as-is and skips every loader source.
    pub fn config(mut self, config: MrrConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replaces the default logging connection hooks.
    pub fn connection_events(mut self, events: impl ConnectionEvents + 'static) -> Self {
        self.events = Arc::new(events);
        self
    }

    /// Leaves the global `tracing` subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    /// Loads configuration and builds the runtime around `transport`.
    pub fn build(self, transport: BoxedTransport) -> RuntimeResult<MrrRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_loader.load()?,
        };
        MrrRuntime::assemble(&config, transport, self.events, self.init_logging)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
