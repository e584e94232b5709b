//! Configuration schema definitions.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use mrr_core::QoS;
use mrr_framework::InvocationStrategy;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MrrConfig {
    /// Broker connection settings.
    #[serde(default)]
    pub broker: BrokerConfig,

    /// Dispatcher behavior.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// =============================================================================
// Broker
// =============================================================================

/// Client options for the broker connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker URL, e.g. `tcp://localhost:1883`.
    #[serde(default = "default_broker_url")]
    pub url: String,

    /// Client identifier presented to the broker.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Optional user name.
    #[serde(default)]
    pub username: Option<String>,

    /// Optional password; requires `username`.
    #[serde(default)]
    pub password: Option<String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url: default_broker_url(),
            client_id: default_client_id(),
            username: None,
            password: None,
        }
    }
}

fn default_broker_url() -> String {
    "tcp://localhost:1883".to_string()
}

fn default_client_id() -> String {
    "mrr".to_string()
}

// =============================================================================
// Dispatch
// =============================================================================

/// Dispatcher settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Topic every response is mirrored to; empty disables mirroring.
    #[serde(default)]
    pub debug_topic: String,

    /// QoS used for the debug mirror.
    #[serde(default)]
    pub debug_qos: QoS,

    /// Handler invocation strategy for the whole process.
    #[serde(default)]
    pub strategy: InvocationStrategy,
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the directive spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to a `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to `Full` otherwise.
    Json,
}

/// Output destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Base level; `RUST_LOG` takes precedence when set.
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, used when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include file and line of each event.
    #[serde(default)]
    pub file_location: bool,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Per-module levels, e.g. `mrr_framework = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}
