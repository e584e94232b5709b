//! Configuration module for the mrr runtime.
//!
//! Layered loading (defaults, files, environment, overrides) is handled by
//! [`ConfigLoader`]; [`validate_config`] rejects settings the dispatcher
//! cannot work with.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BrokerConfig, DispatchConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, MrrConfig,
    SpanEventConfig,
};
pub use validation::validate_config;
