//! Configuration validation.

use tracing::debug;

use super::error::{ConfigError, ConfigResult};
use super::schema::{BrokerConfig, DispatchConfig, LogOutput, LoggingConfig, MrrConfig};

const BROKER_SCHEMES: &[&str] = &["tcp", "ssl", "mqtt", "mqtts", "ws", "wss"];

/// Validates a loaded configuration.
pub fn validate_config(config: &MrrConfig) -> ConfigResult<()> {
    validate_broker(&config.broker)?;
    validate_dispatch(&config.dispatch)?;
    validate_logging(&config.logging)?;
    debug!("Configuration validated");
    Ok(())
}

fn validate_broker(broker: &BrokerConfig) -> ConfigResult<()> {
    let Some((scheme, rest)) = broker.url.split_once("://") else {
        return Err(ConfigError::invalid_url(&broker.url, "missing scheme"));
    };
    if !BROKER_SCHEMES.contains(&scheme) {
        return Err(ConfigError::invalid_url(
            &broker.url,
            format!("unsupported scheme '{scheme}'"),
        ));
    }
    if rest.is_empty() {
        return Err(ConfigError::invalid_url(&broker.url, "missing host"));
    }
    if broker.client_id.trim().is_empty() {
        return Err(ConfigError::missing_field("broker.client_id"));
    }
    if broker.password.is_some() && broker.username.is_none() {
        return Err(ConfigError::validation(
            "broker.password is set but broker.username is not",
        ));
    }
    Ok(())
}

fn validate_dispatch(dispatch: &DispatchConfig) -> ConfigResult<()> {
    if dispatch.debug_topic.contains(['+', '#']) {
        return Err(ConfigError::validation(format!(
            "dispatch.debug_topic '{}' must not contain wildcards",
            dispatch.debug_topic
        )));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    Ok(())
}
