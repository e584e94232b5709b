//! Layered `MrrConfig` loading on top of figment.
//!
//! # Sources, later ones winning
//!
//! 1. Built-in defaults
//! 2. Profile-specific config file (`mrr.{profile}.toml`)
//! 3. Main config file (`mrr.toml`)
//! 4. Environment variables (`MRR_*`)
//! 5. Programmatic overrides
//!
//! # Environment variables
//!
//! Variables use the `MRR_` prefix with `__` separating nested keys:
//!
//! - `MRR_BROKER__URL=tcp://broker:1883` → `broker.url`
//! - `MRR_DISPATCH__DEBUG_TOPIC=debug` → `dispatch.debug_topic`
//! - `MRR_LOGGING__LEVEL=debug` → `logging.level`
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: `mrr.toml`, `config.toml`
//! - `yaml-config`: `mrr.yaml`, `mrr.yml`, `config.yaml`, `config.yml`
//!
//! ```rust,ignore
//! let config = ConfigLoader::new()
//!     .file("./config/mrr.toml")
//!     .profile("production")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
#[cfg(any(feature = "yaml-config", feature = "toml-config"))]
use figment::providers::Format;
#[cfg(feature = "toml-config")]
use figment::providers::Toml;
#[cfg(feature = "yaml-config")]
use figment::providers::Yaml;
use figment::providers::{Env, Serialized};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::MrrConfig;

const ENV_PREFIX: &str = "MRR_";
const PROFILE_VAR: &str = "MRR_PROFILE";

/// Selects the optional `mrr.{profile}.toml` overlay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name, accepting the short forms `dev` and `prod`.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `MRR_PROFILE`, defaulting to development.
    pub fn from_env() -> Self {
        std::env::var(PROFILE_VAR)
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builder that merges every configuration source into an [`MrrConfig`].
pub struct ConfigLoader {
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader reading the profile from the environment.
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Searches `path` instead of the working and user config directories.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Disables the `MRR_*` environment layer.
    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a configuration on top of every other source.
    pub fn merge(mut self, config: MrrConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Merges every source and extracts the result.
    pub fn load(self) -> ConfigResult<MrrConfig> {
        let profile = self.profile.clone();
        let config: MrrConfig = self.build_figment()?.extract()?;

        debug!(
            %profile,
            broker = %config.broker.url,
            strategy = %config.dispatch.strategy,
            "Configuration loaded"
        );
        Ok(config)
    }

    fn build_figment(self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(MrrConfig::default()));

        if let Some(path) = &self.config_file {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.clone()));
            }
            info!(path = %path.display(), "Loading configuration file");
            figment = merge_config_file(figment, path)?;
        } else {
            figment = self.load_config_files(figment);
        }

        if self.load_env {
            trace!(prefix = ENV_PREFIX, "Loading environment variables");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment.merge(self.overrides))
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("mrr"));
        }
        paths
    }

    /// Tries `stem.{profile}.ext` then `stem.ext` in every search path; the
    /// first base file found ends the search.
    #[cfg(any(feature = "toml-config", feature = "yaml-config"))]
    fn load_format_files(
        &self,
        mut figment: Figment,
        search_paths: &[PathBuf],
        base_names: &[&str],
        merge_fn: fn(Figment, &Path) -> Figment,
    ) -> (Figment, bool) {
        for dir in search_paths {
            for base_name in base_names {
                let Some((stem, ext)) = base_name.rsplit_once('.') else {
                    continue;
                };
                let profile_path = dir.join(format!("{stem}.{}.{ext}", self.profile));
                if profile_path.exists() {
                    debug!(path = %profile_path.display(), "Loading profile-specific config");
                    figment = merge_fn(figment, &profile_path);
                }

                let base_path = dir.join(base_name);
                if base_path.exists() {
                    info!(path = %base_path.display(), "Loading configuration file");
                    return (merge_fn(figment, &base_path), true);
                }
            }
        }
        (figment, false)
    }

    #[allow(unused_mut)]
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        let search_paths = self.resolve_search_paths();
        let mut found = false;

        #[cfg(feature = "toml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["mrr.toml", "config.toml"],
                |fig, path| fig.merge(Toml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        #[cfg(feature = "yaml-config")]
        {
            let (f, ok) = self.load_format_files(
                figment,
                &search_paths,
                &["mrr.yaml", "mrr.yml", "config.yaml", "config.yml"],
                |fig, path| fig.merge(Yaml::file(path)),
            );
            figment = f;
            found |= ok;
        }

        if !found {
            warn!("No mrr config file found, running on defaults and environment");
        }
        figment
    }
}

fn merge_config_file(figment: Figment, path: &Path) -> ConfigResult<Figment> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext {
        #[cfg(feature = "toml-config")]
        "toml" => Ok(figment.merge(Toml::file(path))),
        #[cfg(feature = "yaml-config")]
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

/// Loads configuration from the default locations.
pub fn load_config() -> ConfigResult<MrrConfig> {
    ConfigLoader::new().load()
}

/// Loads configuration from `path` plus the environment.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<MrrConfig> {
    ConfigLoader::new().file(path).load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use mrr_core::QoS;
    use mrr_framework::InvocationStrategy;

    use crate::config::LogLevel;

    #[test]
    fn test_defaults_without_files() {
        Jail::expect_with(|jail| {
            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.broker.url, "tcp://localhost:1883");
            assert_eq!(config.logging.level, LogLevel::Info);
            assert!(config.dispatch.debug_topic.is_empty());
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_file_then_env_precedence() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "mrr.toml",
                r#"
                [broker]
                url = "tcp://file:1883"
                client_id = "from-file"

                [dispatch]
                debug_topic = "debug/out"
                debug_qos = 1
                strategy = "injected"
                "#,
            )?;
            jail.set_env("MRR_BROKER__CLIENT_ID", "from-env");

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.broker.url, "tcp://file:1883");
            assert_eq!(config.broker.client_id, "from-env");
            assert_eq!(config.dispatch.debug_topic, "debug/out");
            assert_eq!(config.dispatch.debug_qos, QoS::AtLeastOnce);
            assert_eq!(config.dispatch.strategy, InvocationStrategy::Injected);
            Ok(())
        });
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn test_profile_file_is_overridden_by_base() {
        Jail::expect_with(|jail| {
            jail.create_file("mrr.production.toml", "[logging]\nlevel = \"warn\"\nthread_ids = true\n")?;
            jail.create_file("mrr.toml", "[logging]\nlevel = \"debug\"\n")?;

            let config = ConfigLoader::new()
                .profile("prod")
                .search_path(jail.directory())
                .without_env()
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.logging.level, LogLevel::Debug);
            assert!(config.logging.thread_ids);
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        let result = ConfigLoader::new()
            .file("/definitely/not/here/mrr.toml")
            .without_env()
            .load();
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_programmatic_override_wins() {
        Jail::expect_with(|jail| {
            jail.set_env("MRR_BROKER__CLIENT_ID", "from-env");
            let mut overrides = MrrConfig::default();
            overrides.broker.client_id = "override".into();

            let config = ConfigLoader::new()
                .search_path(jail.directory())
                .merge(overrides)
                .load()
                .map_err(|e| e.to_string())?;
            assert_eq!(config.broker.client_id, "override");
            Ok(())
        });
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("PROD"), Profile::Production);
        assert_eq!(Profile::parse("dev"), Profile::Development);
        assert_eq!(Profile::parse("staging").as_str(), "staging");
    }
}
