//! Configuration loading and resolution
//!
//! Every setting is resolved in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing TOML file is not an error: a warning is logged and the compiled
//! defaults are used. A TOML file that exists but cannot be parsed is.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const ENV_CONFIG_PATH: &str = "ARES_CONFIG";
/// Environment variable overriding the customization store host
pub const ENV_STORE_HOST: &str = "ARES_STORE_HOST";
/// Environment variable overriding the customization store port
pub const ENV_STORE_PORT: &str = "ARES_STORE_PORT";

/// Compiled defaults
pub const DEFAULT_STORE_HOST: &str = "localhost";
pub const DEFAULT_STORE_PORT: u16 = 23409;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 1;
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Contents of `ares.toml`
///
/// All sections are optional; omitted keys fall back to compiled defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub store: StoreSection,
    pub reconcile: ReconcileSection,
    pub logging: LoggingConfig,
}

/// `[store]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub timeout_secs: Option<u64>,
    pub health_timeout_secs: Option<u64>,
}

/// `[reconcile]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSection {
    /// Maximum number of artists reconciled in parallel
    pub concurrency: Option<usize>,
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Connection settings for the customization store
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSettings {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
    pub health_timeout: Duration,
}

impl StoreSettings {
    /// Base URL without trailing slash, e.g. `http://localhost:23409`
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            host: DEFAULT_STORE_HOST.to_string(),
            port: DEFAULT_STORE_PORT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            health_timeout: Duration::from_secs(DEFAULT_HEALTH_TIMEOUT_SECS),
        }
    }
}

/// Fully resolved runtime configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub store: StoreSettings,
    pub concurrency: usize,
    pub log_level: String,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            store: StoreSettings::default(),
            concurrency: DEFAULT_CONCURRENCY,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// Platform config file location: `<config_dir>/ares/ares.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ares").join("ares.toml"))
}

/// Load a TOML config file
///
/// Returns defaults when the file does not exist.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(path = %path.display(), "Config file not found, using defaults");
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    debug!(path = %path.display(), "Loaded TOML config");
    Ok(config)
}

/// Resolve the runtime configuration from CLI, environment, TOML and defaults
pub fn resolve_config(overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    let config_path = overrides
        .config_path
        .clone()
        .or_else(|| std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from))
        .or_else(default_config_path);

    let toml_config = match config_path {
        Some(path) => load_toml_config(&path)?,
        None => {
            warn!("Could not determine config directory, using defaults");
            TomlConfig::default()
        }
    };

    let env_host = std::env::var(ENV_STORE_HOST).ok().filter(|h| !h.trim().is_empty());
    let env_port = match std::env::var(ENV_STORE_PORT) {
        Ok(value) => Some(value.trim().parse::<u16>().map_err(|e| {
            Error::Config(format!("{} is not a valid port ({}): {}", ENV_STORE_PORT, value, e))
        })?),
        Err(_) => None,
    };

    let host = overrides
        .host
        .clone()
        .or(env_host)
        .or(toml_config.store.host.clone())
        .unwrap_or_else(|| DEFAULT_STORE_HOST.to_string());
    let port = overrides
        .port
        .or(env_port)
        .or(toml_config.store.port)
        .unwrap_or(DEFAULT_STORE_PORT);

    let concurrency = toml_config
        .reconcile
        .concurrency
        .unwrap_or(DEFAULT_CONCURRENCY);
    if concurrency == 0 {
        return Err(Error::Config(
            "reconcile.concurrency must be at least 1".to_string(),
        ));
    }

    let resolved = ResolvedConfig {
        store: StoreSettings {
            host,
            port,
            timeout: Duration::from_secs(
                toml_config.store.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            health_timeout: Duration::from_secs(
                toml_config
                    .store
                    .health_timeout_secs
                    .unwrap_or(DEFAULT_HEALTH_TIMEOUT_SECS),
            ),
        },
        concurrency,
        log_level: toml_config.logging.level,
    };

    info!(
        store = %resolved.store.base_url(),
        concurrency = resolved.concurrency,
        "Configuration resolved"
    );
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: TomlConfig = toml::from_str("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_toml() {
        let config: TomlConfig = toml::from_str(
            r#"
            [store]
            port = 8080
            "#,
        )
        .unwrap();
        assert_eq!(config.store.port, Some(8080));
        assert_eq!(config.store.host, None);
        assert_eq!(config.reconcile.concurrency, None);
    }

    #[test]
    fn test_store_base_url() {
        let settings = StoreSettings {
            host: "media.local".to_string(),
            port: 5000,
            ..Default::default()
        };
        assert_eq!(settings.base_url(), "http://media.local:5000");
    }
}
