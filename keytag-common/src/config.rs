//! Configuration loading and resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables (`KEYTAG_WORKERS`, `KEYTAG_HEARTBEAT_SECS`, `KEYTAG_QUEUE_CAPACITY`)
//! 3. TOML config file
//! 4. Built-in defaults
//!
//! A missing TOML file at the default location is not an error: the server warns and
//! continues with defaults. A file named explicitly on the command line must exist.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable overriding the worker count
pub const ENV_WORKERS: &str = "KEYTAG_WORKERS";

/// Environment variable overriding the heartbeat period (seconds)
pub const ENV_HEARTBEAT_SECS: &str = "KEYTAG_HEARTBEAT_SECS";

/// Environment variable overriding the job queue capacity
pub const ENV_QUEUE_CAPACITY: &str = "KEYTAG_QUEUE_CAPACITY";

/// Default number of concurrent workers
pub const DEFAULT_WORKERS: usize = 4;

/// Default heartbeat period
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Worker pool size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Heartbeat period in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval_secs: Option<u64>,

    /// Job queue capacity (defaults to the worker count)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_capacity: Option<usize>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// `--workers` (clap also folds `KEYTAG_WORKERS` into this)
    pub workers: Option<usize>,

    /// `--config`
    pub config_path: Option<PathBuf>,
}

/// Fully resolved server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Number of concurrent workers
    pub workers: usize,

    /// Period between heartbeat messages
    pub heartbeat_interval: Duration,

    /// Maximum number of queued jobs before the reader blocks
    pub queue_capacity: usize,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            queue_capacity: DEFAULT_WORKERS,
            logging: LoggingConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Configuration with the given worker count and defaults elsewhere
    pub fn with_workers(workers: usize) -> Self {
        Self {
            workers,
            queue_capacity: workers,
            ..Self::default()
        }
    }

    /// Load and resolve the complete configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - An explicitly named config file is missing or unreadable
    /// - Any TOML file fails to parse
    /// - An environment override is not a number
    /// - The resolved values fail validation
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        let toml_config = match &overrides.config_path {
            Some(path) => Some(load_toml_config(path)?),
            None => match default_config_path() {
                Some(path) if path.exists() => Some(load_toml_config(&path)?),
                Some(path) => {
                    warn!(
                        "No config file at {}, using built-in defaults",
                        path.display()
                    );
                    None
                }
                None => {
                    warn!("Could not determine config directory, using built-in defaults");
                    None
                }
            },
        };

        Self::resolve(overrides, toml_config.as_ref())
    }

    /// Merge CLI overrides, environment and TOML over the built-in defaults
    pub fn resolve(overrides: &ConfigOverrides, toml_config: Option<&TomlConfig>) -> Result<Self> {
        let workers = match overrides.workers {
            Some(workers) => workers,
            None => env_number(ENV_WORKERS)?
                .or_else(|| toml_config.and_then(|c| c.workers))
                .unwrap_or(DEFAULT_WORKERS),
        };

        let heartbeat_secs = env_number::<u64>(ENV_HEARTBEAT_SECS)?
            .or_else(|| toml_config.and_then(|c| c.heartbeat_interval_secs))
            .unwrap_or(DEFAULT_HEARTBEAT_SECS);

        let queue_capacity = env_number(ENV_QUEUE_CAPACITY)?
            .or_else(|| toml_config.and_then(|c| c.queue_capacity))
            .unwrap_or(workers);

        let config = Self {
            workers,
            heartbeat_interval: Duration::from_secs(heartbeat_secs),
            queue_capacity,
            logging: toml_config.map(|c| c.logging.clone()).unwrap_or_default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".to_string()));
        }
        if self.heartbeat_interval < Duration::from_secs(1) {
            return Err(Error::Config(
                "heartbeat_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(Error::Config("queue_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Read and parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse TOML {}: {}", path.display(), e)))?;
    info!("Loaded TOML configuration from {}", path.display());
    Ok(config)
}

/// Write a TOML config file, creating parent directories
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize TOML: {}", e)))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// Platform config file location (`<config dir>/keytag/keytag.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("keytag").join("keytag.toml"))
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} is not a valid number: {:?}", name, value))),
        Err(_) => Ok(None),
    }
}
