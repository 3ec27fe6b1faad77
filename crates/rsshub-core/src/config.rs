use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::duration::parse_duration;

/// Environment variable overriding the tick period (duration string, e.g. `3m`)
pub const ENV_TIMER_INTERVAL: &str = "CLI_APP_TIMER_INTERVAL";
/// Environment variable overriding the initial worker count
pub const ENV_WORKERS_COUNT: &str = "CLI_APP_WORKERS_COUNT";
pub const ENV_DATABASE_PATH: &str = "RSSHUB_DATABASE_PATH";
pub const ENV_SOCKET_PATH: &str = "RSSHUB_SOCKET_PATH";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Data directory path
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Log level used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Initial tick period as a duration string (`3m`, `90s`)
    #[serde(default = "default_interval")]
    pub interval: String,
    /// Initial number of fetch workers
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            workers: default_workers(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file; defaults to `<data_dir>/rsshub.db`
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Control socket; defaults to `<data_dir>/rsshub.sock`
    #[serde(default)]
    pub socket_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_timeout(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rsshub")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_interval() -> String {
    "3m".to_string()
}

fn default_workers() -> usize {
    3
}

fn default_timeout() -> u64 {
    30
}

/// Expand tilde (~) in path to user's home directory
fn expand_tilde(path: &std::path::Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if let Some(stripped) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(stripped);
            }
        } else if path_str == "~" {
            if let Some(home) = dirs::home_dir() {
                return home;
            }
        }
    }
    path.to_path_buf()
}

impl AppConfig {
    /// Load configuration from file (if any), then apply environment overrides
    pub fn load() -> crate::Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup; empty values are ignored
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(interval) = lookup(ENV_TIMER_INTERVAL) {
            self.aggregator.interval = interval.trim().to_string();
        }
        if let Some(workers) = lookup(ENV_WORKERS_COUNT) {
            match workers.trim().parse() {
                Ok(n) => self.aggregator.workers = n,
                // Leave an invalid value visible to validate()
                Err(_) => self.aggregator.workers = 0,
            }
        }
        if let Some(path) = lookup(ENV_DATABASE_PATH) {
            self.database.path = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup(ENV_SOCKET_PATH) {
            self.control.socket_path = Some(PathBuf::from(path));
        }
    }

    /// Reject values the engine cannot start with
    pub fn validate(&self) -> crate::Result<()> {
        self.interval()?;
        if self.aggregator.workers < 1 {
            return Err(crate::Error::Config(format!(
                "{} must be a positive integer",
                ENV_WORKERS_COUNT
            )));
        }
        Ok(())
    }

    /// The configured tick period
    pub fn interval(&self) -> crate::Result<Duration> {
        let interval = parse_duration(&self.aggregator.interval)
            .map_err(|e| crate::Error::Config(e.to_string()))?;
        if interval.is_zero() {
            return Err(crate::Error::Config("interval must be positive".to_string()));
        }
        Ok(interval)
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("rsshub")
            .join("config.toml")
    }

    /// Get the database file path
    pub fn database_path(&self) -> PathBuf {
        match &self.database.path {
            Some(path) => expand_tilde(path),
            None => self.data_dir().join("rsshub.db"),
        }
    }

    /// Get the Unix socket path for the control channel
    pub fn socket_path(&self) -> PathBuf {
        match &self.control.socket_path {
            Some(path) => expand_tilde(path),
            None => self.data_dir().join("rsshub.sock"),
        }
    }

    /// Get the data directory (with tilde expansion)
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.general.data_dir)
    }
}
