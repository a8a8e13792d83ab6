//! Application configuration
//!
//! Loaded once at startup from a TOML file, then patched from the
//! environment. Every section is optional; missing keys take their defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use ticketdb_connection::{PoolConfig, RetryPolicy};
use ticketdb_driver_postgres::PostgresConfig;

/// Environment variable naming the configuration file
pub const CONFIG_PATH_VAR: &str = "TICKETDB_CONFIG";
/// Connection URL override for `[database]`
pub const DATABASE_URL_VAR: &str = "DATABASE_URL";
/// Filter override for `[logging] level`
pub const LOG_LEVEL_VAR: &str = "TICKETDB_LOG";

const DEFAULT_CONFIG_FILE: &str = "ticketdb.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: PostgresConfig,
    pub pool: PoolConfig,
    pub retry: RetryPolicy,
    pub logging: LoggingSettings,
}

/// The `[logging]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default `EnvFilter` directive; `RUST_LOG` still wins when set
    pub level: String,
    /// Write a daily-rotated JSON log file
    pub json_file: bool,
    /// Directory for the JSON log; defaults to the platform data directory
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info,ticketdb_connection=info,ticketdb_driver_postgres=info".to_string(),
            json_file: false,
            directory: None,
        }
    }
}

impl AppConfig {
    /// Load from the process environment
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Load using `env` to look up variables.
    ///
    /// The file named by `TICKETDB_CONFIG` must exist; without it,
    /// `ticketdb.toml` in the working directory is read if present and
    /// defaults are used otherwise.
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match env(CONFIG_PATH_VAR) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(env);
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(url) = env(DATABASE_URL_VAR).filter(|url| !url.is_empty()) {
            self.database.url = Some(url);
        }
        if let Some(level) = env(LOG_LEVEL_VAR).filter(|level| !level.is_empty()) {
            self.logging.level = level;
        }
    }

    /// Check every section before anything connects
    pub fn validate(&self) -> Result<()> {
        self.pool.validate().context("invalid [pool] section")?;
        self.retry.validate().context("invalid [retry] section")?;
        self.database
            .to_pg_config()
            .context("invalid [database] section")?;
        Ok(())
    }
}
