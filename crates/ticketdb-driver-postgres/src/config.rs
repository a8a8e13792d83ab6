//! PostgreSQL connection settings

use std::time::Duration;

use serde::{Deserialize, Serialize};
use ticketdb_core::{DbError, Result, TlsConfig, TlsMode};
use tokio_postgres::config::SslMode;

/// Where and how to connect to the ticket database.
///
/// Either `url` is set (a `postgres://` URL or key/value connection string),
/// or the individual fields are used. Fields in the URL win over the
/// corresponding fields here, except for `tls.mode`, which always applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
    pub password: Option<String>,
    pub connect_timeout_ms: u64,
    pub application_name: String,
    pub tls: TlsConfig,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "localhost".to_string(),
            port: 5432,
            dbname: "tickets".to_string(),
            user: "postgres".to_string(),
            password: None,
            connect_timeout_ms: 10_000,
            application_name: "ticketdb".to_string(),
            tls: TlsConfig::default(),
        }
    }
}

impl PostgresConfig {
    /// Build a configuration from a connection URL
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = tls;
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Check the settings and produce a `tokio_postgres::Config`
    pub fn to_pg_config(&self) -> Result<tokio_postgres::Config> {
        self.tls.validate()?;

        let mut config = match self.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.parse::<tokio_postgres::Config>().map_err(|e| {
                DbError::Configuration(format!("invalid connection string: {}", e))
            })?,
            _ => {
                if self.host.trim().is_empty() {
                    return Err(DbError::Configuration("host cannot be empty".into()));
                }
                if self.user.trim().is_empty() {
                    return Err(DbError::Configuration("user cannot be empty".into()));
                }
                let mut config = tokio_postgres::Config::new();
                config
                    .host(&self.host)
                    .port(self.port)
                    .dbname(&self.dbname)
                    .user(&self.user);
                if let Some(password) = &self.password {
                    config.password(password);
                }
                config
            }
        };

        if self.connect_timeout_ms > 0 {
            config.connect_timeout(self.connect_timeout());
        }
        if config.get_application_name().is_none() && !self.application_name.is_empty() {
            config.application_name(&self.application_name);
        }
        config.ssl_mode(ssl_mode(self.tls.mode));

        Ok(config)
    }

    /// Host/port/dbname for log fields, never the password
    pub fn describe(&self) -> String {
        match self.to_pg_config() {
            Ok(config) => {
                let host = config
                    .get_hosts()
                    .first()
                    .map(|host| match host {
                        tokio_postgres::config::Host::Tcp(name) => name.clone(),
                        #[cfg(unix)]
                        tokio_postgres::config::Host::Unix(path) => path.display().to_string(),
                    })
                    .unwrap_or_else(|| self.host.clone());
                let port = config.get_ports().first().copied().unwrap_or(self.port);
                let dbname = config.get_dbname().unwrap_or(&self.dbname);
                format!("{}:{}/{}", host, port, dbname)
            }
            Err(_) => format!("{}:{}/{}", self.host, self.port, self.dbname),
        }
    }
}

// tokio-postgres only negotiates; certificate checks live in the connector.
fn ssl_mode(mode: TlsMode) -> SslMode {
    match mode {
        TlsMode::Disable => SslMode::Disable,
        TlsMode::Prefer => SslMode::Prefer,
        TlsMode::Require | TlsMode::VerifyCa | TlsMode::VerifyFull => SslMode::Require,
    }
}
