//! Logging and tracing setup for the ticketdb service
//!
//! Libraries only emit `tracing` events; this module installs the
//! subscriber. It supports:
//! - Pretty console output
//! - A daily-rotated JSON file for production debugging
//! - `RUST_LOG` overriding the configured filter

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::LoggingSettings;

/// Resolved logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory where the JSON log is written
    pub log_dir: PathBuf,

    /// Whether to write JSON logs to a file
    pub enable_json_logs: bool,

    /// Whether to write pretty console output
    pub enable_console_logs: bool,

    /// Whether to include file/line information in console logs
    pub include_location: bool,

    /// Whether to log span open/close (executor attempts, pool init)
    pub enable_spans: bool,

    /// Default filter when `RUST_LOG` is unset
    pub default_filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: log_directory(),
            enable_json_logs: false,
            enable_console_logs: true,
            include_location: cfg!(debug_assertions),
            enable_spans: false,
            default_filter: LoggingSettings::default().level,
        }
    }
}

impl LoggingConfig {
    /// Build from the `[logging]` section of the application config
    pub fn from_settings(settings: &LoggingSettings) -> Self {
        Self {
            log_dir: settings.directory.clone().unwrap_or_else(log_directory),
            enable_json_logs: settings.json_file,
            default_filter: settings.level.clone(),
            ..Self::default()
        }
    }

    /// Console only, no files
    pub fn testing() -> Self {
        Self {
            enable_json_logs: false,
            include_location: true,
            enable_spans: true,
            default_filter: "debug".to_string(),
            ..Self::default()
        }
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the JSON writer on drop; keep it alive for the
/// life of the process. Fails if a subscriber is already installed.
pub fn init(config: LoggingConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_filter))?;

    // NEW fires once when the span is created; ENTER would fire on every
    // re-poll of an awaited future.
    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let mut layers = Vec::new();
    let mut guard = None;

    if config.enable_console_logs {
        let console_layer = fmt::layer()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_span_events(span_events.clone())
            .with_ansi(true)
            .pretty()
            .with_filter(env_filter.clone())
            .boxed();

        layers.push(console_layer);
    }

    if config.enable_json_logs {
        std::fs::create_dir_all(&config.log_dir)?;

        let file_appender = tracing_appender::rolling::daily(&config.log_dir, "ticketdb.log");
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(worker_guard);

        let json_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(span_events)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(non_blocking)
            .with_filter(env_filter)
            .boxed();

        layers.push(json_layer);
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::info!(
        log_dir = %config.log_dir.display(),
        json_enabled = config.enable_json_logs,
        console_enabled = config.enable_console_logs,
        "logging initialized"
    );

    Ok(guard)
}

/// Default directory for the JSON log
pub fn log_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ticketdb")
        .join("logs")
}
