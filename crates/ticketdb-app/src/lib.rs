//! ticketdb application bootstrap
//!
//! Loads [`AppConfig`], installs logging, opens the connection pool and
//! ensures the schema before anything is served.

pub mod config;
pub mod logging;
pub mod services;

pub use config::{AppConfig, LoggingSettings};
pub use logging::LoggingConfig;
pub use services::{Models, Services};
