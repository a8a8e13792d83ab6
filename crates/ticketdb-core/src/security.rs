//! Security-related configuration types for backing-store connections

mod tls_config;

pub use tls_config::*;
