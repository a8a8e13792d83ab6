//! PostgreSQL driver implementation

mod config;
mod connection;
mod error;
mod factory;
mod tls;

pub use config::PostgresConfig;
pub use connection::{PostgresConnection, PostgresTransaction};
pub use error::{classify_error, classify_sqlstate};
pub use factory::PostgresConnectionFactory;
pub use tls::{PostgresTlsConnector, TlsError};
