use std::sync::Arc;

use async_trait::async_trait;
use ticketdb_core::{Connection, ConnectionFactory, Result};

use crate::config::PostgresConfig;
use crate::connection::PostgresConnection;

/// Opens PostgreSQL sessions for the connection pool
#[derive(Debug, Clone)]
pub struct PostgresConnectionFactory {
    config: PostgresConfig,
}

impl PostgresConnectionFactory {
    /// Create a factory, rejecting settings that can never connect
    pub fn new(config: PostgresConfig) -> Result<Self> {
        config.to_pg_config()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PostgresConfig {
        &self.config
    }
}

#[async_trait]
impl ConnectionFactory for PostgresConnectionFactory {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        let connection = PostgresConnection::connect(&self.config).await?;
        Ok(Arc::new(connection))
    }
}
