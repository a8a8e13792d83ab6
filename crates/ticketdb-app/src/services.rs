//! Startup and shutdown of the data-access stack

use std::sync::Arc;

use anyhow::{Context, Result};
use ticketdb_connection::{ConnectionPool, Execute, QueryExecutor, SchemaInitializer};
use ticketdb_driver_postgres::PostgresConnectionFactory;
use ticketdb_models::{
    AccountModel, AttachmentModel, AuditLog, CommentModel, ConsentModel, CustomFieldModel,
    MacroModel, SavedFilterModel, TicketModel,
};

use crate::config::AppConfig;

/// Every model, sharing one executor
#[derive(Clone)]
pub struct Models {
    pub accounts: AccountModel,
    pub tickets: TicketModel,
    pub comments: CommentModel,
    pub attachments: AttachmentModel,
    pub custom_fields: CustomFieldModel,
    pub macros: MacroModel,
    pub saved_filters: SavedFilterModel,
    pub audit: AuditLog,
    pub consents: ConsentModel,
}

impl Models {
    pub fn new(executor: Arc<dyn Execute>) -> Self {
        Self {
            accounts: AccountModel::new(executor.clone()),
            tickets: TicketModel::new(executor.clone()),
            comments: CommentModel::new(executor.clone()),
            attachments: AttachmentModel::new(executor.clone()),
            custom_fields: CustomFieldModel::new(executor.clone()),
            macros: MacroModel::new(executor.clone()),
            saved_filters: SavedFilterModel::new(executor.clone()),
            audit: AuditLog::new(executor.clone()),
            consents: ConsentModel::new(executor),
        }
    }
}

/// The running pool, its executor and the models built on it
pub struct Services {
    pool: Arc<ConnectionPool>,
    executor: Arc<QueryExecutor>,
    models: Models,
}

impl Services {
    /// Open the pool and ensure the schema exists.
    ///
    /// Startup fails if the pool cannot be initialized or any relation
    /// cannot be created; nothing is served in either case.
    #[tracing::instrument(skip_all, fields(database = %config.database.describe()))]
    pub async fn start(config: &AppConfig) -> Result<Self> {
        let factory = PostgresConnectionFactory::new(config.database.clone())
            .context("invalid database configuration")?;
        let pool = Arc::new(ConnectionPool::new(config.pool.clone(), factory));

        if let Err(err) = pool.initialize().await {
            pool.shutdown().await;
            return Err(err).context("failed to initialize the connection pool");
        }

        let executor = Arc::new(QueryExecutor::new(pool.clone(), config.retry.clone()));
        if let Err(err) = SchemaInitializer::new().ensure_schema(executor.as_ref()).await {
            pool.shutdown().await;
            return Err(err).context("failed to initialize the schema");
        }

        let models = Models::new(executor.clone());
        tracing::info!(stats = ?pool.stats(), "data-access layer ready");

        Ok(Self {
            pool,
            executor,
            models,
        })
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn executor(&self) -> Arc<QueryExecutor> {
        self.executor.clone()
    }

    pub fn models(&self) -> &Models {
        &self.models
    }

    pub async fn shutdown(self) {
        tracing::info!(stats = ?self.pool.stats(), "shutting down");
        self.pool.shutdown().await;
    }
}
