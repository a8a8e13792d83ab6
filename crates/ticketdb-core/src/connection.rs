//! Connection, transaction and factory traits implemented by drivers

use crate::{QueryOutcome, Result, Statement};
use async_trait::async_trait;
use std::sync::Arc;

/// A backing-store session.
///
/// A connection is used by one caller at a time; the pool guarantees that
/// exclusivity through leases, so implementations need not serialize calls
/// themselves.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g. "postgresql")
    fn driver_name(&self) -> &str;

    /// Execute a statement in autocommit mode
    async fn execute(&self, statement: &Statement) -> Result<QueryOutcome>;

    /// Begin a transaction on this connection
    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>>;

    /// Round-trip check used when validating idle connections
    async fn ping(&self) -> Result<()> {
        self.execute(&Statement::raw("SELECT 1")).await.map(|_| ())
    }

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// A database transaction
#[async_trait]
pub trait Transaction: Send + Sync {
    /// Execute a statement within the transaction
    async fn execute(&self, statement: &Statement) -> Result<QueryOutcome>;

    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Creates new connections to the configured backing store
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Create a new connection
    async fn create(&self) -> Result<Arc<dyn Connection>>;

    /// Validate that an idle connection is still usable
    ///
    /// Default implementation only checks the closed flag.
    async fn validate(&self, conn: &dyn Connection) -> bool {
        !conn.is_closed()
    }
}

#[async_trait]
impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        (**self).create().await
    }

    async fn validate(&self, conn: &dyn Connection) -> bool {
        (**self).validate(conn).await
    }
}
