//! ticketdb connection - pooling, leasing and resilient query execution
//!
//! Every data-access model goes through [`QueryExecutor`]; it leases a
//! connection from the [`ConnectionPool`], runs the statement in its own
//! transaction and retries according to the [`RetryPolicy`].

pub mod executor;
pub mod pool;
pub mod retry;
pub mod schema;

#[cfg(test)]
pub(crate) mod testing;

pub use executor::{Execute, QueryExecutor};
pub use pool::{ConnectionPool, Lease, PoolConfig, PoolStats};
pub use retry::{BackoffKind, BackoffStrategy, RetryDecision, RetryPolicy};
pub use schema::{Relation, SchemaInitializer};
