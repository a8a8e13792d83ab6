//! Process-wide bounded connection pool
//!
//! The pool is created lazily and opened by [`ConnectionPool::initialize`].
//! Callers lease connections, and a lease hands its connection back when it
//! is released or dropped. When connections die the pool can be
//! reinitialized; each reinitialization starts a new generation and
//! connections from older generations are discarded when they come back.
//!
//! # Example
//!
//! ```ignore
//! use ticketdb_connection::pool::{ConnectionPool, PoolConfig};
//!
//! let config = PoolConfig::new(1, 20)
//!     .with_acquire_timeout_ms(5000)
//!     .with_init_attempts(3);
//!
//! let pool = ConnectionPool::new(config, connection_factory);
//! pool.initialize().await?;
//! let lease = pool.acquire().await?;
//! // Use connection...
//! lease.release().await;
//! ```

mod config;
mod lease;
mod pool;
mod stats;


pub use config::PoolConfig;
pub use lease::Lease;
pub use pool::ConnectionPool;
pub use stats::PoolStats;
