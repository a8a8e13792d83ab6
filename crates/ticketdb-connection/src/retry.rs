//! Retry policy for statement execution
//!
//! This module decides whether a failed attempt is retried, how long to
//! wait first, and whether the pool must be reinitialized before the next
//! attempt.
//!
//! # Example
//!
//! ```ignore
//! use ticketdb_connection::retry::{BackoffStrategy, RetryPolicy};
//!
//! let policy = RetryPolicy::new(3, BackoffStrategy::linear(500, 10_000));
//! let executor = QueryExecutor::new(pool, policy);
//! ```

mod backoff;
mod policy;


pub use backoff::{BackoffKind, BackoffStrategy};
pub use policy::{RetryDecision, RetryPolicy};
