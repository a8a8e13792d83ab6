//! When and how failed attempts are retried

use std::time::Duration;

use serde::{Deserialize, Serialize};
use ticketdb_core::{DbError, FailureClass, Result};

use super::BackoffStrategy;

/// What the executor should do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait, reinitialize the pool, then try again
    Reconnect(Duration),
    /// Wait, then try again on whatever connection the pool hands out
    Retry(Duration),
    /// Surface the failure to the caller
    GiveUp,
}

/// Retry configuration for statement execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per statement, including the first
    max_attempts: u32,
    /// Backoff for connection-level failures
    backoff: BackoffStrategy,
    /// Retry permanent failures such as constraint violations too
    retry_on_query_error: bool,
    /// Flat delay in milliseconds before retrying any non-connection failure
    query_error_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: BackoffStrategy) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            retry_on_query_error: true,
            query_error_delay_ms: 500,
        }
    }

    /// The default policy, except permanent failures are returned after
    /// the first attempt
    pub fn classified() -> Self {
        Self::default().with_retry_on_query_error(false)
    }

    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self::new(1, BackoffStrategy::default())
    }

    /// Set whether permanent failures are retried (default: true)
    ///
    /// A permanent failure such as a constraint violation repeats on every
    /// attempt, so retrying it only delays the error.
    pub fn with_retry_on_query_error(mut self, retry: bool) -> Self {
        self.retry_on_query_error = retry;
        self
    }

    pub fn with_query_error_delay_ms(mut self, delay_ms: u64) -> Self {
        self.query_error_delay_ms = delay_ms;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn backoff(&self) -> &BackoffStrategy {
        &self.backoff
    }

    pub fn retry_on_query_error(&self) -> bool {
        self.retry_on_query_error
    }

    pub fn query_error_delay(&self) -> Duration {
        Duration::from_millis(self.query_error_delay_ms)
    }

    /// Check a deserialized policy
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(DbError::Configuration(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        if self.backoff.base_delay() > self.backoff.max_delay() {
            return Err(DbError::Configuration(format!(
                "retry base delay ({:?}) exceeds max delay ({:?})",
                self.backoff.base_delay(),
                self.backoff.max_delay()
            )));
        }
        Ok(())
    }

    /// Decide what follows the failure of attempt number `attempt` (1-based)
    ///
    /// Connection-level failures wait for the backoff and reinitialize the
    /// pool. Every other failure waits the flat `query_error_delay`.
    pub fn decide(&self, error: &DbError, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts() {
            return RetryDecision::GiveUp;
        }

        match error {
            DbError::PoolClosed | DbError::PoolInitialization { .. } => {
                return RetryDecision::GiveUp;
            }
            DbError::Configuration(_) | DbError::Tls(_) => return RetryDecision::GiveUp,
            _ => {}
        }

        if error.is_connection_error() {
            return RetryDecision::Reconnect(self.backoff.delay_after(attempt));
        }

        match error.failure_class() {
            FailureClass::Permanent if !self.retry_on_query_error => RetryDecision::GiveUp,
            _ => RetryDecision::Retry(self.query_error_delay()),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, BackoffStrategy::default())
    }
}
