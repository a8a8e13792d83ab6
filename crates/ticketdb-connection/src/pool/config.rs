//! Pool configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};
use ticketdb_core::{DbError, Result};

/// Configuration for the connection pool
///
/// Controls pool sizing, timeouts, initialization retries and connection
/// lifecycle. Missing fields fall back to [`PoolConfig::default`] when
/// deserialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of connections opened when the pool is initialized
    min_size: usize,
    /// Maximum number of connections leased at the same time
    max_size: usize,
    /// Timeout in milliseconds when acquiring a connection from the pool
    acquire_timeout_ms: u64,
    /// Timeout in milliseconds before an idle connection is closed
    idle_timeout_ms: u64,
    /// Maximum lifetime of a connection in milliseconds before it's recycled
    max_lifetime_ms: Option<u64>,
    /// Attempts made to open the initial connections
    init_attempts: u32,
    /// Fixed delay in milliseconds between initialization attempts
    init_retry_delay_ms: u64,
}

impl PoolConfig {
    /// Create a new pool configuration with the given min and max sizes
    ///
    /// # Panics
    ///
    /// Panics if `min_size > max_size` or if `max_size` is 0.
    pub fn new(min_size: usize, max_size: usize) -> Self {
        assert!(
            max_size > 0,
            "max_size must be greater than 0, got {}",
            max_size
        );
        assert!(
            min_size <= max_size,
            "min_size ({}) cannot exceed max_size ({})",
            min_size,
            max_size
        );

        Self {
            min_size,
            max_size,
            acquire_timeout_ms: 30_000,
            idle_timeout_ms: 600_000,
            max_lifetime_ms: None,
            init_attempts: 3,
            init_retry_delay_ms: 1_000,
        }
    }

    /// Set the acquire timeout in milliseconds
    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    /// Set the idle timeout in milliseconds
    pub fn with_idle_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.idle_timeout_ms = timeout_ms;
        self
    }

    /// Set the maximum connection lifetime in milliseconds
    pub fn with_max_lifetime_ms(mut self, lifetime_ms: u64) -> Self {
        self.max_lifetime_ms = Some(lifetime_ms);
        self
    }

    /// Set how many times initialization is attempted (at least once)
    pub fn with_init_attempts(mut self, attempts: u32) -> Self {
        self.init_attempts = attempts.max(1);
        self
    }

    /// Set the delay between initialization attempts in milliseconds
    pub fn with_init_retry_delay_ms(mut self, delay_ms: u64) -> Self {
        self.init_retry_delay_ms = delay_ms;
        self
    }

    /// Check a configuration that did not come through [`PoolConfig::new`]
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(DbError::Configuration(
                "pool max_size must be greater than 0".to_string(),
            ));
        }
        if self.min_size > self.max_size {
            return Err(DbError::Configuration(format!(
                "pool min_size ({}) cannot exceed max_size ({})",
                self.min_size, self.max_size
            )));
        }
        if self.init_attempts == 0 {
            return Err(DbError::Configuration(
                "pool init_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the minimum pool size
    pub fn min_size(&self) -> usize {
        self.min_size
    }

    /// Get the maximum pool size
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Get the acquire timeout as a Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Get the idle timeout as a Duration
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Get the maximum lifetime as a Duration if set
    pub fn max_lifetime(&self) -> Option<Duration> {
        self.max_lifetime_ms.map(Duration::from_millis)
    }

    pub fn init_attempts(&self) -> u32 {
        self.init_attempts.max(1)
    }

    pub fn init_retry_delay(&self) -> Duration {
        Duration::from_millis(self.init_retry_delay_ms)
    }
}

impl Default for PoolConfig {
    /// Create a default pool configuration
    ///
    /// Defaults:
    /// - min_size: 1
    /// - max_size: 10
    /// - acquire_timeout: 30 seconds
    /// - idle_timeout: 10 minutes
    /// - max_lifetime: None
    /// - init_attempts: 3, one second apart
    fn default() -> Self {
        Self::new(1, 10)
    }
}
