//! Pool statistics types

use serde::{Deserialize, Serialize};

/// Statistics about a connection pool's current state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Total number of connections (idle + active)
    total: usize,
    /// Number of idle connections available in the pool
    idle: usize,
    /// Number of connections currently leased
    active: usize,
    /// Number of requests waiting for a connection
    waiting: usize,
    /// Current pool generation, bumped by every reinitialization
    generation: u64,
    /// Reinitializations performed since the pool was created
    reinitializations: u64,
}

impl PoolStats {
    /// Create new pool statistics
    pub fn new(total: usize, idle: usize, active: usize, waiting: usize) -> Self {
        Self {
            total,
            idle,
            active,
            waiting,
            generation: 0,
            reinitializations: 0,
        }
    }

    /// Attach lifecycle counters
    pub fn with_lifecycle(mut self, generation: u64, reinitializations: u64) -> Self {
        self.generation = generation;
        self.reinitializations = reinitializations;
        self
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn idle(&self) -> usize {
        self.idle
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn waiting(&self) -> usize {
        self.waiting
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn reinitializations(&self) -> u64 {
        self.reinitializations
    }

    /// Calculate pool utilization as a fraction of `max_size` (0.0 to 1.0)
    ///
    /// Returns 0.0 if `max_size` is 0 to avoid division by zero.
    pub fn utilization(&self, max_size: usize) -> f64 {
        if max_size == 0 {
            0.0
        } else {
            self.active as f64 / max_size as f64
        }
    }

    /// Check if every allowed lease is taken
    pub fn is_exhausted(&self, max_size: usize) -> bool {
        self.active >= max_size
    }
}

impl Default for PoolStats {
    fn default() -> Self {
        Self::new(0, 0, 0, 0)
    }
}
