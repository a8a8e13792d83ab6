//! Backoff calculator for statement retries
//!
//! The default grows linearly: the wait after the n-th failed attempt is
//! `base * n`. Fixed and exponential growth are available for deployments
//! that prefer them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the delay grows with each failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// `base * attempt`
    #[default]
    Linear,
    /// `base * multiplier^(attempt - 1)`
    Exponential,
    /// Always `base`
    Fixed,
}

/// Backoff strategy for statement retries.
///
/// # Example
///
/// ```
/// use ticketdb_connection::retry::BackoffStrategy;
/// use std::time::Duration;
///
/// let backoff = BackoffStrategy::linear(100, 30_000);
///
/// // After the first failure: 100ms
/// assert_eq!(backoff.delay_after(1), Duration::from_millis(100));
///
/// // After the second failure: 200ms
/// assert_eq!(backoff.delay_after(2), Duration::from_millis(200));
///
/// // Growth is capped at the maximum
/// assert_eq!(backoff.delay_after(1_000), Duration::from_millis(30_000));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffStrategy {
    kind: BackoffKind,
    /// Base delay in milliseconds
    base_ms: u64,
    /// Maximum delay in milliseconds
    max_ms: u64,
    /// Growth factor for exponential backoff (default: 2.0)
    multiplier: f64,
}

impl BackoffStrategy {
    fn with_kind(kind: BackoffKind, base_ms: u64, max_ms: u64) -> Self {
        Self {
            kind,
            base_ms,
            max_ms: max_ms.max(base_ms),
            multiplier: 2.0,
        }
    }

    /// Delay grows by `base_ms` per failed attempt
    pub fn linear(base_ms: u64, max_ms: u64) -> Self {
        Self::with_kind(BackoffKind::Linear, base_ms, max_ms)
    }

    /// Delay doubles (by default) per failed attempt
    pub fn exponential(base_ms: u64, max_ms: u64) -> Self {
        Self::with_kind(BackoffKind::Exponential, base_ms, max_ms)
    }

    /// Same delay after every failed attempt
    pub fn fixed(delay_ms: u64) -> Self {
        Self::with_kind(BackoffKind::Fixed, delay_ms, delay_ms)
    }

    /// Set the multiplier for exponential growth.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    /// Calculate the wait after the given failed attempt.
    ///
    /// `attempt` is 1-based: 1 is the first attempt that failed. Zero is
    /// treated as 1.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let delay_ms = match self.kind {
            BackoffKind::Linear => self.base_ms.saturating_mul(u64::from(attempt)),
            BackoffKind::Fixed => self.base_ms,
            BackoffKind::Exponential => {
                let grown = (self.base_ms as f64) * self.multiplier.powi(attempt as i32 - 1);
                grown.min(self.max_ms as f64) as u64
            }
        };

        Duration::from_millis(delay_ms.min(self.max_ms))
    }

    pub fn kind(&self) -> BackoffKind {
        self.kind
    }

    /// Get the base delay.
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_ms)
    }

    /// Get the maximum delay.
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_ms)
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }
}

impl Default for BackoffStrategy {
    /// Default backoff: linear, 500ms base, 10 seconds max
    fn default() -> Self {
        Self::linear(500, 10_000)
    }
}
