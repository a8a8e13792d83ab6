//! Exclusive connection leases

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use ticketdb_core::Connection;
use tokio::sync::OwnedSemaphorePermit;
use tokio::time::Instant;

use super::pool::{ConnectionPool, close_detached, close_quietly};

/// A connection borrowed from the pool
///
/// While the lease is alive no other caller can obtain its connection.
/// Hand it back with [`Lease::release`]; a lease that is merely dropped
/// (for example because its future was cancelled) discards the connection,
/// since nothing is known about the state it was left in.
pub struct Lease<'a> {
    pool: &'a ConnectionPool,
    connection: Option<Arc<dyn Connection>>,
    id: u64,
    generation: u64,
    created_at: Instant,
    poisoned: bool,
    // Dropped after the connection is checked in.
    _permit: OwnedSemaphorePermit,
}

impl fmt::Debug for Lease<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}

impl<'a> Lease<'a> {
    pub(super) fn new(
        pool: &'a ConnectionPool,
        connection: Arc<dyn Connection>,
        id: u64,
        generation: u64,
        created_at: Instant,
        permit: OwnedSemaphorePermit,
    ) -> Self {
        Self {
            pool,
            connection: Some(connection),
            id,
            generation,
            created_at,
            poisoned: false,
            _permit: permit,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Pool generation the connection was opened in
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Mark the connection unusable so it is discarded on release
    pub fn poison(&mut self) {
        self.poisoned = true;
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Get the underlying connection as an Arc
    pub fn inner(&self) -> Option<&Arc<dyn Connection>> {
        self.connection.as_ref()
    }

    /// Return the connection to the pool.
    ///
    /// Healthy connections go back to the idle set. Dead, poisoned or stale
    /// ones are closed and the discard is logged; release itself never fails.
    pub async fn release(mut self) {
        if let Some(connection) = self.connection.take()
            && let Some((connection, reason)) = self.pool.check_in(
                self.id,
                connection,
                self.generation,
                self.created_at,
                self.poisoned,
            )
        {
            tracing::warn!(lease_id = self.id, error = %reason, "discarding connection");
            close_quietly(&*connection).await;
        }
    }
}

impl Deref for Lease<'_> {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        match &self.connection {
            Some(connection) => connection.as_ref(),
            // Only `release` and `drop` take the connection, and both consume the lease.
            None => unreachable!("lease used after its connection was returned"),
        }
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take()
            && let Some((connection, reason)) = self.pool.check_in(
                self.id,
                connection,
                self.generation,
                self.created_at,
                true,
            )
        {
            tracing::debug!(lease_id = self.id, error = %reason, "lease dropped without release");
            close_detached(connection);
        }
    }
}
