//! Connection pool implementation

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use parking_lot::Mutex;
use ticketdb_core::{Connection, ConnectionFactory, DbError, Result};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

use super::config::PoolConfig;
use super::lease::Lease;
use super::stats::PoolStats;

/// Internal wrapper for idle connections with metadata
struct IdleConnection {
    connection: Arc<dyn Connection>,
    generation: u64,
    created_at: Instant,
    last_used_at: Instant,
}

impl IdleConnection {
    fn new(connection: Arc<dyn Connection>, generation: u64) -> Self {
        let now = Instant::now();
        Self {
            connection,
            generation,
            created_at: now,
            last_used_at: now,
        }
    }
}

/// Outcome of looking for a reusable idle connection
enum IdleCheckout {
    Ready(IdleConnection),
    Dead,
    Empty,
}

/// A bounded pool of backing-store connections shared by the whole process
///
/// At most `max_size` connections are leased at once; further callers wait
/// until a lease is released or their acquire timeout elapses.
pub struct ConnectionPool {
    config: PoolConfig,
    factory: Arc<dyn ConnectionFactory>,
    /// Available idle connections
    idle: Mutex<VecDeque<IdleConnection>>,
    /// Connections currently out on lease, closed on shutdown
    leased: Mutex<HashMap<u64, Arc<dyn Connection>>>,
    /// One permit per allowed lease
    semaphore: Arc<Semaphore>,
    /// Serializes initialize, reinitialize and shutdown
    lifecycle: tokio::sync::Mutex<()>,
    initialized: AtomicBool,
    closed: AtomicBool,
    generation: AtomicU64,
    reinitializations: AtomicU64,
    next_lease_id: AtomicU64,
    active_count: AtomicUsize,
    waiting_count: AtomicUsize,
}

impl ConnectionPool {
    /// Create a pool; no connection is opened until [`ConnectionPool::initialize`]
    pub fn new<F: ConnectionFactory>(config: PoolConfig, factory: F) -> Self {
        let semaphore = Arc::new(Semaphore::new(config.max_size()));
        Self {
            config,
            factory: Arc::new(factory),
            idle: Mutex::new(VecDeque::new()),
            leased: Mutex::new(HashMap::new()),
            semaphore,
            lifecycle: tokio::sync::Mutex::new(()),
            initialized: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            reinitializations: AtomicU64::new(0),
            next_lease_id: AtomicU64::new(1),
            active_count: AtomicUsize::new(0),
            waiting_count: AtomicUsize::new(0),
        }
    }

    /// Open the initial connections.
    ///
    /// Idempotent: once the pool is initialized further calls return
    /// immediately. Opening is attempted `init_attempts` times with a fixed
    /// delay; when every attempt fails the last failure is returned wrapped
    /// in [`DbError::PoolInitialization`].
    pub async fn initialize(&self) -> Result<()> {
        if self.is_closed() {
            return Err(DbError::PoolClosed);
        }
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }

        let _guard = self.lifecycle.lock().await;
        if self.is_closed() {
            return Err(DbError::PoolClosed);
        }
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }

        let opened = self.open_with_retry().await?;
        let count = opened.len();
        {
            let generation = self.generation();
            let mut idle = self.idle.lock();
            idle.extend(
                opened
                    .into_iter()
                    .map(|conn| IdleConnection::new(conn, generation)),
            );
        }
        self.initialized.store(true, Ordering::SeqCst);
        tracing::info!(
            connections = count,
            max_size = self.config.max_size(),
            "connection pool initialized"
        );
        Ok(())
    }

    /// Tear down every connection and open a fresh set.
    pub async fn reinitialize(&self) -> Result<()> {
        self.reinitialize_from(self.generation()).await
    }

    /// Reinitialize unless another caller already did since `observed`.
    ///
    /// `observed` is the generation the caller saw when its connection
    /// failed; concurrent callers reporting the same failure share a single
    /// reinitialization.
    pub async fn reinitialize_from(&self, observed: u64) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        if self.is_closed() {
            return Err(DbError::PoolClosed);
        }
        if self.generation() != observed {
            tracing::debug!(
                observed,
                current = self.generation(),
                "pool already reinitialized"
            );
            return Ok(());
        }

        // Connections of the old generation are discarded when they come back.
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let discarded = self.close_idle().await;

        let opened = self.open_with_retry().await?;
        {
            let mut idle = self.idle.lock();
            idle.extend(
                opened
                    .into_iter()
                    .map(|conn| IdleConnection::new(conn, generation)),
            );
        }
        self.initialized.store(true, Ordering::SeqCst);
        self.reinitializations.fetch_add(1, Ordering::SeqCst);
        tracing::warn!(generation, discarded, "connection pool reinitialized");
        Ok(())
    }

    /// Lease a connection, waiting at most the configured acquire timeout
    pub async fn acquire(&self) -> Result<Lease<'_>> {
        self.acquire_until(Instant::now() + self.config.acquire_timeout())
            .await
    }

    /// Lease a connection, giving up at `deadline` or after the acquire
    /// timeout, whichever comes first.
    ///
    /// An uninitialized pool is initialized first. After shutdown this
    /// fails immediately with [`DbError::PoolClosed`].
    pub async fn acquire_until(&self, deadline: Instant) -> Result<Lease<'_>> {
        if self.is_closed() {
            return Err(DbError::PoolClosed);
        }

        let deadline = deadline.min(Instant::now() + self.config.acquire_timeout());
        match tokio::time::timeout_at(deadline, self.initialize()).await {
            Ok(initialized) => initialized?,
            Err(_) => {
                return Err(DbError::Timeout(
                    "Timed out initializing the connection pool".to_string(),
                ));
            }
        }

        self.waiting_count.fetch_add(1, Ordering::SeqCst);
        let result = tokio::time::timeout_at(deadline, self.checkout()).await;
        self.waiting_count.fetch_sub(1, Ordering::SeqCst);

        match result {
            Ok(lease) => lease,
            Err(_) => Err(DbError::Timeout(format!(
                "Timed out waiting for connection (timeout: {:?})",
                self.config.acquire_timeout()
            ))),
        }
    }

    async fn checkout(&self) -> Result<Lease<'_>> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| DbError::PoolClosed)?;

        let attempts = self.config.init_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            if self.is_closed() {
                return Err(DbError::PoolClosed);
            }

            let observed = self.generation();
            match self.checkout_idle().await {
                IdleCheckout::Ready(entry) => return Ok(self.lease(entry, permit)),
                IdleCheckout::Dead => {
                    if attempt >= attempts {
                        return Err(DbError::Connection(
                            "idle connections keep failing validation".to_string(),
                        ));
                    }
                    tracing::warn!(generation = observed, "found dead idle connection");
                    self.reinitialize_from(observed).await?;
                }
                IdleCheckout::Empty => match self.factory.create().await {
                    Ok(connection) => {
                        let entry = IdleConnection::new(connection, self.generation());
                        return Ok(self.lease(entry, permit));
                    }
                    Err(err) if attempt < attempts && err.is_retryable() => {
                        tracing::warn!(attempt, error = %err, "failed to open connection");
                        tokio::time::sleep(self.config.init_retry_delay()).await;
                    }
                    Err(err) => return Err(err),
                },
            }
        }
    }

    /// Pop idle connections until a usable one turns up.
    ///
    /// Expired connections are closed and skipped; a connection that fails
    /// validation means the backing store went away.
    async fn checkout_idle(&self) -> IdleCheckout {
        loop {
            let entry = { self.idle.lock().pop_front() };
            let Some(entry) = entry else {
                return IdleCheckout::Empty;
            };

            if self.is_expired(&entry) {
                close_quietly(&*entry.connection).await;
                continue;
            }

            if !self.factory.validate(&*entry.connection).await {
                close_quietly(&*entry.connection).await;
                return IdleCheckout::Dead;
            }

            return IdleCheckout::Ready(entry);
        }
    }

    fn is_expired(&self, entry: &IdleConnection) -> bool {
        if let Some(max_lifetime) = self.config.max_lifetime()
            && entry.created_at.elapsed() > max_lifetime
        {
            return true;
        }
        entry.last_used_at.elapsed() > self.config.idle_timeout()
    }

    fn lease(&self, entry: IdleConnection, permit: OwnedSemaphorePermit) -> Lease<'_> {
        let id = self.next_lease_id.fetch_add(1, Ordering::SeqCst);
        self.leased.lock().insert(id, entry.connection.clone());
        self.active_count.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(lease_id = id, generation = entry.generation, "connection leased");
        Lease::new(
            self,
            entry.connection,
            id,
            entry.generation,
            entry.created_at,
            permit,
        )
    }

    /// Take a connection back from a lease.
    ///
    /// Returns the connection and the reason it was discarded when it must
    /// not be reused; the caller is responsible for closing it.
    pub(super) fn check_in(
        &self,
        lease_id: u64,
        connection: Arc<dyn Connection>,
        generation: u64,
        created_at: Instant,
        poisoned: bool,
    ) -> Option<(Arc<dyn Connection>, DbError)> {
        self.leased.lock().remove(&lease_id);
        self.active_count.fetch_sub(1, Ordering::SeqCst);

        let mut idle = self.idle.lock();
        let reason = if self.is_closed() {
            Some("pool is closed")
        } else if poisoned {
            Some("connection failed while leased")
        } else if connection.is_closed() {
            Some("connection is dead")
        } else if generation != self.generation() {
            Some("connection belongs to a previous pool generation")
        } else {
            None
        };

        match reason {
            Some(reason) => Some((
                connection,
                DbError::ConnectionLease(format!("lease {}: {}", lease_id, reason)),
            )),
            None => {
                idle.push_back(IdleConnection {
                    connection,
                    generation,
                    created_at,
                    last_used_at: Instant::now(),
                });
                None
            }
        }
    }

    /// Close every connection and refuse further leases.
    ///
    /// Waiters blocked in [`ConnectionPool::acquire`] fail with
    /// [`DbError::PoolClosed`]. Safe to call more than once.
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.semaphore.close();

        let _guard = self.lifecycle.lock().await;
        let idle = self.close_idle().await;
        let leased: Vec<_> = self.leased.lock().values().cloned().collect();
        for connection in &leased {
            close_quietly(&**connection).await;
        }
        tracing::info!(closed = idle + leased.len(), "connection pool shut down");
    }

    /// Close every idle connection, returning how many were closed
    async fn close_idle(&self) -> usize {
        let connections: Vec<_> = { self.idle.lock().drain(..).collect() };
        let count = connections.len();
        for entry in connections {
            close_quietly(&*entry.connection).await;
        }
        count
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        let idle = self.idle.lock().len();
        let active = self.active_count.load(Ordering::SeqCst);
        let waiting = self.waiting_count.load(Ordering::SeqCst);
        PoolStats::new(idle + active, idle, active, waiting).with_lifecycle(
            self.generation(),
            self.reinitializations.load(Ordering::SeqCst),
        )
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn open_with_retry(&self) -> Result<Vec<Arc<dyn Connection>>> {
        let attempts = self.config.init_attempts();
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.open_connections(self.config.min_size()).await {
                Ok(opened) => return Ok(opened),
                Err(err) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = attempts,
                        error = %err,
                        "failed to open pool connections"
                    );
                    last_error = Some(err);
                    if attempt < attempts {
                        tokio::time::sleep(self.config.init_retry_delay()).await;
                    }
                }
            }
        }

        let source = last_error
            .unwrap_or_else(|| DbError::Connection("no connection attempt was made".into()));
        tracing::error!(attempts, error = %source, "connection pool initialization failed");
        Err(DbError::PoolInitialization {
            attempts,
            source: Box::new(source),
        })
    }

    async fn open_connections(&self, count: usize) -> Result<Vec<Arc<dyn Connection>>> {
        let mut opened = Vec::with_capacity(count);
        for _ in 0..count {
            match self.factory.create().await {
                Ok(connection) => opened.push(connection),
                Err(err) => {
                    for connection in opened {
                        close_quietly(&*connection).await;
                    }
                    return Err(err);
                }
            }
        }
        Ok(opened)
    }
}

pub(super) async fn close_quietly(connection: &dyn Connection) {
    if let Err(err) = connection.close().await {
        tracing::debug!(error = %err, "error closing connection");
    }
}

/// Close a discarded connection without an async context to await in
pub(super) fn close_detached(connection: Arc<dyn Connection>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                close_quietly(&*connection).await;
            });
        }
        Err(_) => {
            tracing::debug!("no runtime available, dropping connection without closing it");
        }
    }
}
