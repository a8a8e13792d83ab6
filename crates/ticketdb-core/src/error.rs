//! Error types for ticketdb

use thiserror::Error;

/// Core error type for data-access operations
#[derive(Error, Debug)]
pub enum DbError {
    /// The backing store was unreachable or rejected the initial connections
    /// for every attempt of the initialization budget.
    #[error("Pool initialization failed after {attempts} attempt(s): {source}")]
    PoolInitialization {
        attempts: u32,
        #[source]
        source: Box<DbError>,
    },

    #[error("Connection pool is closed")]
    PoolClosed,

    /// A leased connection could not be returned to the idle set.
    #[error("Connection lease error: {0}")]
    ConnectionLease(String),

    /// The last cause after the executor gave up on a statement.
    #[error("Query failed after {attempts} attempt(s): {source}")]
    QueryExecution {
        attempts: u32,
        #[source]
        source: Box<DbError>,
    },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    /// Serialization failure or deadlock reported by the backing store.
    #[error("Transaction conflict: {0}")]
    Conflict(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// How the executor should treat a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Possibly transient: dropped sockets, timeouts, serialization conflicts
    Retryable,
    /// Deterministic: constraint violations, syntax errors, bad configuration
    Permanent,
}

impl DbError {
    /// Classify this error for retry purposes.
    ///
    /// Wrapper variants are classified by their innermost cause, except
    /// `PoolClosed` and `PoolInitialization` which are always permanent.
    pub fn failure_class(&self) -> FailureClass {
        match self {
            DbError::Connection(_) | DbError::Io(_) | DbError::Timeout(_) | DbError::Conflict(_) => {
                FailureClass::Retryable
            }
            DbError::QueryExecution { source, .. } => source.failure_class(),
            DbError::PoolInitialization { .. }
            | DbError::PoolClosed
            | DbError::ConnectionLease(_)
            | DbError::Query(_)
            | DbError::Configuration(_)
            | DbError::Tls(_)
            | DbError::Serialization(_) => FailureClass::Permanent,
        }
    }

    /// Whether the failure means the connection itself is unusable.
    ///
    /// Connection-level failures poison the lease and trigger a pool
    /// reinitialization before the next attempt.
    pub fn is_connection_error(&self) -> bool {
        match self {
            DbError::Connection(_) | DbError::Io(_) => true,
            DbError::QueryExecution { source, .. } => source.is_connection_error(),
            _ => false,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.failure_class() == FailureClass::Retryable
    }

    /// Unwrap `QueryExecution` and `PoolInitialization` to the underlying cause.
    pub fn root_cause(&self) -> &DbError {
        match self {
            DbError::QueryExecution { source, .. } | DbError::PoolInitialization { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }
}

/// Result type alias for data-access operations
pub type Result<T> = std::result::Result<T, DbError>;
