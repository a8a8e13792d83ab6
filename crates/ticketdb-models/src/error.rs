use thiserror::Error;
use ticketdb_core::DbError;

pub type ModelResult<T> = Result<T, ModelError>;

/// Errors surfaced by the data-access models
#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Database(#[from] DbError),

    /// Rejected before anything was written
    #[error("Invalid attachment: {0}")]
    InvalidAttachment(String),

    #[error("Column '{0}' missing from result")]
    MissingColumn(String),

    /// The statement succeeded but did not produce the expected shape,
    /// e.g. an INSERT ... RETURNING without a row.
    #[error("Unexpected result: {0}")]
    UnexpectedResult(String),
}
