//! Mapping PostgreSQL failures onto the ticketdb error taxonomy
//!
//! The executor only retries and reconnects based on the `DbError` variant,
//! so every driver error is sorted here: lost sessions become
//! `Connection`, serialization failures and deadlocks `Conflict`, statement
//! cancellation `Timeout`, and everything else a permanent `Query` error.

use std::error::Error as _;

use ticketdb_core::DbError;

/// Classify an error by its SQLSTATE code
pub fn classify_sqlstate(code: &str, message: String) -> DbError {
    match code {
        // connection_exception class, admin/crash shutdown, cannot_connect_now,
        // too_many_connections
        c if c.starts_with("08") => DbError::Connection(message),
        "57P01" | "57P02" | "57P03" | "53300" => DbError::Connection(message),
        // serialization_failure, deadlock_detected
        "40001" | "40P01" => DbError::Conflict(message),
        // query_canceled (statement_timeout), lock_not_available (lock_timeout)
        "57014" | "55P03" => DbError::Timeout(message),
        _ => DbError::Query(message),
    }
}

/// Classify a tokio-postgres error, prefixing `context` to the message
pub fn classify_error(context: &str, error: &tokio_postgres::Error) -> DbError {
    if error.is_closed() {
        return DbError::Connection(format!("{}: connection closed", context));
    }

    if let Some(db_error) = error.as_db_error() {
        return classify_sqlstate(
            db_error.code().code(),
            format!("{}: {}", context, format_postgres_error(error)),
        );
    }

    // Without a server-side code the failure is either transport (I/O) or a
    // client-side conversion problem.
    let mut source = error.source();
    while let Some(cause) = source {
        if cause.downcast_ref::<std::io::Error>().is_some() {
            return DbError::Connection(format!("{}: {}", context, error));
        }
        source = cause.source();
    }
    DbError::Query(format!("{}: {}", context, error))
}

pub(crate) fn format_postgres_error(error: &tokio_postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let code = db_error.code();
    let mut message = db_error.message().to_string();

    for (label, extra) in [
        ("detail", db_error.detail()),
        ("hint", db_error.hint()),
        ("column", db_error.column()),
        ("constraint", db_error.constraint()),
    ] {
        if let Some(extra) = extra
            && !extra.trim().is_empty()
        {
            message.push_str(&format!(" ({}: {})", label, extra));
        }
    }

    constraint_message(code.code(), message)
}

fn constraint_message(code: &str, message: String) -> String {
    match code {
        "23505" => format!("duplicate value violates unique constraint: {}", message),
        "23503" => format!("foreign key violation: {}", message),
        "23502" => format!("null value violates not-null constraint: {}", message),
        "22007" => format!("invalid datetime format: {}", message),
        "22P02" => format!("invalid input syntax: {}", message),
        _ => format!("{} (code: {})", message, code),
    }
}
