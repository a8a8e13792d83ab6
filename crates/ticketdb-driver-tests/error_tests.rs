//! Error classification tests against a live server.
//!
//! Server errors are mapped from their SQLSTATE to the shared taxonomy. The
//! executor reconnects only for connection errors; with the classified
//! policy permanent errors are returned after one attempt.

use anyhow::Result;
use pretty_assertions::assert_eq;
use rstest::rstest;
use ticketdb_connection::PoolConfig;
use ticketdb_core::{DbError, Statement};

use crate::fixtures::{TestDatabase, database, fast_retry, test_database_with, unique_email};

/// Expected root cause of a failing statement
#[derive(Debug, Clone, Copy)]
enum Expect {
    /// Permanent failure whose message contains the text
    Query(&'static str),
    Conflict,
    Timeout,
}

fn raise(sqlstate: &str) -> String {
    format!(
        "DO $$ BEGIN RAISE EXCEPTION 'raised for test' USING ERRCODE = '{}'; END $$",
        sqlstate
    )
}

/// Permanent errors use the whole attempt budget and keep a descriptive message
#[rstest]
#[case::syntax("SELEC 1", Expect::Query("code: 42601"))]
#[case::invalid_input("SELECT 'abc'::INTEGER", Expect::Query("invalid input syntax"))]
#[case::division("SELECT 1 / 0", Expect::Query("division by zero"))]
#[case::missing_relation("SELECT * FROM no_such_table", Expect::Query("no_such_table"))]
#[case::invalid_datetime("SELECT 'not a date'::DATE", Expect::Query("invalid"))]
#[tokio::test]
#[ignore = "requires Docker"]
async fn test_permanent_errors_are_retried_by_default(
    #[case] sql: &str,
    #[case] expect: Expect,
    #[future(awt)] database: TestDatabase,
) -> Result<()> {
    let err = database
        .executor
        .execute(&Statement::raw(sql.to_string()))
        .await
        .unwrap_err();

    let DbError::QueryExecution { attempts, source } = &err else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(*attempts, 3);
    match (expect, source.as_ref()) {
        (Expect::Query(needle), DbError::Query(message)) => {
            assert!(message.contains(needle), "{message}");
        }
        (expect, other) => panic!("expected {expect:?}, got {other:?}"),
    }
    assert!(!err.is_retryable());
    assert_eq!(database.pool.stats().reinitializations(), 0);

    database.close().await;
    Ok(())
}

/// Retryable SQLSTATEs are attempted `max_attempts` times
#[rstest]
#[case::serialization_failure("40001", Expect::Conflict)]
#[case::deadlock("40P01", Expect::Conflict)]
#[case::query_canceled("57014", Expect::Timeout)]
#[tokio::test]
#[ignore = "requires Docker"]
async fn test_retryable_errors_use_every_attempt(
    #[case] sqlstate: &str,
    #[case] expect: Expect,
    #[future(awt)] database: TestDatabase,
) -> Result<()> {
    let err = database
        .executor
        .execute(&Statement::raw(raise(sqlstate)))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::QueryExecution { attempts: 3, .. }), "{err:?}");
    match (expect, err.root_cause()) {
        (Expect::Conflict, DbError::Conflict(_)) | (Expect::Timeout, DbError::Timeout(_)) => {}
        (expect, other) => panic!("expected {expect:?}, got {other:?}"),
    }
    // Not connection failures: the pool is left alone.
    assert_eq!(database.pool.stats().reinitializations(), 0);

    database.close().await;
    Ok(())
}

/// Connection-class SQLSTATEs trigger pool reinitialization between attempts
#[rstest]
#[tokio::test]
#[ignore = "requires Docker"]
async fn test_connection_errors_reinitialize_the_pool(
    #[future(awt)] database: TestDatabase,
) -> Result<()> {
    let err = database
        .executor
        .execute(&Statement::raw(raise("08006")))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::QueryExecution { attempts: 3, .. }), "{err:?}");
    assert!(err.is_connection_error());
    assert_eq!(database.pool.stats().reinitializations(), 2);

    database.close().await;
    Ok(())
}

/// Constraint violations carry a constraint-specific message
#[rstest]
#[tokio::test]
#[ignore = "requires Docker"]
async fn test_unique_violation_is_permanent(#[future(awt)] database: TestDatabase) -> Result<()> {
    let email = unique_email("dup");
    let insert = Statement::new(
        "INSERT INTO users (email, password_hash, role) VALUES (%s, 'x', 'customer')",
        vec![email.as_str().into()],
    );
    database.executor.execute(&insert).await?;

    let err = database.executor.execute(&insert).await.unwrap_err();
    match err.root_cause() {
        DbError::Query(message) => {
            assert!(
                message.contains("duplicate value violates unique constraint"),
                "{message}"
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(matches!(err, DbError::QueryExecution { attempts: 3, .. }));

    database.close().await;
    Ok(())
}

/// The classified policy returns permanent failures after one attempt
#[tokio::test]
#[ignore = "requires Docker"]
async fn test_classified_policy_does_not_retry_permanent_failures() -> Result<()> {
    let retry = fast_retry().with_retry_on_query_error(false);
    let db = test_database_with(PoolConfig::new(1, 2), retry).await?;

    let err = db
        .executor
        .execute(&Statement::raw("SELECT 1 / 0"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::QueryExecution { attempts: 1, .. }), "{err:?}");

    // Transient failures are still retried
    let err = db
        .executor
        .execute(&Statement::raw(raise("40001")))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::QueryExecution { attempts: 3, .. }), "{err:?}");

    db.close().await;
    Ok(())
}
