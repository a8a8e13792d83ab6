//! Tests for retrying statement execution

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use ticketdb_core::{DbError, QueryOutcome, Statement};
use tokio::time::Instant;

use super::*;
use crate::pool::{ConnectionPool, PoolConfig};
use crate::retry::BackoffStrategy;
use crate::testing::{MockFactory, Scripted};

const BASE_DELAY_MS: u64 = 100;

fn executor_with(config: PoolConfig, policy: RetryPolicy) -> (QueryExecutor, Arc<MockFactory>) {
    let factory = MockFactory::new();
    let pool = Arc::new(ConnectionPool::new(config, factory.clone()));
    (QueryExecutor::new(pool, policy), factory)
}

fn default_executor() -> (QueryExecutor, Arc<MockFactory>) {
    executor_with(
        PoolConfig::new(1, 4),
        RetryPolicy::new(3, BackoffStrategy::linear(BASE_DELAY_MS, 10_000)),
    )
}

fn expect_execution_error(err: DbError) -> (u32, DbError) {
    match err {
        DbError::QueryExecution { attempts, source } => (attempts, *source),
        other => panic!("expected QueryExecution, got {other:?}"),
    }
}

#[tokio::test]
async fn test_select_returns_rows_and_update_returns_no_result_set() {
    let (executor, factory) = default_executor();
    factory.script([
        Scripted::Outcome(QueryOutcome::Rows(vec![])),
        Scripted::Outcome(QueryOutcome::no_result_set(0)),
    ]);

    let empty = executor
        .execute(&Statement::new(
            "SELECT * FROM tickets WHERE id = %s",
            vec![404.into()],
        ))
        .await
        .unwrap();
    assert!(!empty.is_no_result_set());
    assert_eq!(empty.rows().map(|rows| rows.len()), Some(0));

    let update = executor
        .execute(&Statement::new(
            "UPDATE tickets SET status = %s WHERE id = %s",
            vec!["closed".into(), 404.into()],
        ))
        .await
        .unwrap();
    assert!(update.is_no_result_set());
    assert_eq!(update.rows(), None);
}

#[tokio::test]
async fn test_each_statement_runs_in_its_own_committed_transaction() {
    let (executor, factory) = default_executor();

    executor.execute(&Statement::raw("SELECT 1")).await.unwrap();
    executor.execute(&Statement::raw("SELECT 2")).await.unwrap();

    assert_eq!(factory.commits(), 2);
    assert_eq!(factory.rollbacks(), 0);
    assert_eq!(executor.pool().stats().active(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_connection_failures_use_three_attempts_with_linear_backoff() {
    let (executor, factory) = default_executor();
    factory.script([Scripted::Die, Scripted::Die, Scripted::Die]);

    let err = executor
        .execute(&Statement::raw("SELECT * FROM users"))
        .await
        .unwrap_err();

    let (attempts, source) = expect_execution_error(err);
    assert_eq!(attempts, 3);
    assert!(source.is_connection_error());

    let executions = factory.executions();
    assert_eq!(executions.len(), 3);
    assert_eq!(
        executions[1].at - executions[0].at,
        Duration::from_millis(BASE_DELAY_MS)
    );
    assert_eq!(
        executions[2].at - executions[1].at,
        Duration::from_millis(BASE_DELAY_MS * 2)
    );

    // The pool is rebuilt after each failure that is followed by another attempt.
    assert_eq!(executor.pool().stats().reinitializations(), 2);
    assert_eq!(factory.rollbacks(), 3);
    assert_eq!(executor.pool().stats().active(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_connection_loss() {
    let (executor, factory) = default_executor();
    factory.script([Scripted::Die]);

    let outcome = executor
        .execute(&Statement::raw("SELECT id FROM tickets"))
        .await
        .unwrap();

    assert!(outcome.has_rows());
    let executions = factory.executions();
    assert_eq!(executions.len(), 2);
    assert_ne!(executions[0].connection_id, executions[1].connection_id);
    assert_eq!(executor.pool().stats().reinitializations(), 1);
    assert_eq!(factory.commits(), 1);
}

#[tokio::test]
async fn test_dead_pool_connection_is_replaced_before_executing() {
    let (executor, factory) = default_executor();
    executor.pool().initialize().await.unwrap();
    factory.kill_all();

    executor.execute(&Statement::raw("SELECT 1")).await.unwrap();

    assert_eq!(executor.pool().stats().reinitializations(), 1);
    assert_eq!(factory.executions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_simultaneous_failures_share_one_reinitialization() {
    let (executor, factory) = executor_with(
        PoolConfig::new(3, 3),
        RetryPolicy::new(3, BackoffStrategy::linear(BASE_DELAY_MS, 10_000)),
    );
    executor.pool().initialize().await.unwrap();
    factory.set_statement_delay(Duration::from_millis(10));
    factory.script([Scripted::Die, Scripted::Die, Scripted::Die]);

    let mut handles = Vec::new();
    for i in 0..3 {
        let executor = executor.clone();
        handles.push(tokio::spawn(async move {
            executor
                .execute(&Statement::new("SELECT %s", vec![i.into()]))
                .await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    assert_eq!(executor.pool().stats().reinitializations(), 1);
    assert_eq!(factory.executions().len(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_query_failures_are_retried_with_flat_delay() {
    let (executor, factory) = executor_with(
        PoolConfig::new(1, 4),
        RetryPolicy::default().with_query_error_delay_ms(40),
    );
    factory.script((0..3).map(|_| Scripted::Fail(DbError::Query("syntax error".into()))));

    let started = Instant::now();
    let err = executor
        .execute(&Statement::raw("SELEC 1"))
        .await
        .unwrap_err();

    let (attempts, source) = expect_execution_error(err);
    assert_eq!(attempts, 3);
    assert!(matches!(source, DbError::Query(_)));
    assert_eq!(factory.executions().len(), 3);
    assert_eq!(started.elapsed(), Duration::from_millis(80));
    assert_eq!(executor.pool().stats().reinitializations(), 0);
}

#[tokio::test]
async fn test_classified_policy_does_not_retry_permanent_failures() {
    let (executor, factory) = executor_with(PoolConfig::new(1, 4), RetryPolicy::classified());
    factory.script([Scripted::Fail(DbError::Query(
        "duplicate key value violates unique constraint \"users_email_key\"".into(),
    ))]);

    let err = executor
        .execute(&Statement::new(
            "INSERT INTO users (email, password, role) VALUES (%s, %s, %s)",
            vec!["a@example.com".into(), "x".into(), "agent".into()],
        ))
        .await
        .unwrap_err();

    let (attempts, source) = expect_execution_error(err);
    assert_eq!(attempts, 1);
    assert!(matches!(source, DbError::Query(_)));
    assert_eq!(factory.executions().len(), 1);
    assert_eq!(factory.rollbacks(), 1);
    assert_eq!(executor.pool().stats().reinitializations(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_conflicts_retry_without_reinitializing() {
    let (executor, factory) = default_executor();
    factory.script([Scripted::Fail(DbError::Conflict(
        "could not serialize access".into(),
    ))]);

    executor.execute(&Statement::raw("SELECT 1")).await.unwrap();

    let executions = factory.executions();
    assert_eq!(executions.len(), 2);
    assert_eq!(executions[0].connection_id, executions[1].connection_id);
    assert_eq!(executor.pool().stats().reinitializations(), 0);
}

#[tokio::test]
async fn test_closed_pool_is_reported_without_retry() {
    let (executor, factory) = default_executor();
    executor.pool().shutdown().await;

    let err = executor
        .execute(&Statement::raw("SELECT 1"))
        .await
        .unwrap_err();

    let (attempts, source) = expect_execution_error(err);
    assert_eq!(attempts, 1);
    assert!(matches!(source, DbError::PoolClosed));
    assert_eq!(factory.created(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_store_reports_initialization_failure() {
    let (executor, factory) = default_executor();
    factory.fail_all_creates(true);

    let err = executor
        .execute(&Statement::raw("SELECT 1"))
        .await
        .unwrap_err();

    let (attempts, source) = expect_execution_error(err);
    assert_eq!(attempts, 1);
    assert!(matches!(source, DbError::PoolInitialization { attempts: 3, .. }));
}

#[tokio::test]
async fn test_placeholder_mismatch_is_rejected_before_leasing() {
    let (executor, factory) = default_executor();

    let err = executor
        .execute(&Statement::new(
            "SELECT * FROM tickets WHERE id = %s AND status = %s",
            vec![1.into()],
        ))
        .await
        .unwrap_err();

    let (attempts, source) = expect_execution_error(err);
    assert_eq!(attempts, 0);
    assert!(matches!(source, DbError::Query(_)));
    assert_eq!(factory.created(), 0);
    assert!(factory.executions().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_deadline_stops_retries_early() {
    let (executor, factory) = executor_with(
        PoolConfig::new(1, 4),
        RetryPolicy::new(3, BackoffStrategy::linear(1_000, 10_000))
            .with_query_error_delay_ms(1_000),
    );
    factory.script([Scripted::Fail(DbError::Timeout("lock wait".into()))]);

    let deadline = Instant::now() + Duration::from_millis(500);
    let err = executor
        .execute_with_deadline(&Statement::raw("SELECT 1"), deadline)
        .await
        .unwrap_err();

    let (attempts, source) = expect_execution_error(err);
    assert_eq!(attempts, 1);
    assert!(matches!(source, DbError::Timeout(_)));
    assert_eq!(factory.executions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_bounds_pool_initialization() {
    let (executor, factory) = default_executor();
    factory.fail_all_creates(true);

    let started = Instant::now();
    let err = executor
        .execute_with_deadline(
            &Statement::raw("SELECT 1"),
            started + Duration::from_millis(100),
        )
        .await
        .unwrap_err();

    let (_, source) = expect_execution_error(err);
    assert!(matches!(source, DbError::Timeout(_)), "unexpected cause: {source:?}");
    assert!(started.elapsed() <= Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_bounds_reinitialization_after_connection_loss() {
    let (executor, factory) = default_executor();
    executor.pool().initialize().await.unwrap();
    factory.fail_all_creates(true);
    factory.script([Scripted::Die]);

    let started = Instant::now();
    let err = executor
        .execute_with_deadline(
            &Statement::raw("SELECT 1"),
            started + Duration::from_millis(300),
        )
        .await
        .unwrap_err();

    let (attempts, source) = expect_execution_error(err);
    assert_eq!(attempts, 1);
    assert!(matches!(source, DbError::Timeout(_)), "unexpected cause: {source:?}");
    assert_eq!(started.elapsed(), Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn test_deadline_bounds_a_hanging_statement() {
    let (executor, factory) = executor_with(PoolConfig::new(1, 1), RetryPolicy::no_retry());
    factory.set_statement_delay(Duration::from_secs(60));

    let deadline = Instant::now() + Duration::from_secs(1);
    let err = executor
        .execute_with_deadline(&Statement::raw("SELECT pg_sleep(60)"), deadline)
        .await
        .unwrap_err();

    let (_, source) = expect_execution_error(err);
    assert!(matches!(source, DbError::Timeout(_)));
    // The abandoned connection is not handed to the next caller.
    assert_eq!(executor.pool().stats().idle(), 0);
    assert!(factory.connection(0).unwrap().is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_statements_respect_pool_bound() {
    let (executor, factory) = executor_with(PoolConfig::new(1, 3), RetryPolicy::default());
    factory.set_statement_delay(Duration::from_millis(25));

    let mut handles = Vec::new();
    for i in 0..10 {
        let executor = executor.clone();
        handles.push(tokio::spawn(async move {
            executor
                .execute(&Statement::new(
                    "UPDATE tickets SET priority = %s WHERE id = %s",
                    vec!["high".into(), i.into()],
                ))
                .await
        }));
    }
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert!(outcome.is_no_result_set());
    }

    assert_eq!(factory.max_in_flight(), 3);
    assert_eq!(factory.commits(), 10);
}

#[tokio::test]
async fn test_executor_behind_execute_trait_object() {
    let (executor, _factory) = default_executor();
    let shared: Arc<dyn Execute> = Arc::new(executor);

    let outcome = shared
        .execute(&Statement::raw("SELECT 1"))
        .await
        .unwrap();
    assert_eq!(outcome.row_count(), 1);
}
