//! Resilient statement execution
//!
//! Each attempt leases a connection, runs the statement inside its own
//! transaction and always hands the lease back. Failed attempts are retried
//! as the [`RetryPolicy`] decides; connection-level failures reinitialize
//! the pool before the next attempt.

use std::sync::Arc;

use async_trait::async_trait;
use ticketdb_core::{Connection, DbError, QueryOutcome, Result, Statement};
use tokio::time::Instant;

use crate::pool::ConnectionPool;
use crate::retry::{RetryDecision, RetryPolicy};

/// Anything that can run a statement to completion.
///
/// Data-access models depend on this trait rather than on the executor so
/// they can be exercised without a pool.
#[async_trait]
pub trait Execute: Send + Sync {
    async fn execute(&self, statement: &Statement) -> Result<QueryOutcome>;
}

#[async_trait]
impl<T: Execute + ?Sized> Execute for Arc<T> {
    async fn execute(&self, statement: &Statement) -> Result<QueryOutcome> {
        (**self).execute(statement).await
    }
}

/// Runs statements against the pool with bounded retries
#[derive(Clone)]
pub struct QueryExecutor {
    pool: Arc<ConnectionPool>,
    policy: RetryPolicy,
}

impl QueryExecutor {
    pub fn new(pool: Arc<ConnectionPool>, policy: RetryPolicy) -> Self {
        Self { pool, policy }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute a statement, retrying per the policy
    ///
    /// Failures are reported as [`DbError::QueryExecution`] carrying the
    /// number of attempts made and the last underlying error.
    pub async fn execute(&self, statement: &Statement) -> Result<QueryOutcome> {
        self.run(statement, None).await
    }

    /// Execute a statement, giving up once `deadline` passes.
    ///
    /// The deadline bounds waiting for a connection, the statement itself
    /// and the backoff between attempts.
    pub async fn execute_with_deadline(
        &self,
        statement: &Statement,
        deadline: Instant,
    ) -> Result<QueryOutcome> {
        self.run(statement, Some(deadline)).await
    }

    #[tracing::instrument(skip_all, fields(sql_preview = %statement.preview()))]
    async fn run(&self, statement: &Statement, deadline: Option<Instant>) -> Result<QueryOutcome> {
        // Rejected before any connection is leased.
        if let Err(err) = statement.validate() {
            return Err(DbError::QueryExecution {
                attempts: 0,
                source: Box::new(err),
            });
        }

        let max_attempts = self.policy.max_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let (result, generation) = self.attempt(statement, deadline).await;
            let err = match result {
                Ok(outcome) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "statement succeeded after retry");
                    }
                    return Ok(outcome);
                }
                Err(err) => err,
            };

            let delay = match self.policy.decide(&err, attempt) {
                RetryDecision::GiveUp => {
                    tracing::error!(attempt, error = %err, "statement failed");
                    return Err(DbError::QueryExecution {
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }
                RetryDecision::Retry(delay) | RetryDecision::Reconnect(delay) => delay,
            };

            if let Some(deadline) = deadline
                && Instant::now() + delay >= deadline
            {
                tracing::error!(attempt, error = %err, "deadline reached before next attempt");
                return Err(DbError::QueryExecution {
                    attempts: attempt,
                    source: Box::new(DbError::Timeout(format!(
                        "deadline reached after {} attempt(s); last error: {}",
                        attempt, err
                    ))),
                });
            }

            tracing::warn!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "statement failed, retrying"
            );
            tokio::time::sleep(delay).await;

            if err.is_connection_error() {
                let Some(reinit) = self.reinitialize_before(generation, deadline).await else {
                    tracing::error!(attempt, "deadline reached while reinitializing the pool");
                    return Err(DbError::QueryExecution {
                        attempts: attempt,
                        source: Box::new(DbError::Timeout(format!(
                            "deadline reached reinitializing the pool after {} attempt(s); last error: {}",
                            attempt, err
                        ))),
                    });
                };
                match reinit {
                    Ok(()) => {}
                    Err(DbError::PoolClosed) => {
                        return Err(DbError::QueryExecution {
                            attempts: attempt,
                            source: Box::new(DbError::PoolClosed),
                        });
                    }
                    // The next attempt reports the failure if the store is still down.
                    Err(reinit) => {
                        tracing::warn!(error = %reinit, "pool reinitialization failed");
                    }
                }
            }
        }
    }

    /// Reinitialize the pool, or `None` when `deadline` passes first
    async fn reinitialize_before(
        &self,
        generation: u64,
        deadline: Option<Instant>,
    ) -> Option<Result<()>> {
        let reinit = self.pool.reinitialize_from(generation);
        match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, reinit).await.ok(),
            None => Some(reinit.await),
        }
    }

    /// One lease, one transaction.
    ///
    /// Returns the attempt's result and the pool generation it ran against.
    async fn attempt(
        &self,
        statement: &Statement,
        deadline: Option<Instant>,
    ) -> (Result<QueryOutcome>, u64) {
        let observed = self.pool.generation();
        let lease = match deadline {
            Some(deadline) => self.pool.acquire_until(deadline).await,
            None => self.pool.acquire().await,
        };
        let mut lease = match lease {
            Ok(lease) => lease,
            Err(err) => return (Err(err), observed),
        };
        let generation = lease.generation();

        let result = match deadline {
            Some(deadline) => {
                match tokio::time::timeout_at(deadline, run_in_transaction(&*lease, statement))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => {
                        // Abandoned mid-transaction; the connection state is unknown.
                        lease.poison();
                        Err(DbError::Timeout("statement exceeded its deadline".to_string()))
                    }
                }
            }
            None => run_in_transaction(&*lease, statement).await,
        };

        if let Err(err) = &result
            && err.is_connection_error()
        {
            lease.poison();
        }
        lease.release().await;
        (result, generation)
    }
}

#[async_trait]
impl Execute for QueryExecutor {
    async fn execute(&self, statement: &Statement) -> Result<QueryOutcome> {
        QueryExecutor::execute(self, statement).await
    }
}

async fn run_in_transaction(
    connection: &dyn Connection,
    statement: &Statement,
) -> Result<QueryOutcome> {
    let tx = connection.begin_transaction().await?;
    match tx.execute(statement).await {
        Ok(outcome) => {
            tx.commit().await?;
            Ok(outcome)
        }
        Err(err) => {
            if let Err(rollback) = tx.rollback().await {
                tracing::debug!(error = %rollback, "rollback after failed statement also failed");
            }
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests;
