//! PostgreSQL connection implementation

mod values;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use ticketdb_core::{
    Connection, DbError, QueryOutcome, Result, Row, Statement, TlsMode, Transaction,
};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};

use crate::config::PostgresConfig;
use crate::error::classify_error;
use crate::tls::PostgresTlsConnector;

pub(crate) use values::PgValue;

/// A single PostgreSQL session.
///
/// The socket is driven by a background task spawned on the current tokio
/// runtime; closing the connection aborts that task.
pub struct PostgresConnection {
    client: Arc<Client>,
    task: JoinHandle<()>,
    closed: AtomicBool,
}

impl PostgresConnection {
    /// Open a session with the given settings
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pg_config = config.to_pg_config()?;
        let target = config.describe();

        tracing::debug!(
            target_db = %target,
            sslmode = config.tls.mode.as_sslmode(),
            "connecting to PostgreSQL"
        );

        let (client, task) = if config.tls.mode == TlsMode::Disable {
            let (client, connection) = pg_config
                .connect(NoTls)
                .await
                .map_err(|e| classify_error("Failed to connect to PostgreSQL", &e))?;
            (client, spawn_connection(connection))
        } else {
            let tls = PostgresTlsConnector::build(&config.tls)?;
            let (client, connection) = pg_config
                .connect(tls)
                .await
                .map_err(|e| classify_error("Failed to connect to PostgreSQL", &e))?;
            (client, spawn_connection(connection))
        };

        tracing::info!(target_db = %target, "PostgreSQL connection established");

        Ok(Self {
            client: Arc::new(client),
            task,
            closed: AtomicBool::new(false),
        })
    }
}

fn spawn_connection<S, T>(connection: tokio_postgres::Connection<S, T>) -> JoinHandle<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::warn!(error = %e, "PostgreSQL connection terminated");
        }
    })
}

/// Prepare, bind and run one statement.
///
/// Statements whose prepared form has no result columns (DDL, UPDATE
/// without RETURNING) are reported as [`QueryOutcome::NoResultSet`]; a
/// SELECT that matches nothing is an empty `Rows`.
async fn run_statement(client: &Client, statement: &Statement) -> Result<QueryOutcome> {
    statement.validate()?;
    let sql = statement.render_positional(|n| format!("${}", n))?;

    tracing::debug!(sql_preview = %statement.preview(), "executing statement");

    let prepared = client
        .prepare(&sql)
        .await
        .map_err(|e| classify_error("Failed to prepare statement", &e))?;

    let param_types = prepared.params();
    if param_types.len() != statement.params().len() {
        return Err(DbError::Query(format!(
            "statement expects {} parameter(s) but {} were supplied",
            param_types.len(),
            statement.params().len()
        )));
    }

    let pg_params: Vec<PgValue> = statement
        .params()
        .iter()
        .zip(param_types)
        .map(|(value, ty)| PgValue::for_type(value, ty))
        .collect();
    let param_refs: Vec<&(dyn ToSql + Sync)> = pg_params
        .iter()
        .map(|p| p as &(dyn ToSql + Sync))
        .collect();

    if prepared.columns().is_empty() {
        let affected = client
            .execute(&prepared, &param_refs)
            .await
            .map_err(|e| classify_error("Failed to execute statement", &e))?;
        return Ok(QueryOutcome::no_result_set(affected));
    }

    let columns: Vec<String> = prepared
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();

    let pg_rows = client
        .query(&prepared, &param_refs)
        .await
        .map_err(|e| classify_error("Failed to execute query", &e))?;

    let rows = pg_rows
        .iter()
        .map(|row| Row::new(columns.clone(), values::row_values(row)))
        .collect();

    Ok(QueryOutcome::Rows(rows))
}

#[async_trait]
impl Connection for PostgresConnection {
    fn driver_name(&self) -> &str {
        "postgresql"
    }

    async fn execute(&self, statement: &Statement) -> Result<QueryOutcome> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DbError::Connection("connection is closed".into()));
        }
        run_statement(&self.client, statement).await
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DbError::Connection("connection is closed".into()));
        }
        self.client
            .batch_execute("BEGIN")
            .await
            .map_err(|e| classify_error("Failed to begin transaction", &e))?;

        Ok(Box::new(PostgresTransaction {
            client: Arc::clone(&self.client),
            committed: false,
            rolled_back: false,
        }))
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .simple_query("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| classify_error("Ping failed", &e))
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!("closing PostgreSQL connection");
            self.task.abort();
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.client.is_closed() || self.task.is_finished()
    }
}

impl Drop for PostgresConnection {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Transaction on a leased connection, delimited with BEGIN/COMMIT.
pub struct PostgresTransaction {
    client: Arc<Client>,
    committed: bool,
    rolled_back: bool,
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        if !self.committed && !self.rolled_back {
            // The session is discarded by the pool when its lease is dropped
            // mid-transaction, which ends the transaction server-side.
            tracing::warn!("PostgreSQL transaction dropped without commit or rollback");
        }
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn execute(&self, statement: &Statement) -> Result<QueryOutcome> {
        run_statement(&self.client, statement).await
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        if self.rolled_back {
            return Err(DbError::Query("Transaction already rolled back".into()));
        }
        if self.committed {
            return Err(DbError::Query("Transaction already committed".into()));
        }

        self.client
            .batch_execute("COMMIT")
            .await
            .map_err(|e| classify_error("Failed to commit transaction", &e))?;

        self.committed = true;
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        if self.committed {
            return Err(DbError::Query("Transaction already committed".into()));
        }
        if self.rolled_back {
            return Ok(());
        }

        // Mark first so a failed ROLLBACK does not also warn on drop.
        self.rolled_back = true;
        self.client
            .batch_execute("ROLLBACK")
            .await
            .map_err(|e| classify_error("Failed to rollback transaction", &e))
    }
}
