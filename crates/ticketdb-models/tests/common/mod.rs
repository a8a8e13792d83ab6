//! Common test utilities and mocks

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use ticketdb_connection::Execute;
use ticketdb_core::{DbError, QueryOutcome, Result, Row, Statement, Value};

/// Executor double for model tests.
///
/// Records every statement; answers with the first registered response whose
/// pattern the SQL contains, or `NoResultSet` otherwise.
#[derive(Default)]
pub struct MockExecutor {
    responses: Mutex<Vec<(String, QueryOutcome)>>,
    fail_with: Mutex<Option<String>>,
    log: Mutex<Vec<Statement>>,
}

impl MockExecutor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, sql_contains: &str, outcome: QueryOutcome) {
        self.responses
            .lock()
            .push((sql_contains.to_string(), outcome));
    }

    /// Fail every statement with a permanent query error
    pub fn fail(&self, message: &str) {
        *self.fail_with.lock() = Some(message.to_string());
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.log.lock().clone()
    }

    pub fn last(&self) -> Statement {
        self.log
            .lock()
            .last()
            .cloned()
            .expect("no statement was executed")
    }

    pub fn executed(&self) -> usize {
        self.log.lock().len()
    }
}

#[async_trait]
impl Execute for MockExecutor {
    async fn execute(&self, statement: &Statement) -> Result<QueryOutcome> {
        self.log.lock().push(statement.clone());
        statement.validate()?;

        if let Some(message) = self.fail_with.lock().clone() {
            return Err(DbError::QueryExecution {
                attempts: 1,
                source: Box::new(DbError::Query(message)),
            });
        }

        let responses = self.responses.lock();
        let outcome = responses
            .iter()
            .find(|(pattern, _)| statement.text().contains(pattern.as_str()))
            .map(|(_, outcome)| outcome.clone())
            .unwrap_or_else(|| QueryOutcome::no_result_set(1));
        Ok(outcome)
    }
}

pub fn row(pairs: Vec<(&str, Value)>) -> Row {
    let (columns, values): (Vec<String>, Vec<Value>) = pairs
        .into_iter()
        .map(|(column, value)| (column.to_string(), value))
        .unzip();
    Row::new(columns, values)
}

pub fn rows(rows: Vec<Row>) -> QueryOutcome {
    QueryOutcome::Rows(rows)
}

pub fn id_row(id: i32) -> QueryOutcome {
    rows(vec![row(vec![("id", Value::Int32(id))])])
}
