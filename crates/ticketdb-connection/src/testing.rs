//! Scriptable in-memory connections for exercising the pool and executor

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use ticketdb_core::{
    Connection, ConnectionFactory, DbError, QueryOutcome, Result, Row, Statement, Transaction,
    Value,
};
use tokio::time::Instant;

/// What a mock statement execution should produce
pub enum Scripted {
    Outcome(QueryOutcome),
    Fail(DbError),
    /// Fail with a connection error and mark the connection dead
    Die,
}

/// A recorded statement execution
#[derive(Debug, Clone)]
pub struct Execution {
    pub connection_id: usize,
    pub sql: String,
    pub at: Instant,
}

/// State shared by a factory and every connection it created
#[derive(Default)]
pub struct MockState {
    script: Mutex<VecDeque<Scripted>>,
    executions: Mutex<Vec<Execution>>,
    events: Mutex<Vec<String>>,
    statement_delay: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    closes: AtomicUsize,
}

impl MockState {
    fn next_outcome(&self, statement: &Statement) -> Scripted {
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Scripted::Outcome(default_outcome(statement)))
    }

    async fn run(
        &self,
        connection_id: usize,
        closed: &AtomicBool,
        statement: &Statement,
    ) -> Result<QueryOutcome> {
        if closed.load(Ordering::SeqCst) {
            return Err(DbError::Connection("connection is closed".into()));
        }

        let now_running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_running, Ordering::SeqCst);
        self.executions.lock().push(Execution {
            connection_id,
            sql: statement.text().to_string(),
            at: Instant::now(),
        });
        self.events
            .lock()
            .push(format!("start {}", statement.text()));

        let delay = *self.statement_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.events.lock().push(format!("end {}", statement.text()));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.next_outcome(statement) {
            Scripted::Outcome(outcome) => Ok(outcome),
            Scripted::Fail(err) => Err(err),
            Scripted::Die => {
                closed.store(true, Ordering::SeqCst);
                Err(DbError::Connection("server closed the connection unexpectedly".into()))
            }
        }
    }
}

fn default_outcome(statement: &Statement) -> QueryOutcome {
    let text = statement.text().trim_start().to_ascii_uppercase();
    if text.starts_with("SELECT") || text.contains("RETURNING") {
        QueryOutcome::Rows(vec![Row::new(
            vec!["id".to_string()],
            vec![Value::Int32(1)],
        )])
    } else {
        QueryOutcome::no_result_set(1)
    }
}

pub struct MockConnection {
    id: usize,
    closed: Arc<AtomicBool>,
    state: Arc<MockState>,
}

impl MockConnection {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Simulate the server dropping this connection
    pub fn kill(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, statement: &Statement) -> Result<QueryOutcome> {
        self.state.run(self.id, &self.closed, statement).await
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        if self.is_closed() {
            return Err(DbError::Connection("connection is closed".into()));
        }
        Ok(Box::new(MockTransaction {
            connection_id: self.id,
            closed: self.closed.clone(),
            state: self.state.clone(),
        }))
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct MockTransaction {
    connection_id: usize,
    closed: Arc<AtomicBool>,
    state: Arc<MockState>,
}

#[async_trait]
impl Transaction for MockTransaction {
    async fn execute(&self, statement: &Statement) -> Result<QueryOutcome> {
        self.state
            .run(self.connection_id, &self.closed, statement)
            .await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.state.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.state.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Factory handing out [`MockConnection`]s, optionally failing on demand
#[derive(Default)]
pub struct MockFactory {
    state: Arc<MockState>,
    created: AtomicUsize,
    failures_remaining: AtomicUsize,
    always_fail: AtomicBool,
    connections: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue outcomes for the next statement executions, in order
    pub fn script(&self, outcomes: impl IntoIterator<Item = Scripted>) {
        self.state.script.lock().extend(outcomes);
    }

    pub fn set_statement_delay(&self, delay: Duration) {
        *self.state.statement_delay.lock() = delay;
    }

    /// Make the next `count` connection attempts fail
    pub fn fail_next_creates(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn fail_all_creates(&self, fail: bool) {
        self.always_fail.store(fail, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn connection(&self, index: usize) -> Option<Arc<MockConnection>> {
        self.connections.lock().get(index).cloned()
    }

    pub fn kill_all(&self) {
        for connection in self.connections.lock().iter() {
            connection.kill();
        }
    }

    pub fn executions(&self) -> Vec<Execution> {
        self.state.executions.lock().clone()
    }

    pub fn events(&self) -> Vec<String> {
        self.state.events.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.state.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.state.rollbacks.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        if self.always_fail.load(Ordering::SeqCst)
            || self
                .failures_remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(DbError::Connection("connection refused".into()));
        }

        let id = self.created.fetch_add(1, Ordering::SeqCst);
        let connection = Arc::new(MockConnection {
            id,
            closed: Arc::new(AtomicBool::new(false)),
            state: self.state.clone(),
        });
        self.connections.lock().push(connection.clone());
        Ok(connection)
    }
}
