//! Scripted in-memory connection pool shared by the integration tests.
//!
//! `MockPool` records every call the engine makes (acquire, release, begin,
//! rollback, statements) and answers statements from a list of scripted
//! responses. A response can be held behind a `Notify` to simulate a slow
//! statement. Connections that ran `SET SESSION TRANSACTION READ ONLY` reject
//! writes inside their transaction the way MySQL does (error 1792), and caller
//! statements are refused when several are stacked in one call (error 1064),
//! as the prepared-statement protocol does.

#![allow(dead_code)]

use mysql_mcp_server::db::classifier::has_multiple_statements;
use mysql_mcp_server::db::{ConnectionPool, PooledConnection, classify};
use mysql_mcp_server::error::{
    DbError, DbResult, ER_CANT_EXECUTE_IN_READ_ONLY_TRANSACTION, ER_PARSE_ERROR,
};
use mysql_mcp_server::models::{
    ColumnMetadata, ExecutionPolicy, ExecutionResult, RowSet, StatementIntent, WriteEffect,
};
use mysql_mcp_server::QueryRunner;
use serde_json::Value as JsonValue;
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

pub const DEFAULT_CAPACITY: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Acquire(usize),
    Release(usize),
    PoolExecute(String),
    Execute(usize, String),
    SetReadOnly(usize),
    Begin(usize),
    Rollback(usize),
}

/// Scripted answer for statements containing a pattern.
#[derive(Clone)]
pub enum Response {
    Rows(RowSet),
    Effect(WriteEffect),
    Fail { message: String, number: Option<u16> },
    /// Wait for the gate to be notified, then answer.
    Held(Arc<Notify>, Box<Response>),
}

#[derive(Default)]
struct MockState {
    events: Vec<Event>,
    next_id: usize,
    leased: usize,
    responses: Vec<(String, Response)>,
    committed: Vec<String>,
    fail_acquire: bool,
    fail_read_only_setup: bool,
    fail_begin: bool,
    fail_rollback: bool,
}

#[derive(Clone)]
pub struct MockPool {
    state: Arc<Mutex<MockState>>,
    permits: Arc<Semaphore>,
}

impl Default for MockPool {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl MockPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            permits: Arc::new(Semaphore::new(capacity)),
        }
    }

    /// Answer statements containing `pattern` (case-insensitive) with `response`.
    /// Earlier scripts win.
    pub fn respond(&self, pattern: &str, response: Response) -> &Self {
        self.state
            .lock()
            .unwrap()
            .responses
            .push((pattern.to_uppercase(), response));
        self
    }

    /// Hold statements containing `pattern` until the returned gate is notified.
    pub fn hold(&self, pattern: &str, then: Response) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.respond(pattern, Response::Held(Arc::clone(&gate), Box::new(then)));
        gate
    }

    pub fn fail_acquire(&self) {
        self.state.lock().unwrap().fail_acquire = true;
    }

    pub fn fail_read_only_setup(&self) {
        self.state.lock().unwrap().fail_read_only_setup = true;
    }

    pub fn fail_begin(&self) {
        self.state.lock().unwrap().fail_begin = true;
    }

    pub fn fail_rollback(&self) {
        self.state.lock().unwrap().fail_rollback = true;
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    /// Connections currently leased and not yet released.
    pub fn leased(&self) -> usize {
        self.state.lock().unwrap().leased
    }

    /// Writes that took effect (auto-commit, or outside a transaction).
    pub fn committed(&self) -> Vec<String> {
        self.state.lock().unwrap().committed.clone()
    }

    /// Every statement text sent to the database, in order.
    pub fn statements(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::PoolExecute(sql) | Event::Execute(_, sql) => Some(sql),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| matches(e)).count()
    }

    pub fn acquires(&self) -> usize {
        self.count(|e| matches!(e, Event::Acquire(_)))
    }

    pub fn releases(&self) -> usize {
        self.count(|e| matches!(e, Event::Release(_)))
    }

    pub fn begins(&self) -> usize {
        self.count(|e| matches!(e, Event::Begin(_)))
    }

    pub fn rollbacks(&self) -> usize {
        self.count(|e| matches!(e, Event::Rollback(_)))
    }

    pub fn read_only_setups(&self) -> usize {
        self.count(|e| matches!(e, Event::SetReadOnly(_)))
    }

    fn record(&self, event: Event) {
        self.state.lock().unwrap().events.push(event);
    }

    fn lookup(&self, sql: &str) -> Option<Response> {
        let upper = sql.to_uppercase();
        self.state
            .lock()
            .unwrap()
            .responses
            .iter()
            .find(|(pattern, _)| upper.contains(pattern.as_str()))
            .map(|(_, response)| response.clone())
    }

    async fn answer(&self, sql: &str) -> DbResult<ExecutionResult> {
        if has_multiple_statements(sql) {
            return Err(stacked_statement_error());
        }

        let mut response = self.lookup(sql);
        loop {
            match response {
                None => return Ok(ExecutionResult::Effect(WriteEffect::default())),
                Some(Response::Rows(rows)) => return Ok(ExecutionResult::Rows(rows)),
                Some(Response::Effect(effect)) => return Ok(ExecutionResult::Effect(effect)),
                Some(Response::Fail { message, number }) => {
                    return Err(DbError::Execution {
                        message,
                        sql_state: None,
                        number,
                    });
                }
                Some(Response::Held(gate, then)) => {
                    gate.notified().await;
                    response = Some(*then);
                }
            }
        }
    }
}

fn is_write(sql: &str) -> bool {
    classify(sql).intent == StatementIntent::Write
}

pub fn read_only_violation() -> DbError {
    DbError::Execution {
        message: "Cannot execute statement in a READ ONLY transaction.".to_string(),
        sql_state: Some("25006".to_string()),
        number: Some(ER_CANT_EXECUTE_IN_READ_ONLY_TRANSACTION),
    }
}

pub fn stacked_statement_error() -> DbError {
    DbError::Execution {
        message: "You have an error in your SQL syntax; check the manual that corresponds to your MySQL server version for the right syntax to use near ';'".to_string(),
        sql_state: Some("42000".to_string()),
        number: Some(ER_PARSE_ERROR),
    }
}

pub struct MockConnection {
    id: usize,
    pool: MockPool,
    read_only: bool,
    in_transaction: bool,
    pending: Vec<String>,
    _permit: OwnedSemaphorePermit,
}

impl MockConnection {
    pub fn id(&self) -> usize {
        self.id
    }
}

impl PooledConnection for MockConnection {
    async fn execute(&mut self, sql: &str) -> DbResult<ExecutionResult> {
        self.pool.record(Event::Execute(self.id, sql.to_string()));

        let write = is_write(sql);
        if write && self.read_only && self.in_transaction {
            return Err(read_only_violation());
        }

        let result = self.pool.answer(sql).await?;
        if write {
            if self.in_transaction {
                self.pending.push(sql.to_string());
            } else {
                self.pool.state.lock().unwrap().committed.push(sql.to_string());
            }
        }
        Ok(result)
    }

    async fn set_read_only(&mut self) -> DbResult<()> {
        self.pool.record(Event::SetReadOnly(self.id));
        if self.pool.state.lock().unwrap().fail_read_only_setup {
            return Err(DbError::execution("Lost connection to MySQL server during query"));
        }
        self.read_only = true;
        Ok(())
    }

    async fn begin_transaction(&mut self) -> DbResult<()> {
        self.pool.record(Event::Begin(self.id));
        if self.pool.state.lock().unwrap().fail_begin {
            return Err(DbError::execution("Deadlock found when trying to get lock"));
        }
        self.in_transaction = true;
        Ok(())
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.pool.record(Event::Rollback(self.id));
        self.pending.clear();
        self.in_transaction = false;
        if self.pool.state.lock().unwrap().fail_rollback {
            return Err(DbError::execution("Lost connection to MySQL server during rollback"));
        }
        Ok(())
    }
}

impl ConnectionPool for MockPool {
    type Connection = MockConnection;

    async fn acquire(&self) -> DbResult<MockConnection> {
        if self.state.lock().unwrap().fail_acquire {
            return Err(DbError::resource("pool timed out while waiting for an open connection"));
        }

        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| DbError::resource("pool closed"))?;

        let id = {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            state.leased += 1;
            let id = state.next_id;
            state.events.push(Event::Acquire(id));
            id
        };

        Ok(MockConnection {
            id,
            pool: self.clone(),
            read_only: false,
            in_transaction: false,
            pending: Vec::new(),
            _permit: permit,
        })
    }

    fn release(&self, conn: MockConnection) {
        let mut state = self.state.lock().unwrap();
        state.leased -= 1;
        state.events.push(Event::Release(conn.id));
    }

    async fn execute(&self, sql: &str) -> DbResult<ExecutionResult> {
        self.record(Event::PoolExecute(sql.to_string()));
        let result = self.answer(sql).await?;
        if is_write(sql) {
            self.state.lock().unwrap().committed.push(sql.to_string());
        }
        Ok(result)
    }
}

/// Runner over a fresh mock pool.
pub fn runner(readonly: bool, timeout_ms: u64) -> (Arc<MockPool>, QueryRunner<MockPool>) {
    let pool = Arc::new(MockPool::new());
    let runner = QueryRunner::new(Arc::clone(&pool), ExecutionPolicy::new(readonly, timeout_ms));
    (pool, runner)
}

pub fn rows(columns: &[&str], rows: Vec<Vec<JsonValue>>) -> RowSet {
    RowSet::new(
        columns
            .iter()
            .map(|name| ColumnMetadata::new(*name, "VARCHAR"))
            .collect(),
        rows,
    )
}

pub fn effect(affected_rows: u64) -> Response {
    Response::Effect(WriteEffect {
        affected_rows,
        changed_rows: affected_rows,
    })
}

/// Poll `condition` until it holds, failing the test after about two seconds.
pub async fn wait_for(condition: impl Fn() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
