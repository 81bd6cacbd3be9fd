//! Scripted in-memory connection for testing.
//!
//! `MockConnection` records every call it receives, answers row queries from a
//! scripted queue, and can be told to fail at specific points. Clones share
//! state, so a test can keep one handle for assertions after handing another
//! to the code under test.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{Capabilities, Capability, Connection, ConnectionError, PreparedStatement, Transaction};
use crate::value::{Row, Value};

/// A call received by the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Exec { sql: String, args: Vec<Value> },
    Query { sql: String, args: Vec<Value> },
    QueryRow { sql: String, args: Vec<Value> },
    Begin,
    Prepare { sql: String },
    StatementExec { args: Vec<Value> },
    StatementQueryRow { args: Vec<Value> },
    StatementClose,
    Commit,
    Rollback,
}

impl Call {
    /// True for calls that run a statement against the database.
    pub fn is_execution(&self) -> bool {
        matches!(
            self,
            Call::Exec { .. }
                | Call::Query { .. }
                | Call::QueryRow { .. }
                | Call::StatementExec { .. }
                | Call::StatementQueryRow { .. }
        )
    }
}

/// Failures injected by the mock.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MockError {
    #[error("mock execution {0} failed")]
    Execution(usize),
    #[error("mock begin failed")]
    Begin,
    #[error("mock prepare failed")]
    Prepare,
    #[error("mock commit failed")]
    Commit,
    #[error("mock rollback failed")]
    Rollback,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<Call>,
    rows: VecDeque<Option<Row>>,
    executions: usize,
    affected: u64,
    fail_on_execution: Option<usize>,
    fail_on_begin: bool,
    fail_on_prepare: bool,
    fail_on_commit: bool,
    fail_on_rollback: bool,
}

impl State {
    /// Log `call` and apply execution failure injection.
    fn execute(&mut self, call: Call) -> Result<(), ConnectionError> {
        self.calls.push(call);
        self.executions += 1;
        if self.fail_on_execution == Some(self.executions) {
            return Err(ConnectionError::other(MockError::Execution(self.executions)));
        }
        Ok(())
    }

    fn next_row(&mut self) -> Option<Row> {
        self.rows.pop_front().flatten()
    }
}

/// In-memory connection that records calls.
#[derive(Debug, Clone, Default)]
pub struct MockConnection {
    capabilities: Capabilities,
    state: Arc<Mutex<State>>,
}

impl MockConnection {
    /// A connection with neither transactions nor prepared statements.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            ..Self::default()
        }
    }

    /// Queue the result of the next row query. `None` answers with no rows.
    pub async fn push_row(&self, row: Option<Row>) {
        self.state.lock().await.rows.push_back(row);
    }

    /// Affected-row count reported by every exec.
    pub async fn set_affected(&self, affected: u64) {
        self.state.lock().await.affected = affected;
    }

    /// Fail the `n`th statement execution (1-based).
    pub async fn set_fail_on_execution(&self, n: usize) {
        self.state.lock().await.fail_on_execution = Some(n);
    }

    pub async fn set_fail_on_begin(&self, fail: bool) {
        self.state.lock().await.fail_on_begin = fail;
    }

    pub async fn set_fail_on_prepare(&self, fail: bool) {
        self.state.lock().await.fail_on_prepare = fail;
    }

    pub async fn set_fail_on_commit(&self, fail: bool) {
        self.state.lock().await.fail_on_commit = fail;
    }

    pub async fn set_fail_on_rollback(&self, fail: bool) {
        self.state.lock().await.fail_on_rollback = fail;
    }

    /// Every call received so far, in order.
    pub async fn calls(&self) -> Vec<Call> {
        self.state.lock().await.calls.clone()
    }

    /// Number of recorded calls accepted by `matches`.
    pub async fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().await.calls.iter().filter(|c| matches(c)).count()
    }
}

#[async_trait]
impl Connection for MockConnection {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn exec(&mut self, sql: &str, args: &[Value]) -> Result<u64, ConnectionError> {
        let mut state = self.state.lock().await;
        state.execute(Call::Exec {
            sql: sql.to_string(),
            args: args.to_vec(),
        })?;
        Ok(state.affected)
    }

    async fn query(&mut self, sql: &str, args: &[Value]) -> Result<Vec<Row>, ConnectionError> {
        let mut state = self.state.lock().await;
        state.execute(Call::Query {
            sql: sql.to_string(),
            args: args.to_vec(),
        })?;
        Ok(std::iter::from_fn(|| state.rows.pop_front()).flatten().collect())
    }

    async fn query_row(
        &mut self,
        sql: &str,
        args: &[Value],
    ) -> Result<Option<Row>, ConnectionError> {
        let mut state = self.state.lock().await;
        state.execute(Call::QueryRow {
            sql: sql.to_string(),
            args: args.to_vec(),
        })?;
        Ok(state.next_row())
    }

    async fn begin<'a>(&'a mut self) -> Result<Box<dyn Transaction + 'a>, ConnectionError> {
        if !self.capabilities.transactions {
            return Err(ConnectionError::Unsupported(Capability::Transactions));
        }
        let mut state = self.state.lock().await;
        state.calls.push(Call::Begin);
        if state.fail_on_begin {
            return Err(ConnectionError::other(MockError::Begin));
        }
        Ok(Box::new(MockTransaction {
            conn: MockConnection {
                capabilities: Capabilities {
                    transactions: false,
                    ..self.capabilities
                },
                state: self.state.clone(),
            },
        }))
    }

    async fn prepare<'a>(
        &'a mut self,
        sql: &str,
    ) -> Result<Box<dyn PreparedStatement + 'a>, ConnectionError> {
        if !self.capabilities.prepared_statements {
            return Err(ConnectionError::Unsupported(Capability::PreparedStatements));
        }
        let mut state = self.state.lock().await;
        state.calls.push(Call::Prepare {
            sql: sql.to_string(),
        });
        if state.fail_on_prepare {
            return Err(ConnectionError::other(MockError::Prepare));
        }
        Ok(Box::new(MockStatement {
            state: self.state.clone(),
        }))
    }
}

/// Transaction handed out by [`MockConnection::begin`].
#[derive(Debug)]
pub struct MockTransaction {
    conn: MockConnection,
}

#[async_trait]
impl Connection for MockTransaction {
    fn capabilities(&self) -> Capabilities {
        self.conn.capabilities
    }

    async fn exec(&mut self, sql: &str, args: &[Value]) -> Result<u64, ConnectionError> {
        self.conn.exec(sql, args).await
    }

    async fn query(&mut self, sql: &str, args: &[Value]) -> Result<Vec<Row>, ConnectionError> {
        self.conn.query(sql, args).await
    }

    async fn query_row(
        &mut self,
        sql: &str,
        args: &[Value],
    ) -> Result<Option<Row>, ConnectionError> {
        self.conn.query_row(sql, args).await
    }

    async fn prepare<'a>(
        &'a mut self,
        sql: &str,
    ) -> Result<Box<dyn PreparedStatement + 'a>, ConnectionError> {
        self.conn.prepare(sql).await
    }
}

#[async_trait]
impl Transaction for MockTransaction {
    async fn commit(self: Box<Self>) -> Result<(), ConnectionError> {
        let mut state = self.conn.state.lock().await;
        state.calls.push(Call::Commit);
        if state.fail_on_commit {
            return Err(ConnectionError::other(MockError::Commit));
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), ConnectionError> {
        let mut state = self.conn.state.lock().await;
        state.calls.push(Call::Rollback);
        if state.fail_on_rollback {
            return Err(ConnectionError::other(MockError::Rollback));
        }
        Ok(())
    }

    fn as_connection(&mut self) -> &mut dyn Connection {
        self
    }
}

/// Statement handed out by [`MockConnection::prepare`].
#[derive(Debug)]
pub struct MockStatement {
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl PreparedStatement for MockStatement {
    async fn exec(&mut self, args: &[Value]) -> Result<u64, ConnectionError> {
        let mut state = self.state.lock().await;
        state.execute(Call::StatementExec {
            args: args.to_vec(),
        })?;
        Ok(state.affected)
    }

    async fn query_row(&mut self, args: &[Value]) -> Result<Option<Row>, ConnectionError> {
        let mut state = self.state.lock().await;
        state.execute(Call::StatementQueryRow {
            args: args.to_vec(),
        })?;
        Ok(state.next_row())
    }

    async fn close(self: Box<Self>) -> Result<(), ConnectionError> {
        self.state.lock().await.calls.push(Call::StatementClose);
        Ok(())
    }
}
