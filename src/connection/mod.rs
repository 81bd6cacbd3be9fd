//! Connection abstraction consumed by the execution engine.
//!
//! A [`Connection`] runs SQL with positional [`Value`] arguments. Transactions
//! and prepared statements are optional: a connection advertises them through
//! [`Connection::capabilities`], and the engine only calls [`Connection::begin`]
//! or [`Connection::prepare`] when the matching capability is set.

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
mod transact;

pub use transact::{transact, transact_rollback};

use std::fmt;

use async_trait::async_trait;

use crate::value::{Row, Value};

/// Optional features a connection may support.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub transactions: bool,
    pub prepared_statements: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            transactions: true,
            prepared_statements: true,
        }
    }
}

/// A capability that was requested but not provided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Transactions,
    PreparedStatements,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Transactions => f.write_str("transactions"),
            Capability::PreparedStatements => f.write_str("prepared statements"),
        }
    }
}

/// Errors raised by a connection. Driver errors pass through unchanged.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection does not support {0}")]
    Unsupported(Capability),

    #[cfg(any(feature = "sqlite", feature = "postgres"))]
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("{0}")]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl ConnectionError {
    pub fn other(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        ConnectionError::Other(error.into())
    }
}

/// Minimal database connection.
#[async_trait]
pub trait Connection: Send {
    /// Optional features this connection supports.
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Execute a statement, returning the number of affected rows.
    async fn exec(&mut self, sql: &str, args: &[Value]) -> Result<u64, ConnectionError>;

    /// Run a query and collect every returned row.
    async fn query(&mut self, sql: &str, args: &[Value]) -> Result<Vec<Row>, ConnectionError>;

    /// Run a query returning at most one row. `Ok(None)` means no rows.
    async fn query_row(
        &mut self,
        sql: &str,
        args: &[Value],
    ) -> Result<Option<Row>, ConnectionError>;

    /// Start a transaction. Only called when `capabilities().transactions` is set.
    async fn begin<'a>(&'a mut self) -> Result<Box<dyn Transaction + 'a>, ConnectionError> {
        Err(ConnectionError::Unsupported(Capability::Transactions))
    }

    /// Prepare `sql` for repeated execution. Only called when
    /// `capabilities().prepared_statements` is set.
    async fn prepare<'a>(
        &'a mut self,
        _sql: &str,
    ) -> Result<Box<dyn PreparedStatement + 'a>, ConnectionError> {
        Err(ConnectionError::Unsupported(Capability::PreparedStatements))
    }
}

/// An open transaction. Dropping it without commit rolls back.
#[async_trait]
pub trait Transaction: Connection {
    async fn commit(self: Box<Self>) -> Result<(), ConnectionError>;

    async fn rollback(self: Box<Self>) -> Result<(), ConnectionError>;

    /// The transaction as a plain connection.
    fn as_connection(&mut self) -> &mut dyn Connection;
}

/// A statement prepared on a connection.
#[async_trait]
pub trait PreparedStatement: Send {
    async fn exec(&mut self, args: &[Value]) -> Result<u64, ConnectionError>;

    async fn query_row(&mut self, args: &[Value]) -> Result<Option<Row>, ConnectionError>;

    async fn close(self: Box<Self>) -> Result<(), ConnectionError>;
}
