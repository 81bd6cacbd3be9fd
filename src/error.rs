//! Crate-level error type.

use crate::connection::ConnectionError;
use crate::grammar::GrammarError;
use crate::mapper::MapperError;
use crate::statement::Expect;

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or running model statements.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error("no table name for {record}; register it with an explicit table name or declare TABLE_NAME")]
    MissingTableName { record: &'static str },

    #[error("{operation} is not supported for {record}")]
    Unsupported {
        operation: &'static str,
        record: &'static str,
    },

    #[error("{record} is not registered")]
    NotRegistered { record: &'static str },

    #[error(transparent)]
    Mapper(#[from] MapperError),

    #[error("query returned no rows (expected {expect})")]
    NoRows { expect: Expect },

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

impl Error {
    /// True when the error was raised by the underlying connection.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection(_))
    }
}
