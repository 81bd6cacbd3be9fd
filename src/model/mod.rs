//! Registered record types and the engine that runs their statements.

mod binding;

pub use binding::QueryBinding;

use std::fmt;

use crate::mapper::{Mapper, Mapping};
use crate::record::Record;
use crate::schema::Table;
use crate::statement::{Query, Statements};

/// Which write operation `save` performs for a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveMode {
    /// No key fields; records can only be inserted.
    Insert,
    /// Only database-generated keys. Records whose keys are all zero are
    /// inserted, others are updated.
    InsertOrUpdate,
    /// At least one caller-supplied key.
    Upsert,
}

impl SaveMode {
    /// Save mode for a model with the given key counts.
    pub fn classify(keys: usize, auto_keys: usize) -> Self {
        match (keys, auto_keys) {
            (k, _) if k > 0 => SaveMode::Upsert,
            (_, 0) => SaveMode::Insert,
            _ => SaveMode::InsertOrUpdate,
        }
    }
}

impl fmt::Display for SaveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveMode::Insert => f.write_str("Insert"),
            SaveMode::InsertOrUpdate => f.write_str("InsertOrUpdate"),
            SaveMode::Upsert => f.write_str("Upsert"),
        }
    }
}

/// A registered record type: its table, prebuilt statements and save mode.
///
/// Models are built once by [`Models::register`](crate::Models::register) and
/// are read-only afterward.
#[derive(Debug, Clone)]
pub struct Model {
    pub(crate) record: &'static str,
    pub(crate) table: Table,
    pub(crate) statements: Statements,
    pub(crate) save_mode: SaveMode,
    /// Field names of database-generated keys.
    pub(crate) auto_keys: Vec<&'static str>,
    pub(crate) mapping: Mapping,
}

impl Model {
    /// Short name of the record type.
    pub fn record(&self) -> &'static str {
        self.record
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn statements(&self) -> &Statements {
        &self.statements
    }

    pub fn save_mode(&self) -> SaveMode {
        self.save_mode
    }

    pub fn mapping(&self) -> &Mapping {
        &self.mapping
    }

    /// True when any database-generated key of `value` is set, meaning the
    /// record already exists.
    pub fn has_auto_key<T: Record>(&self, value: &T) -> bool {
        self.auto_keys
            .iter()
            .any(|field| value.get(field).is_some_and(|v| !v.is_zero()))
    }

    /// Bind `query` to this model so it can run against records of the model's type.
    pub fn bind<'a, M: Mapper>(&'a self, mapper: &'a M, query: &'a Query) -> QueryBinding<'a, M> {
        QueryBinding::new(mapper, self, query)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} save={}\n{}", self.record, self.save_mode, self.table)
    }
}
