//! Table metadata descriptors.
//!
//! These are passive values built once during model registration and never
//! mutated afterward.

use std::fmt;

/// A database column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name in the database.
    pub name: String,
    /// Rust type of the field backing the column.
    pub type_name: &'static str,
    /// SQL type, when known.
    pub sql_type: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, type_name: &'static str) -> Self {
        Self {
            name: name.into(),
            type_name,
            sql_type: None,
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rust({}) sql({})",
            self.name,
            self.type_name,
            self.sql_type.as_deref().unwrap_or("-")
        )
    }
}

/// A database index.
///
/// A primary index is always unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Index {
    pub name: Option<String>,
    pub columns: Vec<Column>,
    pub is_primary: bool,
    pub is_unique: bool,
}

impl Index {
    /// Primary key index over `columns`.
    pub fn primary(columns: Vec<Column>) -> Self {
        Self {
            name: None,
            columns,
            is_primary: true,
            is_unique: true,
        }
    }

    /// Unique index over `columns`.
    pub fn unique(columns: Vec<Column>) -> Self {
        Self {
            name: None,
            columns,
            is_primary: false,
            is_unique: true,
        }
    }

    fn is_empty(&self) -> bool {
        self.name.is_none() && self.columns.is_empty() && !self.is_primary && !self.is_unique
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        let describe = match (self.is_primary, self.columns.len() > 1) {
            (true, true) => "primary composite key",
            (true, false) => "primary key",
            (false, _) => "unique",
        };
        let names: Vec<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        let types: Vec<&str> = self.columns.iter().map(|c| c.type_name).collect();
        write!(
            f,
            "{} name={} ({}) rust({})",
            describe,
            self.name.as_deref().unwrap_or("-"),
            names.join(","),
            types.join(",")
        )
    }
}

/// A database table as seen by a registered model.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    /// Primary key; not repeated in `unique`.
    pub primary_key: Index,
    pub unique: Vec<Index>,
    /// Columns explicitly supplied by callers (neither keys nor auto-populated).
    pub columns: Vec<Column>,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "- (table, name unknown)")?;
        } else {
            write!(f, "{}", self.name)?;
        }
        let primary = self.primary_key.to_string();
        if !primary.is_empty() {
            write!(f, "\n\t{primary}")?;
        }
        if !self.columns.is_empty() {
            write!(f, "\n\tcolumns")?;
            for column in &self.columns {
                write!(f, "\n\t\t{column}")?;
            }
        }
        if !self.unique.is_empty() {
            write!(f, "\n\tunique indexes")?;
            for index in &self.unique {
                write!(f, "\n\t\t{index}")?;
            }
        }
        Ok(())
    }
}
