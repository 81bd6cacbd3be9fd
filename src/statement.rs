//! Statement value objects produced by a grammar.

use std::fmt;

/// How many rows a statement is expected to yield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Expect {
    /// The statement returns no rows.
    #[default]
    None,
    /// Exactly one row; zero rows is an error.
    Row,
    /// One row or none; zero rows is a successful no-op.
    RowOrNone,
    /// Any number of rows.
    Rows,
}

impl fmt::Display for Expect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Expect::None => "None",
            Expect::Row => "One Row",
            Expect::RowOrNone => "One Row or None",
            Expect::Rows => "Multiple Rows",
        };
        f.write_str(s)
    }
}

/// A SQL statement plus the column names that feed and receive its values.
///
/// `arguments` holds one column name per placeholder in `sql`, in placeholder
/// order. `scan` holds one column name per returned column, in result order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub sql: String,
    pub arguments: Vec<String>,
    pub scan: Vec<String>,
    pub expect: Expect,
}

impl Query {
    /// Query with no arguments, scan columns, or row expectation.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..Self::default()
        }
    }

    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments = arguments.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_scan<I, S>(mut self, scan: I, expect: Expect) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scan = scan.into_iter().map(Into::into).collect();
        self.expect = expect;
        self
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sql.is_empty() {
            return f.write_str("Empty Query.");
        }
        f.write_str(&self.sql)?;
        if !self.arguments.is_empty() {
            write!(f, "\n\tArguments: [{}]", self.arguments.join(" "))?;
        }
        if !self.scan.is_empty() {
            write!(f, "\n\tScan: [{}]", self.scan.join(" "))?;
        }
        write!(f, "\n\tExpect: {}", self.expect)
    }
}

/// The kind of statement a model can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Insert,
    Update,
    Upsert,
    Delete,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Insert => "INSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Upsert => "UPSERT",
            StatementKind::Delete => "DELETE",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The CRUD statements of a table.
///
/// A `None` entry means the statement could not be built for the record type
/// (for example an UPDATE on a table without keys).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statements {
    pub insert: Option<Query>,
    pub update: Option<Query>,
    pub upsert: Option<Query>,
    pub delete: Option<Query>,
}

impl Statements {
    pub fn get(&self, kind: StatementKind) -> Option<&Query> {
        match kind {
            StatementKind::Insert => self.insert.as_ref(),
            StatementKind::Update => self.update.as_ref(),
            StatementKind::Upsert => self.upsert.as_ref(),
            StatementKind::Delete => self.delete.as_ref(),
        }
    }
}

impl fmt::Display for Statements {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds = [
            StatementKind::Insert,
            StatementKind::Update,
            StatementKind::Upsert,
            StatementKind::Delete,
        ];
        for (n, kind) in kinds.into_iter().enumerate() {
            if n > 0 {
                f.write_str("\n")?;
            }
            match self.get(kind) {
                Some(query) => write!(f, "{kind}: {query}")?,
                None => write!(f, "{kind}: Nil Query.")?,
            }
        }
        Ok(())
    }
}
