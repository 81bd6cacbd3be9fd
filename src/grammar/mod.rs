//! SQL generation for model statements.
//!
//! A [`Grammar`] builds DELETE, INSERT, UPDATE and UPSERT statements from a
//! table name and lists of column names. The statement builders are shared;
//! dialects differ only in how parameters are rendered, whether a RETURNING
//! clause is available, and how the UPSERT target is referenced.
//!
//! Dialects:
//! - [`Postgres`]: `$1, $2, ...` parameters, RETURNING, UPSERT target aliased as `dest`
//! - [`Sqlite`]: `?` parameters, RETURNING, UPSERT target referenced by table name
//! - [`Generic`]: `?` parameters, RETURNING, standard SQL comparisons

mod generic;
mod postgres;
mod sqlite;

pub use generic::Generic;
pub use postgres::Postgres;
pub use sqlite::Sqlite;

use std::sync::Arc;

use serde::Deserialize;

use crate::statement::{Expect, Query, StatementKind};

/// Errors building a statement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrammarError {
    #[error("table name is required")]
    TableRequired,

    #[error("columns are required for {statement} on {table}")]
    ColumnsRequired {
        table: String,
        statement: StatementKind,
    },

    #[error("keys are required for {statement} on {table}")]
    KeysRequired {
        table: String,
        statement: StatementKind,
    },
}

/// Builds dialect-specific SQL statements.
pub trait Grammar: Send + Sync {
    /// Placeholder for the argument at zero-based position `n`, counted across
    /// the whole statement.
    fn placeholder(&self, n: usize) -> String;

    /// Whether the dialect can return columns from INSERT and UPDATE.
    fn returning(&self) -> bool {
        true
    }

    /// Alias declared for the target table of an UPSERT. Without one the
    /// conflict guard references the table by name.
    fn upsert_alias(&self) -> Option<&str> {
        None
    }

    /// Null-safe inequality used by the UPSERT guard. Plain `<>` yields NULL
    /// when either side is NULL, which would skip a NULL to value change.
    fn distinct(&self) -> &str {
        "IS DISTINCT FROM"
    }

    /// DELETE matching every key column.
    fn delete(&self, table: &str, keys: &[&str]) -> Result<Query, GrammarError> {
        validate(table, None, Some(keys), StatementKind::Delete)?;

        let mut params = Params::new(self);
        let wheres: Vec<String> = keys
            .iter()
            .map(|key| format!("{} = {}", key, params.next()))
            .collect();

        let parts = [
            format!("DELETE FROM {table}"),
            "\tWHERE".to_string(),
            format!("\t\t{}", wheres.join(" AND ")),
        ];
        Ok(Query::new(parts.join("\n")).with_arguments(keys.iter().copied()))
    }

    /// INSERT of `columns`, returning `auto` when supported.
    ///
    /// A fresh insert must produce its row, so returned columns expect exactly one row.
    fn insert(&self, table: &str, columns: &[&str], auto: &[&str]) -> Result<Query, GrammarError> {
        validate(table, Some(columns), None, StatementKind::Insert)?;

        let mut params = Params::new(self);
        let values = params.take(columns.len());

        let mut parts = vec![
            format!("INSERT INTO {table}"),
            format!("\t\t( {} )", columns.join(", ")),
            "\tVALUES".to_string(),
            format!("\t\t( {} )", values.join(", ")),
        ];
        let query = Query::new(String::new()).with_arguments(columns.iter().copied());
        Ok(finish(self, &mut parts, query, auto, Expect::Row))
    }

    /// UPDATE of `columns` where every key matches; arguments are columns then keys.
    ///
    /// An UPDATE may match no rows, so returned columns expect one row or none.
    fn update(
        &self,
        table: &str,
        columns: &[&str],
        keys: &[&str],
        auto: &[&str],
    ) -> Result<Query, GrammarError> {
        validate(table, Some(columns), Some(keys), StatementKind::Update)?;

        let mut params = Params::new(self);
        let sets: Vec<String> = columns
            .iter()
            .map(|column| format!("{} = {}", column, params.next()))
            .collect();
        let wheres: Vec<String> = keys
            .iter()
            .map(|key| format!("{} = {}", key, params.next()))
            .collect();

        let mut parts = vec![
            format!("UPDATE {table} SET"),
            format!("\t\t{}", sets.join(",\n\t\t")),
            "\tWHERE".to_string(),
            format!("\t\t{}", wheres.join(" AND ")),
        ];
        let query = Query::new(String::new())
            .with_arguments(columns.iter().chain(keys.iter()).copied());
        Ok(finish(self, &mut parts, query, auto, Expect::RowOrNone))
    }

    /// INSERT of keys then columns that updates the columns on key conflict.
    ///
    /// The update only fires when at least one column differs from the stored
    /// row, NULLs included, so unchanged rows do not touch update-timestamp
    /// columns.
    fn upsert(
        &self,
        table: &str,
        columns: &[&str],
        keys: &[&str],
        auto: &[&str],
    ) -> Result<Query, GrammarError> {
        validate(table, Some(columns), Some(keys), StatementKind::Upsert)?;

        let arguments: Vec<&str> = keys.iter().chain(columns.iter()).copied().collect();
        let mut params = Params::new(self);
        let values = params.take(arguments.len());

        let (target, qualifier) = match self.upsert_alias() {
            Some(alias) => (format!("{table} AS {alias}"), alias.to_string()),
            None => (table.to_string(), table.to_string()),
        };
        let sets: Vec<String> = columns
            .iter()
            .map(|column| format!("{column} = EXCLUDED.{column}"))
            .collect();
        let distinct = self.distinct();
        let guards: Vec<String> = columns
            .iter()
            .map(|column| format!("{qualifier}.{column} {distinct} EXCLUDED.{column}"))
            .collect();

        let mut parts = vec![
            format!("INSERT INTO {target}"),
            format!("\t\t( {} )", arguments.join(", ")),
            "\tVALUES".to_string(),
            format!("\t\t( {} )", values.join(", ")),
            format!("\tON CONFLICT( {} ) DO UPDATE SET", keys.join(", ")),
            format!("\t\t{}", sets.join(", ")),
            "\t\tWHERE (".to_string(),
            format!("\t\t\t{}", guards.join(" OR ")),
            "\t\t)".to_string(),
        ];
        let query = Query::new(String::new()).with_arguments(arguments);
        Ok(finish(self, &mut parts, query, auto, Expect::RowOrNone))
    }
}

/// Selects one of the built-in grammars.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `?` parameters, RETURNING, `IS DISTINCT FROM` guard.
    Generic,
    #[default]
    Sqlite,
    Postgres,
}

impl Dialect {
    pub fn grammar(&self) -> Arc<dyn Grammar> {
        match self {
            Dialect::Generic => Arc::new(Generic),
            Dialect::Sqlite => Arc::new(Sqlite),
            Dialect::Postgres => Arc::new(Postgres),
        }
    }
}

/// Hands out placeholders in statement order.
struct Params<'g, G: ?Sized> {
    grammar: &'g G,
    n: usize,
}

impl<'g, G: Grammar + ?Sized> Params<'g, G> {
    fn new(grammar: &'g G) -> Self {
        Self { grammar, n: 0 }
    }

    fn next(&mut self) -> String {
        let placeholder = self.grammar.placeholder(self.n);
        self.n += 1;
        placeholder
    }

    fn take(&mut self, count: usize) -> Vec<String> {
        (0..count).map(|_| self.next()).collect()
    }
}

fn validate(
    table: &str,
    columns: Option<&[&str]>,
    keys: Option<&[&str]>,
    statement: StatementKind,
) -> Result<(), GrammarError> {
    if table.is_empty() {
        return Err(GrammarError::TableRequired);
    }
    if columns.is_some_and(|c| c.is_empty()) {
        return Err(GrammarError::ColumnsRequired {
            table: table.to_string(),
            statement,
        });
    }
    if keys.is_some_and(|k| k.is_empty()) {
        return Err(GrammarError::KeysRequired {
            table: table.to_string(),
            statement,
        });
    }
    Ok(())
}

/// Append RETURNING when `auto` is non-empty and the dialect supports it, then
/// assemble the SQL.
fn finish<G: Grammar + ?Sized>(
    grammar: &G,
    parts: &mut Vec<String>,
    mut query: Query,
    auto: &[&str],
    expect: Expect,
) -> Query {
    if grammar.returning() && !auto.is_empty() {
        parts.push(format!("\tRETURNING {}", auto.join(", ")));
        query = query.with_scan(auto.iter().copied(), expect);
    }
    query.sql = parts.join("\n");
    query
}
