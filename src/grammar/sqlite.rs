use super::Grammar;

/// SQLite: positional `?` parameters with RETURNING.
///
/// `IS NOT` is SQLite's null-safe inequality and predates its support for
/// `IS DISTINCT FROM`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Grammar for Sqlite {
    fn placeholder(&self, _n: usize) -> String {
        "?".to_string()
    }

    fn distinct(&self) -> &str {
        "IS NOT"
    }
}
