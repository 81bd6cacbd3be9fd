use super::Grammar;

/// PostgreSQL: numbered `$N` parameters, RETURNING, and an aliased UPSERT target.
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Grammar for Postgres {
    fn placeholder(&self, n: usize) -> String {
        format!("${}", n + 1)
    }

    fn upsert_alias(&self) -> Option<&str> {
        Some("dest")
    }
}
