use super::Grammar;

/// Positional `?` parameters, RETURNING, and standard SQL `IS DISTINCT FROM`
/// in the UPSERT guard.
#[derive(Debug, Clone, Copy, Default)]
pub struct Generic;

impl Grammar for Generic {
    fn placeholder(&self, _n: usize) -> String {
        "?".to_string()
    }
}
