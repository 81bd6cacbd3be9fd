//! Mapping between column names and record fields.
//!
//! A [`Mapper`] turns a record type's fields into a [`Mapping`] of column
//! names. Statements refer to columns by name; a [`Plan`] resolves an ordered
//! list of those names against the mapping once, and is then reused to pull
//! argument values out of records and to assign returned rows back into them.

use std::collections::HashMap;

use crate::record::{record_name, Field, Record};
use crate::value::{ConversionError, Row, Value};

/// Errors binding column names to record fields.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapperError {
    #[error("{record} has no field {field}")]
    UnknownField { record: &'static str, field: String },

    #[error("no field maps to column {column}")]
    UnknownColumn { column: String },

    #[error("cannot assign field {field}: {source}")]
    Conversion {
        field: String,
        #[source]
        source: ConversionError,
    },

    #[error("scan expects {expected} columns but the row has {actual}")]
    ScanWidth { expected: usize, actual: usize },
}

/// A field together with the column it maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedField {
    pub column: String,
    pub field: Field,
}

/// Column mapping of a record type, in field declaration order.
#[derive(Debug, Clone, Default)]
pub struct Mapping {
    fields: Vec<MappedField>,
    by_column: HashMap<String, usize>,
}

impl Mapping {
    pub fn new(fields: Vec<MappedField>) -> Self {
        let by_column = fields
            .iter()
            .enumerate()
            .map(|(n, f)| (f.column.clone(), n))
            .collect();
        Self { fields, by_column }
    }

    pub fn fields(&self) -> &[MappedField] {
        &self.fields
    }

    /// The field mapped to `column`.
    pub fn field(&self, column: &str) -> Option<&MappedField> {
        self.by_column.get(column).map(|&n| &self.fields[n])
    }

    /// Resolve `columns` to fields, in order.
    pub fn plan(&self, columns: &[String]) -> Result<Plan, MapperError> {
        let fields = columns
            .iter()
            .map(|column| {
                self.field(column)
                    .map(|mapped| mapped.field.name)
                    .ok_or_else(|| MapperError::UnknownColumn {
                        column: column.clone(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Plan { fields })
    }
}

/// An ordered list of columns resolved to record fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    fields: Vec<&'static str>,
}

impl Plan {
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Values of the planned fields of `value`, in plan order.
    pub fn arguments<T: Record>(&self, value: &T) -> Result<Vec<Value>, MapperError> {
        self.fields
            .iter()
            .map(|&field| {
                value.get(field).ok_or_else(|| MapperError::UnknownField {
                    record: record_name::<T>(),
                    field: field.to_string(),
                })
            })
            .collect()
    }

    /// Assign `row` to the planned fields of `value`, in plan order.
    pub fn assign<T: Record>(&self, value: &mut T, row: Row) -> Result<(), MapperError> {
        if row.len() != self.fields.len() {
            return Err(MapperError::ScanWidth {
                expected: self.fields.len(),
                actual: row.len(),
            });
        }
        for (&field, v) in self.fields.iter().zip(row) {
            value.set(field, v)?;
        }
        Ok(())
    }
}

/// Maps record fields to column names.
pub trait Mapper: Send + Sync {
    /// Column name for `field`.
    fn column_name(&self, field: &Field) -> String;

    /// Column mapping of `T`.
    fn mapping<T: Record>(&self) -> Mapping {
        Mapping::new(
            T::fields()
                .into_iter()
                .map(|field| MappedField {
                    column: self.column_name(&field),
                    field,
                })
                .collect(),
        )
    }

    /// Resolve `columns` against `mapping` for repeated binding.
    fn prepare(&self, mapping: &Mapping, columns: &[String]) -> Result<Plan, MapperError> {
        mapping.plan(columns)
    }
}

/// Default mapper: a field's explicit column name, else its field name.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldMapper;

impl Mapper for FieldMapper {
    fn column_name(&self, field: &Field) -> String {
        field.column_name().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Person {
        id: i64,
        first: String,
        age: i32,
    }

    crate::record! {
        Person, table = "people", {
            id as "pk": "key,auto",
            first: "",
            age: "",
        }
    }

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_mapping_uses_column_names() {
        let mapping = FieldMapper.mapping::<Person>();
        let names: Vec<&str> = mapping.fields().iter().map(|f| f.column.as_str()).collect();
        assert_eq!(names, vec!["pk", "first", "age"]);
        assert_eq!(mapping.field("pk").map(|f| f.field.name), Some("id"));
        assert!(mapping.field("id").is_none());
    }

    #[test]
    fn test_plan_arguments_in_column_order() {
        let mapping = FieldMapper.mapping::<Person>();
        let plan = FieldMapper
            .prepare(&mapping, &columns(&["age", "first", "pk"]))
            .unwrap();
        let person = Person {
            id: 9,
            first: "Ada".into(),
            age: 36,
        };
        assert_eq!(
            plan.arguments(&person).unwrap(),
            vec![Value::Int(36), Value::Text("Ada".into()), Value::Int(9)]
        );
    }

    #[test]
    fn test_plan_unknown_column() {
        let mapping = FieldMapper.mapping::<Person>();
        let err = mapping.plan(&columns(&["first", "ssn"])).unwrap_err();
        assert_eq!(
            err,
            MapperError::UnknownColumn {
                column: "ssn".into()
            }
        );
    }

    #[test]
    fn test_plan_assign() {
        let mapping = FieldMapper.mapping::<Person>();
        let plan = mapping.plan(&columns(&["pk"])).unwrap();
        let mut person = Person::default();
        plan.assign(&mut person, vec![Value::Int(12)]).unwrap();
        assert_eq!(person.id, 12);

        let err = plan.assign(&mut person, vec![]).unwrap_err();
        assert_eq!(
            err,
            MapperError::ScanWidth {
                expected: 1,
                actual: 0
            }
        );
    }
}
