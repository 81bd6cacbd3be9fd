//! Record types and their field metadata.
//!
//! A record is a plain struct whose fields map to table columns. The
//! [`record!`](crate::record!) macro implements [`Record`] for such a struct.

use crate::mapper::MapperError;
use crate::value::Value;

/// A field of a record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    /// Rust field name.
    pub name: &'static str,
    /// Column name when it differs from the field name.
    pub column: Option<&'static str>,
    /// Model metadata: `key`, `key,auto`, `inserted`, `updated`, `unique`, ...
    pub tag: &'static str,
    /// Rust type of the field.
    pub type_name: &'static str,
}

impl Field {
    /// The column this field maps to when no mapper renames it.
    pub fn column_name(&self) -> &'static str {
        self.column.unwrap_or(self.name)
    }
}

/// A type whose values can be written to and read from a table.
pub trait Record: Send + Sync + 'static {
    /// Table name declared on the type; an explicit name given at
    /// registration takes precedence.
    const TABLE_NAME: Option<&'static str> = None;

    /// Fields in declaration order.
    fn fields() -> Vec<Field>;

    /// Current value of `field`, or `None` if the type has no such field.
    fn get(&self, field: &str) -> Option<Value>;

    /// Assign `value` to `field`.
    fn set(&mut self, field: &str, value: Value) -> Result<(), MapperError>;
}

/// Short type name used in error messages.
pub fn record_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[doc(hidden)]
pub fn field_type_name<R, T, F>(_: F) -> &'static str
where
    F: Fn(&R) -> &T,
{
    std::any::type_name::<T>()
}

/// Implement [`Record`] for a struct.
///
/// ```ignore
/// #[derive(Debug, Default)]
/// struct Address {
///     id: i64,
///     created_time: DateTime<Utc>,
///     street: String,
/// }
///
/// modelsql::record! {
///     Address, table = "addresses", {
///         id as "pk": "key,auto",
///         created_time as "created_tmz": "inserted",
///         street: "",
///     }
/// }
/// ```
#[macro_export]
macro_rules! record {
    (@option) => { ::std::option::Option::None };
    (@option $value:literal) => { ::std::option::Option::Some($value) };
    (
        $ty:ty $(, table = $table:literal)?, {
            $( $field:ident $(as $column:literal)? : $tag:literal ),* $(,)?
        }
    ) => {
        impl $crate::Record for $ty {
            const TABLE_NAME: ::std::option::Option<&'static str> = $crate::record!(@option $($table)?);

            fn fields() -> ::std::vec::Vec<$crate::Field> {
                ::std::vec![
                    $(
                        $crate::Field {
                            name: ::std::stringify!($field),
                            column: $crate::record!(@option $($column)?),
                            tag: $tag,
                            type_name: $crate::record::field_type_name(|r: &$ty| &r.$field),
                        }
                    ),*
                ]
            }

            fn get(&self, field: &str) -> ::std::option::Option<$crate::Value> {
                match field {
                    $( ::std::stringify!($field) => ::std::option::Option::Some($crate::ToValue::to_value(&self.$field)), )*
                    _ => ::std::option::Option::None,
                }
            }

            fn set(&mut self, field: &str, value: $crate::Value) -> ::std::result::Result<(), $crate::MapperError> {
                match field {
                    $(
                        ::std::stringify!($field) => {
                            self.$field = $crate::FromValue::from_value(value).map_err(|source| {
                                $crate::MapperError::Conversion {
                                    field: ::std::string::ToString::to_string(field),
                                    source,
                                }
                            })?;
                            ::std::result::Result::Ok(())
                        }
                    )*
                    _ => ::std::result::Result::Err($crate::MapperError::UnknownField {
                        record: $crate::record::record_name::<$ty>(),
                        field: ::std::string::ToString::to_string(field),
                    }),
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Address {
        id: i64,
        street: String,
        zip: Option<String>,
    }

    crate::record! {
        Address, table = "addresses", {
            id as "pk": "key,auto",
            street: "",
            zip: "",
        }
    }

    #[derive(Debug, Default)]
    struct Untitled {
        value: i32,
    }

    crate::record! {
        Untitled, {
            value: "",
        }
    }

    #[test]
    fn test_macro_fields() {
        let fields = Address::fields();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].name, "id");
        assert_eq!(fields[0].column_name(), "pk");
        assert_eq!(fields[0].tag, "key,auto");
        assert_eq!(fields[0].type_name, "i64");
        assert_eq!(fields[1].column_name(), "street");
        assert_eq!(Address::TABLE_NAME, Some("addresses"));
        assert_eq!(Untitled::TABLE_NAME, None);
    }

    #[test]
    fn test_macro_get_and_set() {
        let mut address = Address::default();
        address.set("id", Value::Int(42)).unwrap();
        address.set("zip", Value::Text("90210".into())).unwrap();
        assert_eq!(address.id, 42);
        assert_eq!(address.get("zip"), Some(Value::Text("90210".into())));
        assert_eq!(address.get("street"), Some(Value::Text(String::new())));
        assert_eq!(address.get("nope"), None);
    }

    #[test]
    fn test_macro_set_errors() {
        let mut address = Address::default();
        let err = address.set("nope", Value::Int(1)).unwrap_err();
        assert!(matches!(err, MapperError::UnknownField { record: "Address", .. }));
        let err = address.set("id", Value::Text("x".into())).unwrap_err();
        assert!(matches!(err, MapperError::Conversion { .. }));
    }
}
