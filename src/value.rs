//! Dynamically typed SQL values.
//!
//! `Value` is what flows between records and connections: arguments are
//! extracted from record fields as values, and returned rows are assigned back
//! into record fields from values.

use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

/// A single SQL scalar.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
}

/// A returned row, one value per result column.
pub type Row = Vec<Value>;

impl Value {
    /// Name of the variant, used in conversion errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
            Value::Uuid(_) => "uuid",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True when the value equals its type's zero value.
    ///
    /// Zero auto-generated keys mark a record that has not been inserted yet.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::Text(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::Timestamp(t) => *t == DateTime::<Utc>::default(),
            Value::Uuid(u) => u.is_nil(),
        }
    }
}

/// Errors converting a `Value` into a Rust type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConversionError {
    #[error("cannot convert {found} into {target}")]
    Mismatch {
        found: &'static str,
        target: &'static str,
    },

    #[error("value {value} out of range for {target}")]
    OutOfRange { value: i64, target: &'static str },

    #[error("cannot parse {input:?} as {target}")]
    Parse {
        input: String,
        target: &'static str,
    },
}

impl ConversionError {
    fn mismatch(value: &Value, target: &'static str) -> Self {
        ConversionError::Mismatch {
            found: value.kind(),
            target,
        }
    }
}

/// Conversion of a field into a `Value`.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

/// Conversion of a `Value` into a field.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ConversionError>;
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        Ok(value)
    }
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

impl FromValue for bool {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bool(b) => Ok(b),
            Value::Int(i) => Ok(i != 0),
            other => Err(ConversionError::mismatch(&other, "bool")),
        }
    }
}

macro_rules! impl_integer {
    ($($ty:ty),*) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::Int(i64::from(*self))
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self, ConversionError> {
                    match value {
                        Value::Int(i) => <$ty>::try_from(i).map_err(|_| ConversionError::OutOfRange {
                            value: i,
                            target: stringify!($ty),
                        }),
                        Value::Bool(b) => Ok(<$ty>::from(b)),
                        other => Err(ConversionError::mismatch(&other, stringify!($ty))),
                    }
                }
            }
        )*
    };
}

impl_integer!(i8, i16, i32, i64, u8, u16, u32);

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Float(f) => Ok(f),
            Value::Int(i) => Ok(i as f64),
            other => Err(ConversionError::mismatch(&other, "f64")),
        }
    }
}

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }
}

impl FromValue for f32 {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        f64::from_value(value).map(|f| f as f32)
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(ConversionError::mismatch(&other, "String")),
        }
    }
}

impl ToValue for Vec<u8> {
    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bytes(b) => Ok(b),
            Value::Text(s) => Ok(s.into_bytes()),
            other => Err(ConversionError::mismatch(&other, "Vec<u8>")),
        }
    }
}

impl ToValue for DateTime<Utc> {
    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Timestamp(t) => Ok(t),
            Value::Text(s) => parse_timestamp(&s).ok_or(ConversionError::Parse {
                input: s,
                target: "DateTime<Utc>",
            }),
            other => Err(ConversionError::mismatch(&other, "DateTime<Utc>")),
        }
    }
}

impl ToValue for Uuid {
    fn to_value(&self) -> Value {
        Value::Uuid(*self)
    }
}

impl FromValue for Uuid {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Uuid(u) => Ok(u),
            Value::Bytes(b) => Uuid::from_slice(&b).map_err(|_| ConversionError::Parse {
                input: format!("{b:?}"),
                target: "Uuid",
            }),
            Value::Text(s) => Uuid::parse_str(&s).map_err(|_| ConversionError::Parse {
                input: s,
                target: "Uuid",
            }),
            other => Err(ConversionError::mismatch(&other, "Uuid")),
        }
    }
}

/// Parse the timestamp layouts databases hand back as text.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]+HH:MM`, and the zone-less
/// `YYYY-MM-DD HH:MM:SS[.f]` form (read as UTC) that SQLite's
/// `CURRENT_TIMESTAMP` produces.
fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|t| t.and_utc())
}
