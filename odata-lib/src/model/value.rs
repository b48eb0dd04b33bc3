//! Value enum for dynamic property values

use std::collections::HashMap;

use chrono::DateTime;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::NaiveTime;
use chrono::TimeDelta;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::Entry;

/// A dynamic value that can hold any EDM primitive, complex or nested value.
///
/// This enum is used in [`Entry`] to store property values, as filter
/// literals in the expression model, and as function/action parameters.
///
/// # Type Mapping
///
/// | EDM Type | Rust Variant |
/// |----------|--------------|
/// | null | `Null` |
/// | Edm.Boolean | `Bool` |
/// | Edm.Byte / Edm.SByte | `Byte` / `SByte` |
/// | Edm.Int16 / Edm.Int32 / Edm.Int64 | `Short` / `Int` / `Long` |
/// | Edm.Single / Edm.Double | `Single` / `Float` |
/// | Edm.Decimal | `Decimal` |
/// | Edm.String | `String` |
/// | Edm.Guid | `Guid` |
/// | Edm.DateTimeOffset | `DateTime` |
/// | Edm.DateTime (legacy) | `LocalDateTime` |
/// | Edm.Date / Edm.TimeOfDay | `Date` / `TimeOfDay` |
/// | Edm.Time (legacy) / Edm.Duration | `Duration` |
/// | Edm.Binary | `Binary` |
/// | enum types | `Enum` |
/// | complex types | `Complex` |
/// | collections | `Collection` |
/// | expanded to-one / to-many | `Entry` / `Entries` |
///
/// # Example
///
/// ```
/// use odata_lib::model::Value;
///
/// let name = Value::from("Chai");
/// let id = Value::from(1_i64);
/// let discontinued = Value::from(false);
/// let empty = Value::Null;
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Null/empty value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Unsigned 8-bit integer.
    Byte(u8),
    /// Signed 8-bit integer.
    SByte(i8),
    /// 16-bit integer.
    Short(i16),
    /// 32-bit integer.
    Int(i32),
    /// 64-bit integer.
    Long(i64),
    /// 32-bit floating point.
    Single(f32),
    /// 64-bit floating point.
    Float(f64),
    /// Arbitrary precision decimal.
    Decimal(Decimal),
    /// String value.
    String(String),
    /// GUID/UUID value.
    Guid(Uuid),
    /// Date and time with offset, normalized to UTC.
    DateTime(DateTime<Utc>),
    /// Date and time without offset.
    LocalDateTime(NaiveDateTime),
    /// Calendar date.
    Date(NaiveDate),
    /// Time of day.
    TimeOfDay(NaiveTime),
    /// Duration.
    Duration(TimeDelta),
    /// Raw bytes.
    Binary(Vec<u8>),
    /// Enum member.
    Enum(EnumValue),
    /// Complex type instance.
    Complex(HashMap<String, Value>),
    /// Collection of primitive or complex values.
    Collection(Vec<Value>),
    /// Nested entry (from an expanded to-one association).
    Entry(Box<Entry>),
    /// Nested entries (from an expanded to-many association).
    Entries(Vec<Entry>),
    /// Fallback for unrecognized JSON values.
    Json(serde_json::Value),
}

/// An enum member, carried both by name and underlying value.
///
/// Legacy services address enums by their numeric value; modern services use
/// the namespace-qualified type name and the member name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    /// Qualified enum type name, e.g. `NS.Color`.
    pub type_name: Option<String>,
    /// Member name(s); flag combinations are comma-separated.
    pub member: Option<String>,
    /// Underlying numeric value.
    pub value: i64,
}

impl EnumValue {
    /// Creates an enum value from its type and member name.
    pub fn new(type_name: impl Into<String>, member: impl Into<String>, value: i64) -> Self {
        Self {
            type_name: Some(type_name.into()),
            member: Some(member.into()),
            value,
        }
    }

    /// Creates an enum value known only by its numeric value.
    pub fn from_value(value: i64) -> Self {
        Self {
            type_name: None,
            member: None,
            value,
        }
    }
}

impl Value {
    /// Returns `true` if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Byte(_) => "byte",
            Value::SByte(_) => "sbyte",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Single(_) => "single",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Guid(_) => "guid",
            Value::DateTime(_) => "datetime",
            Value::LocalDateTime(_) => "local_datetime",
            Value::Date(_) => "date",
            Value::TimeOfDay(_) => "time_of_day",
            Value::Duration(_) => "duration",
            Value::Binary(_) => "binary",
            Value::Enum(_) => "enum",
            Value::Complex(_) => "complex",
            Value::Collection(_) => "collection",
            Value::Entry(_) => "entry",
            Value::Entries(_) => "entries",
            Value::Json(_) => "json",
        }
    }

    /// Returns the string content if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Widens any integral value to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Byte(n) => Some(*n as i64),
            Value::SByte(n) => Some(*n as i64),
            Value::Short(n) => Some(*n as i64),
            Value::Int(n) => Some(*n as i64),
            Value::Long(n) => Some(*n),
            Value::Enum(e) => Some(e.value),
            _ => None,
        }
    }
}

// =============================================================================
// From implementations
// =============================================================================

macro_rules! impl_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

impl_from! {
    bool => Bool,
    u8 => Byte,
    i8 => SByte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Single,
    f64 => Float,
    Decimal => Decimal,
    String => String,
    Uuid => Guid,
    DateTime<Utc> => DateTime,
    NaiveDateTime => LocalDateTime,
    NaiveDate => Date,
    NaiveTime => TimeOfDay,
    TimeDelta => Duration,
    Vec<u8> => Binary,
    EnumValue => Enum,
    Vec<Entry> => Entries,
    serde_json::Value => Json,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Entry> for Value {
    fn from(v: Entry) -> Self {
        Value::Entry(Box::new(v))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(inner) => inner.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_primitives() {
        assert_eq!(Value::from(1_i64), Value::Long(1));
        assert_eq!(Value::from("a"), Value::String("a".into()));
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(3_i16)), Value::Short(3));
    }

    #[test]
    fn test_as_i64_widens() {
        assert_eq!(Value::Byte(7).as_i64(), Some(7));
        assert_eq!(Value::Enum(EnumValue::from_value(4)).as_i64(), Some(4));
        assert_eq!(Value::Float(1.0).as_i64(), None);
    }
}
