//! EDM type names

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

/// A declared property, parameter or return type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EdmType {
    Binary,
    Boolean,
    Byte,
    SByte,
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    Decimal,
    String,
    Guid,
    /// Legacy date/time without offset.
    DateTime,
    DateTimeOffset,
    /// Legacy time span.
    Time,
    Date,
    TimeOfDay,
    Duration,
    Stream,
    /// Spatial and other primitive types carried by name only.
    Other(std::string::String),
    /// Complex, enum or entity type, by qualified name.
    Named(std::string::String),
    Collection(Box<EdmType>),
}

impl EdmType {
    /// Returns `true` for `Edm.*` primitive types.
    pub fn is_primitive(&self) -> bool {
        !matches!(self, EdmType::Named(_) | EdmType::Collection(_))
    }

    /// Returns the element type of a collection, or `self`.
    pub fn element_type(&self) -> &EdmType {
        match self {
            EdmType::Collection(inner) => inner.element_type(),
            other => other,
        }
    }
}

impl FromStr for EdmType {
    type Err = std::string::String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty type name".to_string());
        }
        if let Some(inner) = s
            .strip_prefix("Collection(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return Ok(EdmType::Collection(Box::new(inner.parse()?)));
        }
        let Some(primitive) = s.strip_prefix("Edm.") else {
            return Ok(EdmType::Named(s.to_string()));
        };
        Ok(match primitive {
            "Binary" => EdmType::Binary,
            "Boolean" => EdmType::Boolean,
            "Byte" => EdmType::Byte,
            "SByte" => EdmType::SByte,
            "Int16" => EdmType::Int16,
            "Int32" => EdmType::Int32,
            "Int64" => EdmType::Int64,
            "Single" => EdmType::Single,
            "Double" => EdmType::Double,
            "Decimal" => EdmType::Decimal,
            "String" => EdmType::String,
            "Guid" => EdmType::Guid,
            "DateTime" => EdmType::DateTime,
            "DateTimeOffset" => EdmType::DateTimeOffset,
            "Time" => EdmType::Time,
            "Date" => EdmType::Date,
            "TimeOfDay" => EdmType::TimeOfDay,
            "Duration" => EdmType::Duration,
            "Stream" => EdmType::Stream,
            other => EdmType::Other(other.to_string()),
        })
    }
}

impl TryFrom<std::string::String> for EdmType {
    type Error = std::string::String;

    fn try_from(value: std::string::String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EdmType> for std::string::String {
    fn from(value: EdmType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for EdmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EdmType::Binary => "Binary",
            EdmType::Boolean => "Boolean",
            EdmType::Byte => "Byte",
            EdmType::SByte => "SByte",
            EdmType::Int16 => "Int16",
            EdmType::Int32 => "Int32",
            EdmType::Int64 => "Int64",
            EdmType::Single => "Single",
            EdmType::Double => "Double",
            EdmType::Decimal => "Decimal",
            EdmType::String => "String",
            EdmType::Guid => "Guid",
            EdmType::DateTime => "DateTime",
            EdmType::DateTimeOffset => "DateTimeOffset",
            EdmType::Time => "Time",
            EdmType::Date => "Date",
            EdmType::TimeOfDay => "TimeOfDay",
            EdmType::Duration => "Duration",
            EdmType::Stream => "Stream",
            EdmType::Other(name) => return write!(f, "Edm.{}", name),
            EdmType::Named(name) => return f.write_str(name),
            EdmType::Collection(inner) => return write!(f, "Collection({})", inner),
        };
        write!(f, "Edm.{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primitives() {
        assert_eq!("Edm.Int32".parse::<EdmType>().unwrap(), EdmType::Int32);
        assert_eq!(
            "Edm.GeographyPoint".parse::<EdmType>().unwrap(),
            EdmType::Other("GeographyPoint".into())
        );
        assert_eq!(
            "NS.Address".parse::<EdmType>().unwrap(),
            EdmType::Named("NS.Address".into())
        );
    }

    #[test]
    fn test_parse_collection() {
        let ty: EdmType = "Collection(Edm.String)".parse().unwrap();
        assert_eq!(ty, EdmType::Collection(Box::new(EdmType::String)));
        assert_eq!(ty.to_string(), "Collection(Edm.String)");
        assert_eq!(ty.element_type(), &EdmType::String);
    }

    #[test]
    fn test_serde_as_string() {
        let ty: EdmType = serde_json::from_str("\"Edm.Decimal\"").unwrap();
        assert_eq!(ty, EdmType::Decimal);
        assert_eq!(serde_json::to_string(&ty).unwrap(), "\"Edm.Decimal\"");
    }
}
