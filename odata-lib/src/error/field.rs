//! Typed entry access errors

/// Raised by the typed getters of [`Entry`](crate::model::Entry).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("Entry has no property '{field}'")]
    Missing { field: String },

    /// The value is present but of another kind than the getter reads.
    #[error("Property '{field}' holds {actual}, not {expected}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        actual: &'static str,
    },
}

impl FieldError {
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Missing { field: field.into() }
    }

    pub fn type_mismatch(field: impl Into<String>, expected: &'static str, actual: &'static str) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            expected,
            actual,
        }
    }

    /// Name of the property the getter was asked for.
    pub fn field(&self) -> &str {
        match self {
            Self::Missing { field } | Self::TypeMismatch { field, .. } => field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = FieldError::type_mismatch("UnitPrice", "string", "decimal");
        assert_eq!(err.to_string(), "Property 'UnitPrice' holds decimal, not string");
        assert_eq!(FieldError::missing("Colour").field(), "Colour");
    }
}
