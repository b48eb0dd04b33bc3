//! Literal conversion errors

/// A wire literal that could not be read as its declared type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Cannot convert '{literal}' to {target}")]
pub struct ConversionError {
    /// The literal as it appeared on the wire.
    pub literal: String,
    /// The target type name (e.g. `Edm.Int32`).
    pub target: String,
}

impl ConversionError {
    /// Creates a new conversion error.
    pub fn new(literal: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            literal: literal.into(),
            target: target.into(),
        }
    }
}
