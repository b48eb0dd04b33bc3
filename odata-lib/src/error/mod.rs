//! Error types

mod conversion;
mod field;
mod protocol;
mod transport;

pub use conversion::*;
pub use field::*;
pub use protocol::*;
pub use transport::*;

/// Errors produced while building, resolving, executing or reading OData commands.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A requested name has no match in the metadata catalog.
    #[error("Unresolvable {kind} '{name}'")]
    UnresolvableObject {
        /// What kind of object was looked up (entity set, property, ...).
        kind: &'static str,
        /// The name as requested by the caller.
        name: String,
    },

    /// Contradictory or otherwise invalid command clauses.
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    /// The service answered with an error status.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A wire literal could not be read as its declared type.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// The transport failed before a response was received.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A response payload could not be parsed.
    #[error("Response parse error: {message}")]
    Parse {
        /// Description of the parse error.
        message: String,
        /// Raw response body, if available.
        body: Option<String>,
    },

    /// Typed field access on an entry failed.
    #[error(transparent)]
    Field(#[from] FieldError),

    /// The operation was cancelled through its cancellation token.
    #[error("Operation cancelled")]
    Cancelled,
}

impl Error {
    /// Creates an unresolvable-object error.
    pub fn unresolvable(kind: &'static str, name: impl Into<String>) -> Self {
        Self::UnresolvableObject {
            kind,
            name: name.into(),
        }
    }

    /// Creates an invalid-command error.
    pub fn invalid_command(message: impl Into<String>) -> Self {
        Self::InvalidCommand(message.into())
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            body: None,
        }
    }

    /// Creates a parse error with the raw response body.
    pub fn parse_with_body(message: impl Into<String>, body: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            body: Some(body.into()),
        }
    }

    /// Returns the HTTP status code if this is a protocol error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Protocol(e) => Some(e.status),
            _ => None,
        }
    }

    /// Returns `true` if the service reported that the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Protocol(e) if e.is_not_found())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::parse(format!("Invalid JSON: {}", e))
    }
}
