//! Transport error types

use std::time::Duration;

/// Errors raised by a [`Transport`](crate::transport::Transport) before any
/// HTTP response was received.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Network error during the call.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Request timed out.
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Token acquisition failed.
    #[error("Authentication failed: {0}")]
    Auth(String),
}
