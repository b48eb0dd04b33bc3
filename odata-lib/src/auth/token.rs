//! TokenProvider trait and AccessToken

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;

use crate::error::TransportError;

/// A bearer access token with optional expiration.
#[derive(Debug, Clone)]
pub struct AccessToken {
    /// The bearer token sent with each request.
    pub access_token: String,
    /// When the token expires, if known.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Creates a new access token with just the token string.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: None,
        }
    }

    /// Creates a new access token with expiration time.
    pub fn with_expiry(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: Some(expires_at),
        }
    }

    /// Returns `true` if the token has expired.
    ///
    /// Returns `false` if expiration time is unknown.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Utc::now() >= exp)
    }
}

/// Supplies access tokens to [`ReqwestTransport`](crate::transport::ReqwestTransport).
///
/// The transport calls `get_token` before each request. Implementations
/// should return cached tokens when valid and refresh transparently.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Returns a valid token for the given service URL.
    async fn get_token(&self, resource: &str) -> Result<AccessToken, TransportError>;
}

/// A token provider that always returns the same token.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: AccessToken,
}

impl StaticTokenProvider {
    /// Creates a provider for a fixed bearer token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: AccessToken::new(token),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self, _resource: &str) -> Result<AccessToken, TransportError> {
        if self.token.is_expired() {
            return Err(TransportError::Auth("static token expired".to_string()));
        }
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_expiry() {
        assert!(!AccessToken::new("t").is_expired());
        assert!(AccessToken::with_expiry("t", Utc::now() - Duration::minutes(1)).is_expired());
        assert!(!AccessToken::with_expiry("t", Utc::now() + Duration::hours(1)).is_expired());
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticTokenProvider::new("secret");
        let token = provider.get_token("https://example.org").await.unwrap();
        assert_eq!(token.access_token, "secret");
    }
}
