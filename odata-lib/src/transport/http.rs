//! reqwest-backed transport

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::HttpRequest;
use super::HttpResponse;
use super::Transport;
use crate::auth::TokenProvider;
use crate::error::TransportError;

/// [`Transport`] over a shared `reqwest::Client`.
///
/// # Example
///
/// ```ignore
/// use odata_lib::auth::StaticTokenProvider;
/// use odata_lib::transport::ReqwestTransport;
///
/// let transport = ReqwestTransport::new()
///     .with_token_provider(StaticTokenProvider::new("token"));
/// ```
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    token_provider: Option<Arc<dyn TokenProvider>>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("authenticated", &self.token_provider.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ReqwestTransport {
    /// Creates a transport with a default client.
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Creates a transport over an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            token_provider: None,
            timeout: None,
        }
    }

    /// Sends a bearer token from `provider` with each request.
    pub fn with_token_provider(mut self, provider: impl TokenProvider + 'static) -> Self {
        self.token_provider = Some(Arc::new(provider));
        self
    }

    /// Sets a per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = reqwest::Url::parse(&request.url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", request.url, e)))?;

        let mut builder = self
            .client
            .request(request.method, url.clone())
            .headers(request.headers);

        if let Some(provider) = &self.token_provider {
            let resource = url.origin().ascii_serialization();
            let token = provider.get_token(&resource).await?;
            builder = builder.bearer_auth(&token.access_token);
        }

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout.unwrap_or_default())
            } else {
                TransportError::Network(e)
            }
        })?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;

    #[tokio::test]
    async fn test_invalid_url_is_rejected_before_sending() {
        let transport = ReqwestTransport::new().with_token_provider(crate::auth::StaticTokenProvider::new("t"));
        let err = transport
            .send(HttpRequest::new(Method::GET, "not a url"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl(_)));
    }
}
