//! reqwest-backed `Network` implementation.
//!
//! Request URLs are resolved against a configured origin, so the agent
//! can key its cache by path (`/index.html`) while fetching absolute URLs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use tracing::debug;
use url::Url;

use super::{Network, NetworkError};
use crate::models::{Request, ResponseSnapshot};

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// Transport-level only; the agent itself never times out a request.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// HTTP client bound to one origin.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpNetwork {
    client: Client,
    origin: Url,
}

impl HttpNetwork {
    pub fn new(origin: &str) -> Result<Self, NetworkError> {
        let origin =
            Url::parse(origin).map_err(|e| NetworkError::InvalidUrl(format!("{}: {}", origin, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self { client, origin })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Resolve a request URL against the origin. Absolute URLs pass through.
    fn resolve(&self, url: &str) -> Result<Url, NetworkError> {
        self.origin
            .join(url)
            .map_err(|e| NetworkError::InvalidUrl(format!("{}: {}", url, e)))
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, NetworkError> {
        let url = self.resolve(&request.url)?;
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| NetworkError::InvalidMethod(request.method.clone()))?;

        let response = self
            .client
            .request(method, url.clone())
            .send()
            .await
            .map_err(NetworkError::from_reqwest)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(NetworkError::from_reqwest)?;

        debug!(url = %url, status = status, bytes = body.len(), "Fetched from network");
        Ok(ResponseSnapshot::new(status, headers, body))
    }
}
