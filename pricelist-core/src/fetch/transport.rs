//! HTTP transport seam
//!
//! A transport performs exactly one GET. Retry policy lives in the
//! [`Fetcher`](super::Fetcher), so transports stay swappable:
//! - reqwest (production)
//! - scripted mocks (testing)

use async_trait::async_trait;
use tracing::debug;

use crate::config::FetchConfig;
use crate::error::{CatalogError, Result};

/// Status and body of one completed GET
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Empty for non-success statuses; the body is only read on 2xx.
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Vec::new(),
        }
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue a single GET and return whatever status the host answered with.
    ///
    /// Connection-level failures are returned as `CatalogError::Transport`.
    async fn get(&self, url: &str) -> Result<HttpResponse>;

    /// Transport identifier for logging
    fn name(&self) -> &'static str;
}

/// Production transport backed by `reqwest`
pub struct ReqwestTransport {
    client: reqwest::Client,
    max_body_bytes: usize,
}

impl ReqwestTransport {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .build()
            .map_err(|e| CatalogError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CatalogError::transport(url, e.to_string(), is_retryable(&e)))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            return Ok(HttpResponse::status(status));
        }

        let body = read_body_with_limit(&mut response, self.max_body_bytes, url).await?;
        debug!("Downloaded {} bytes from {}", body.len(), url);

        Ok(HttpResponse { status, body })
    }

    fn name(&self) -> &'static str {
        "reqwest"
    }
}

/// Connection, timeout and mid-request failures may clear up on retry; bad
/// URLs, builder and redirect-policy errors will not.
fn is_retryable(error: &reqwest::Error) -> bool {
    !error.is_builder()
        && !error.is_redirect()
        && (error.is_timeout() || error.is_connect() || error.is_request() || error.is_body())
}

/// Stream a response body into memory, failing once it exceeds `limit_bytes`.
///
/// A `Content-Length` above the limit fails before any of the body is read.
async fn read_body_with_limit(
    response: &mut reqwest::Response,
    limit_bytes: usize,
    url: &str,
) -> Result<Vec<u8>> {
    if let Some(content_length) = response.content_length() {
        if content_length > limit_bytes as u64 {
            return Err(CatalogError::transport(
                url,
                format!(
                    "Response body too large (limit {limit_bytes} bytes, Content-Length {content_length} bytes)"
                ),
                false,
            ));
        }
    }

    let mut out: Vec<u8> = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| CatalogError::transport(url, format!("Failed to read body: {e}"), true))?
    {
        if out.len().saturating_add(chunk.len()) > limit_bytes {
            return Err(CatalogError::transport(
                url,
                format!("Response body too large (limit {limit_bytes} bytes)"),
                false,
            ));
        }
        out.extend_from_slice(&chunk);
    }

    Ok(out)
}
