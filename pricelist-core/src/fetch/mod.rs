//! Workbook fetcher
//!
//! Downloads raw workbook bytes with retry and exponential backoff. Knows
//! nothing about spreadsheet structure.
//!
//! Status handling:
//! - 2xx: success
//! - 401, 403, 407: `Authorization`, never retried
//! - 429, 500, 502, 503, 504: transient, retried
//! - anything else: `Transport`, not retried
//!
//! Connection failures and per-attempt timeouts are transient.

mod transport;

pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::FetchConfig;
use crate::error::{CatalogError, Result};

/// Raw workbook bytes, shared between cache and normalizer without copying
pub type WorkbookBytes = Arc<[u8]>;

const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];
const AUTHORIZATION_STATUSES: [u16; 3] = [401, 403, 407];

pub struct Fetcher {
    transport: Arc<dyn HttpTransport>,
    config: FetchConfig,
}

impl Fetcher {
    /// Create a fetcher using the reqwest transport
    pub fn new(config: FetchConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    pub fn with_transport(transport: Arc<dyn HttpTransport>, config: FetchConfig) -> Self {
        Self { transport, config }
    }

    /// GET `url`, retrying transient failures up to `max_attempts` total attempts
    pub async fn fetch(&self, url: &str) -> Result<WorkbookBytes> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(
                "Fetching {} via {} (attempt {}/{})",
                url,
                self.transport.name(),
                attempt,
                max_attempts
            );

            let err = match self.attempt(url).await {
                Ok(body) => {
                    info!("Fetched {} bytes from {}", body.len(), url);
                    return Ok(body.into());
                }
                Err(e) => e,
            };

            if !err.is_transient() || attempt >= max_attempts {
                return Err(err);
            }

            let delay = self.config.backoff(attempt);
            warn!(
                "Attempt {}/{} for {} failed: {}; retrying in {:?}",
                attempt, max_attempts, url, err, delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt(&self, url: &str) -> Result<Vec<u8>> {
        let timeout = self.config.timeout();
        let response = tokio::time::timeout(timeout, self.transport.get(url))
            .await
            .map_err(|_| {
                CatalogError::transport(url, format!("Attempt timed out after {timeout:?}"), true)
            })??;

        match status_error(url, response.status) {
            None => Ok(response.body),
            Some(err) => Err(err),
        }
    }
}

fn status_error(url: &str, status: u16) -> Option<CatalogError> {
    if (200..300).contains(&status) {
        None
    } else if AUTHORIZATION_STATUSES.contains(&status) {
        Some(CatalogError::Authorization {
            url: url.to_string(),
            status,
        })
    } else {
        Some(CatalogError::status(
            url,
            status,
            RETRYABLE_STATUSES.contains(&status),
        ))
    }
}
