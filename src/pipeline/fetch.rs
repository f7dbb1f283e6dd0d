//! Remote fetch collaborator.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Errors raised while fetching a remote resource.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection-level failure (DNS, reset, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// The request did not complete in time.
    #[error("request to {0} timed out")]
    Timeout(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// The URL could not be used.
    #[error("invalid URL '{0}'")]
    InvalidUrl(String),
}

impl FetchError {
    /// Whether another attempt may succeed.
    ///
    /// Connection failures, timeouts, 5xx, 408 and 429 are transient. Other
    /// statuses and malformed URLs are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::Timeout(_) => true,
            FetchError::Status { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            FetchError::InvalidUrl(_) => false,
        }
    }
}

/// Fetches the bytes behind a URL.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// User-Agent sent with every request.
const USER_AGENT: &str = concat!("lasmesh/", env!("CARGO_PKG_VERSION"));

/// [`Fetcher`] backed by a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with a 5 minute request timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(Duration::from_secs(300))
    }

    /// Create a fetcher with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

fn classify(url: &str, e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(url.to_string())
    } else if e.is_builder() {
        FetchError::InvalidUrl(url.to_string())
    } else if let Some(status) = e.status() {
        FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        }
    } else {
        FetchError::Network(e.to_string())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        trace!(url, "HTTP GET request starting");

        let response = match self.client.get(url).send().await {
            Ok(resp) => {
                debug!(url, status = resp.status().as_u16(), "HTTP response received");
                resp
            }
            Err(e) => {
                warn!(url, error = %e, "HTTP request failed");
                return Err(classify(url, e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(|e| classify(url, e))?;
        trace!(url, bytes = body.len(), "HTTP body read");
        Ok(body.to_vec())
    }
}
