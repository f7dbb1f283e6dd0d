//! Product metadata and the task that fetches it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::fetch::Fetcher;
use crate::core::context::TaskContext;
use crate::core::retry::RetryPolicy;
use crate::core::target::{Target, TextTarget};
use crate::core::task::{Task, TaskError};
use crate::core::types::Params;

/// Description of a product: the point files it is made of.
///
/// Serialised as `{"sourceUrls": {"value": [...]}}`. Documents using the
/// older `lasUrls` key are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMetadata {
    #[serde(rename = "sourceUrls", alias = "lasUrls")]
    source_urls: UrlList,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct UrlList {
    value: Vec<String>,
}

impl ProductMetadata {
    pub fn new(source_urls: Vec<String>) -> Self {
        Self {
            source_urls: UrlList { value: source_urls },
        }
    }

    /// Parse a metadata document.
    pub fn from_json(text: &str) -> Result<Self, TaskError> {
        serde_json::from_str(text)
            .map_err(|e| TaskError::Decode(format!("malformed product metadata: {e}")))
    }

    /// URLs of the product's source point files.
    pub fn source_urls(&self) -> &[String] {
        &self.source_urls.value
    }
}

/// Downloads a product's metadata document and stores it as canonical JSON.
pub struct FetchMetadata {
    product_id: String,
    url: String,
    path: PathBuf,
    fetcher: Arc<dyn Fetcher>,
    retry: RetryPolicy,
}

impl FetchMetadata {
    pub fn new(
        product_id: impl Into<String>,
        url: impl Into<String>,
        path: impl Into<PathBuf>,
        fetcher: Arc<dyn Fetcher>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            url: url.into(),
            path: path.into(),
            fetcher,
            retry,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn target(&self) -> TextTarget {
        TextTarget::new(&self.path)
    }
}

#[async_trait]
impl Task for FetchMetadata {
    fn family(&self) -> &'static str {
        "FetchMetadata"
    }

    fn params(&self) -> Params {
        Params::new()
            .with("product_id", &self.product_id)
            .with("url", &self.url)
            .with("path", self.path.display())
    }

    fn outputs(&self) -> Vec<Target> {
        vec![Target::Text(self.target())]
    }

    async fn execute(&self, _ctx: &mut TaskContext) -> Result<(), TaskError> {
        let bytes = self.fetcher.fetch(&self.url).await?;
        let text = String::from_utf8(bytes)
            .map_err(|e| TaskError::Decode(format!("metadata from {} is not UTF-8: {e}", self.url)))?;
        let metadata = ProductMetadata::from_json(&text)?;
        debug!(
            product = %self.product_id,
            sources = metadata.source_urls().len(),
            "Parsed product metadata"
        );

        self.target().write_json(&metadata)?;
        info!(product = %self.product_id, path = %self.path.display(), "Stored product metadata");
        Ok(())
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone()
    }

    fn description(&self) -> Option<&str> {
        Some("Fetch product metadata")
    }
}
