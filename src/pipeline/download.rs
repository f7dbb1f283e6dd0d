//! Raw point file download.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use super::fetch::Fetcher;
use crate::core::context::TaskContext;
use crate::core::retry::RetryPolicy;
use crate::core::target::{BinaryTarget, Target};
use crate::core::task::{Task, TaskError};
use crate::core::types::Params;

/// Downloads one source file verbatim.
pub struct FetchBinary {
    url: String,
    path: PathBuf,
    fetcher: Arc<dyn Fetcher>,
    retry: RetryPolicy,
}

impl FetchBinary {
    pub fn new(
        url: impl Into<String>,
        path: impl Into<PathBuf>,
        fetcher: Arc<dyn Fetcher>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            url: url.into(),
            path: path.into(),
            fetcher,
            retry,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Task for FetchBinary {
    fn family(&self) -> &'static str {
        "FetchBinary"
    }

    fn params(&self) -> Params {
        Params::new()
            .with("url", &self.url)
            .with("path", self.path.display())
    }

    fn outputs(&self) -> Vec<Target> {
        vec![Target::binary(&self.path)]
    }

    async fn execute(&self, _ctx: &mut TaskContext) -> Result<(), TaskError> {
        let bytes = self.fetcher.fetch(&self.url).await?;
        if bytes.is_empty() {
            return Err(TaskError::Decode(format!("empty response from {}", self.url)));
        }

        BinaryTarget::new(&self.path).write_bytes(&bytes)?;
        info!(url = %self.url, bytes = bytes.len(), "Downloaded source file");
        Ok(())
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry.clone()
    }

    fn description(&self) -> Option<&str> {
        Some("Download a source point file")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::retry::RetryCondition;
    use crate::execution::Executor;
    use crate::testing::MemoryFetcher;
    use std::time::Duration;
    use tempfile::TempDir;

    const URL: &str = "memory://data/a.las";

    #[tokio::test]
    async fn test_download_writes_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("raw.las");
        let fetcher = MemoryFetcher::new().with(URL, vec![1u8, 2, 3]);
        let task = Arc::new(FetchBinary::new(URL, &path, Arc::new(fetcher), RetryPolicy::none()));

        let report = Executor::new(2).run(task).await;

        assert!(report.success);
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(
            MemoryFetcher::new()
                .with(URL, vec![7u8])
                .failing_times(URL, 2),
        );
        let retry = RetryPolicy::fixed(3, Duration::from_millis(1))
            .with_condition(RetryCondition::TransientOnly);
        let task = Arc::new(FetchBinary::new(
            URL,
            dir.path().join("raw.las"),
            fetcher.clone(),
            retry,
        ));

        let report = Executor::new(1).run(task).await;

        assert!(report.success, "{:?}", report.failure);
        assert_eq!(fetcher.request_count(URL), 3);
    }

    #[tokio::test]
    async fn test_empty_body_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("raw.las");
        let fetcher = MemoryFetcher::new().with(URL, Vec::new());
        let task = Arc::new(FetchBinary::new(URL, &path, Arc::new(fetcher), RetryPolicy::none()));

        let report = Executor::new(1).run(task).await;

        assert!(!report.success);
        assert!(!path.exists());
    }
}
