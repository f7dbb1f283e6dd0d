//! Testing utilities for users of the lasmesh library.
//!
//! - [`MemoryFetcher`]: serves canned bodies by URL and can inject transient
//!   failures
//! - [`RecordingHandler`]: captures every emitted event
//! - [`write_las_fixture`], [`las_bytes`] and [`terrain`]: synthetic LAS data
//! - [`copy_converter`], [`failing_converter`], [`converter_failing_on`]:
//!   converter settings backed by `sh`

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, RwLock};

use crate::config::ConverterConfig;
use crate::events::{Event, EventHandler};
use crate::pipeline::{FetchError, Fetcher};
use crate::pointcloud::{PointRow, write_las};

/// In-memory [`Fetcher`].
///
/// Unknown URLs answer with HTTP 404.
///
/// # Example
///
/// ```
/// use lasmesh::testing::MemoryFetcher;
///
/// let fetcher = MemoryFetcher::new()
///     .with("memory://meta/P1.json", r#"{"sourceUrls":{"value":[]}}"#)
///     .failing_times("memory://meta/P1.json", 1);
/// assert_eq!(fetcher.request_count("memory://meta/P1.json"), 0);
/// ```
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    bodies: RwLock<HashMap<String, Vec<u8>>>,
    failures: Mutex<HashMap<String, u32>>,
    requests: Mutex<HashMap<String, u32>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: serve `body` at `url`.
    pub fn with(self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.insert(url, body);
        self
    }

    /// Builder: fail the next `times` requests for `url` with a network error.
    pub fn failing_times(self, url: impl Into<String>, times: u32) -> Self {
        self.fail_next(url, times);
        self
    }

    /// Fail the next `times` requests for `url` with a network error.
    pub fn fail_next(&self, url: impl Into<String>, times: u32) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.into(), times);
    }

    /// Serve `body` at `url`, replacing any previous body.
    pub fn insert(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.bodies
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(url.into(), body.into());
    }

    /// Number of requests made for `url`.
    pub fn request_count(&self, url: &str) -> u32 {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(url)
            .copied()
            .unwrap_or(0)
    }

    /// Number of requests made for any URL.
    pub fn total_requests(&self) -> u32 {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .sum()
    }
}

#[async_trait]
impl Fetcher for MemoryFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        *self
            .requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(url.to_string())
            .or_default() += 1;

        {
            let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(remaining) = failures.get_mut(url).filter(|n| **n > 0) {
                *remaining -= 1;
                return Err(FetchError::Network(format!("injected failure for {url}")));
            }
        }

        self.bodies
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

/// Event handler that keeps every event it receives.
#[derive(Default)]
pub struct RecordingHandler {
    events: tokio::sync::Mutex<Vec<Event>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events received so far, in emission order.
    pub async fn events(&self) -> Vec<Event> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, event: &Event) {
        self.events.lock().await.push(event.clone());
    }
}

/// A gently sloping `n × n` terrain patch with `spacing` between samples,
/// starting at `origin`.
pub fn terrain(n: usize, spacing: f64, origin: [f64; 2]) -> Vec<PointRow> {
    let mut rows = Vec::with_capacity(n * n);
    for i in 0..n {
        for j in 0..n {
            let x = origin[0] + i as f64 * spacing;
            let y = origin[1] + j as f64 * spacing;
            let z = 50.0 + 0.05 * x + 0.02 * y + (x * 0.3).sin() * 0.2;
            rows.push([x, y, z, (i * n + j) as f64 % 255.0]);
        }
    }
    rows
}

/// Encode `rows` as a LAS file.
pub fn las_bytes(rows: &[PointRow]) -> Vec<u8> {
    let mut buf = Vec::new();
    // writing to a Vec cannot fail
    let _ = write_las(&mut buf, rows);
    buf
}

/// Write `rows` as a LAS file at `path`.
pub fn write_las_fixture(path: impl AsRef<Path>, rows: &[PointRow]) -> std::io::Result<()> {
    let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
    write_las(&mut file, rows)
}

fn shell_converter(script: &str) -> ConverterConfig {
    ConverterConfig {
        program: "sh".to_string(),
        args: vec![
            "-c".to_string(),
            script.to_string(),
            "lasmesh-convert".to_string(),
            "{input}".to_string(),
            "{output}".to_string(),
        ],
        ..ConverterConfig::default()
    }
}

/// Converter that copies its input unchanged.
pub fn copy_converter() -> ConverterConfig {
    shell_converter(r#"cp "$1" "$2""#)
}

/// Converter that always exits with code 3 after printing `corrupt input`.
pub fn failing_converter() -> ConverterConfig {
    shell_converter(r#"echo "corrupt input: $1" >&2; exit 3"#)
}

/// Converter that fails like [`failing_converter`] for inputs whose name ends
/// with `suffix` and copies every other input.
pub fn converter_failing_on(suffix: &str) -> ConverterConfig {
    shell_converter(&format!(
        r#"case "$1" in *{suffix}) echo "corrupt input: $1" >&2; exit 3;; esac; cp "$1" "$2""#
    ))
}
