//! Download service types.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Per-item download failure. Never retried by the downloader.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Request failed for {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A URL that could not be downloaded in a batch.
#[derive(Debug, Clone)]
pub struct DownloadFailure {
    pub url: String,
    pub error: String,
}

/// Result of a batch download: whatever succeeded plus the failures.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub paths: Vec<PathBuf>,
    pub failures: Vec<DownloadFailure>,
}

/// Configuration for the media downloader.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    pub downloads_dir: PathBuf,
    pub request_timeout: Duration,
    /// Parallel downloads within a batch.
    pub concurrency: usize,
    pub user_agent: String,
}
