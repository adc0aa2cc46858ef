//! Media download service.
//!
//! Every URL maps to a deterministic storage key, and a file that already
//! exists under that key is never fetched again. Files are written to a
//! temporary name and renamed into place, so a path that exists is complete.

mod types;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;

use futures::StreamExt;
use regex::Regex;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::models::MediaType;

pub use types::{BatchOutcome, DownloadConfig, DownloadError, DownloadFailure};

/// Task identifiers embedded in signed media URLs.
static TASK_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"task_[a-z0-9]{26}").unwrap());

static PART_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Storage key for a media URL.
///
/// The embedded task identifier when there is one, so every signed variant of
/// the same asset lands in one place. Otherwise the first 12 hex characters of
/// the URL's SHA-256.
pub fn storage_key(url: &str) -> String {
    let decoded = urlencoding::decode(url)
        .map(|d| d.into_owned())
        .unwrap_or_else(|_| url.to_string());

    if let Some(m) = TASK_ID.find(&decoded) {
        return m.as_str().to_string();
    }

    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    digest[..12].to_string()
}

/// Idempotent media downloader.
pub struct MediaDownloader {
    client: reqwest::Client,
    config: DownloadConfig,
}

impl MediaDownloader {
    pub fn new(config: DownloadConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self { client, config })
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.config.downloads_dir
    }

    /// Local path for `key` and `media_type`.
    pub fn destination(&self, key: &str, media_type: MediaType) -> PathBuf {
        self.config
            .downloads_dir
            .join(key)
            .join(media_type.file_name())
    }

    /// Download `url` under its URL-derived storage key.
    pub async fn download(&self, url: &str, media_type: MediaType) -> Result<PathBuf, DownloadError> {
        self.download_keyed(url, &storage_key(url), media_type).await
    }

    /// Download `url` under an explicit key, such as a post identifier.
    ///
    /// Returns the existing path without any network I/O when the file is
    /// already present.
    pub async fn download_keyed(
        &self,
        url: &str,
        key: &str,
        media_type: MediaType,
    ) -> Result<PathBuf, DownloadError> {
        let dest = self.destination(key, media_type);
        if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            debug!("Already downloaded: {}", dest.display());
            return Ok(dest);
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| DownloadError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = self.write_atomically(&dest, url, response).await?;
        info!("Downloaded {} ({} bytes) to {}", media_type, bytes, dest.display());
        Ok(dest)
    }

    async fn write_atomically(
        &self,
        dest: &Path,
        url: &str,
        mut response: reqwest::Response,
    ) -> Result<u64, DownloadError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| DownloadError::Io { path, source }
        };

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(io_err(parent))?;
        }

        // Unique per writer so concurrent downloads of one key never share a file.
        let part = dest.with_file_name(format!(
            ".{}.{}-{}.part",
            dest.file_name().and_then(|n| n.to_str()).unwrap_or("media"),
            std::process::id(),
            PART_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let result = async {
            let mut file = tokio::fs::File::create(&part)
                .await
                .map_err(io_err(part.as_path()))?;
            let mut written = 0u64;
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|source| DownloadError::Http {
                    url: url.to_string(),
                    source,
                })?
            {
                file.write_all(&chunk).await.map_err(io_err(part.as_path()))?;
                written += chunk.len() as u64;
            }
            file.flush().await.map_err(io_err(part.as_path()))?;
            drop(file);
            tokio::fs::rename(&part, dest).await.map_err(io_err(dest))?;
            Ok::<u64, DownloadError>(written)
        }
        .await;

        if result.is_err() {
            let _ = tokio::fs::remove_file(&part).await;
        }
        result
    }

    /// Download many URLs of one media type.
    ///
    /// Duplicate URLs are fetched once. Failures are logged and collected; the
    /// batch itself never fails.
    pub async fn download_batch(&self, urls: &[String], media_type: MediaType) -> BatchOutcome {
        let unique: BTreeSet<&str> = urls.iter().map(String::as_str).collect();
        let concurrency = self.config.concurrency.max(1);

        let results: Vec<_> = futures::stream::iter(unique)
            .map(|url| async move { (url, self.download(url, media_type).await) })
            .buffered(concurrency)
            .collect()
            .await;

        let mut outcome = BatchOutcome::default();
        for (url, result) in results {
            match result {
                Ok(path) => outcome.paths.push(path),
                Err(e) => {
                    warn!("Failed to download {}: {}", media_type, e);
                    outcome.failures.push(DownloadFailure {
                        url: url.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Downloaded {} {} file(s), {} failed",
            outcome.paths.len(),
            media_type,
            outcome.failures.len()
        );
        outcome
    }
}
