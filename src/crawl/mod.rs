//! Live crawl mode: watch the feed page's network traffic for media.

mod candidates;
pub mod classifier;
mod session;

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

pub use candidates::{CandidateSet, CrawlStats};
pub use classifier::{classify, classify_for_host, UrlClass, MEDIA_HOST};
pub use session::{
    CrawlError, CrawlOutcome, CrawlRequest, CrawlSession, CrawlState, DEFAULT_TARGET_URL,
};

use crate::browser::BrowserSession;
use crate::models::MediaType;
use crate::services::download::{DownloadFailure, MediaDownloader};

/// Outcome of a crawl followed by downloading what it found.
#[derive(Debug)]
pub struct CrawlResult {
    pub videos: Vec<PathBuf>,
    pub thumbnails: Vec<PathBuf>,
    /// Distinct video URLs observed.
    pub total_videos: usize,
    /// Distinct thumbnail URLs observed.
    pub total_thumbnails: usize,
    pub failures: Vec<DownloadFailure>,
    pub duration: Duration,
    pub stats: CrawlStats,
}

/// Crawl the page, then download every captured video and thumbnail.
pub async fn crawl_and_download(
    session: &dyn BrowserSession,
    request: CrawlRequest,
    downloader: &MediaDownloader,
    cancel: watch::Receiver<bool>,
) -> Result<CrawlResult, CrawlError> {
    let started = std::time::Instant::now();
    let outcome = CrawlSession::new(session, request).run(cancel).await?;

    info!(
        "Downloading {} videos and {} thumbnails",
        outcome.videos.len(),
        outcome.thumbnails.len()
    );
    let videos = downloader
        .download_batch(&outcome.videos, MediaType::Video)
        .await;
    let thumbnails = downloader
        .download_batch(&outcome.thumbnails, MediaType::Thumbnail)
        .await;

    let mut failures = videos.failures;
    failures.extend(thumbnails.failures);

    Ok(CrawlResult {
        videos: videos.paths,
        thumbnails: thumbnails.paths,
        total_videos: outcome.videos.len(),
        total_thumbnails: outcome.thumbnails.len(),
        failures,
        duration: started.elapsed(),
        stats: outcome.stats,
    })
}
