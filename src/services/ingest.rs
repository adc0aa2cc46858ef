//! Feed ingestion: fetch or load a feed, download what is new, record it.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::download::MediaDownloader;
use crate::browser::BrowserSession;
use crate::feed::{load_feed, validate_feed, FeedError, FeedFetcher};
use crate::models::{FeedResponse, Item, MediaType};
use crate::repository::{DbError, ItemRepository};

/// Errors that abort a whole ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Feed stage failed: {0}")]
    Feed(#[from] FeedError),
    #[error("Content store failed: {0}")]
    Database(#[from] DbError),
}

/// Where the feed comes from.
pub enum FeedSource<'a> {
    /// Fetch the endpoint through a browser session.
    Live {
        session: &'a dyn BrowserSession,
        fetcher: &'a FeedFetcher,
    },
    /// A snapshot saved by an earlier fetch.
    Snapshot(PathBuf),
    /// A feed already in memory.
    Parsed(FeedResponse),
}

impl FeedSource<'_> {
    async fn resolve(self) -> Result<FeedResponse, FeedError> {
        match self {
            FeedSource::Live { session, fetcher } => fetcher.fetch(session).await,
            FeedSource::Snapshot(path) => {
                info!("Loading feed snapshot {}", path.display());
                load_feed(&path).await
            }
            FeedSource::Parsed(feed) => Ok(feed),
        }
    }
}

/// Accounting for one ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestResult {
    /// Items in the feed.
    pub fetched: usize,
    /// Items not yet in the content store.
    pub new_count: usize,
    pub downloaded: usize,
    /// New items with no downloadable video.
    pub skipped: usize,
    pub failed: usize,
    pub failed_post_ids: Vec<String>,
    pub video_paths: Vec<PathBuf>,
    pub thumbnail_paths: Vec<PathBuf>,
    pub duration: Duration,
}

/// Downloads feed items that are not yet in the content store.
pub struct FeedIngestor<'a> {
    repo: &'a ItemRepository,
    downloader: &'a MediaDownloader,
}

impl<'a> FeedIngestor<'a> {
    pub fn new(repo: &'a ItemRepository, downloader: &'a MediaDownloader) -> Self {
        Self { repo, downloader }
    }

    /// Ingest up to `limit` new items (0 means no limit), in feed order.
    pub async fn ingest(
        &self,
        source: FeedSource<'_>,
        limit: usize,
    ) -> Result<IngestResult, IngestError> {
        let started = Instant::now();

        let feed = source.resolve().await?;
        validate_feed(&feed)?;

        let known = self.repo.existing_post_ids().await?;
        info!("{} posts already in the content store", known.len());

        let mut result = IngestResult {
            fetched: feed.items.len(),
            ..Default::default()
        };

        let mut selected = Vec::new();
        let mut seen = HashSet::new();
        for entry in &feed.items {
            if known.contains(&entry.post.id) {
                continue;
            }
            if !seen.insert(entry.post.id.as_str()) {
                debug!(post_id = %entry.post.id, "Repeated in feed, skipping");
                continue;
            }
            result.new_count += 1;
            match entry.video_attachment() {
                Some(attachment) => selected.push((entry, attachment)),
                None => {
                    debug!(post_id = %entry.post.id, "No downloadable attachment, skipping");
                    result.skipped += 1;
                }
            }
        }

        if limit > 0 && selected.len() > limit {
            info!("Limiting to {} of {} new items", limit, selected.len());
            selected.truncate(limit);
        }

        for (entry, attachment) in selected {
            let post_id = entry.post.id.as_str();
            // Filtered on a non-empty download URL above.
            let video_url = attachment.download_url().unwrap_or_default();

            let video_path = match self
                .downloader
                .download_keyed(video_url, post_id, MediaType::Video)
                .await
            {
                Ok(path) => path,
                Err(e) => {
                    warn!(post_id, "Video download failed: {}", e);
                    result.failed += 1;
                    result.failed_post_ids.push(post_id.to_string());
                    continue;
                }
            };

            let thumbnail_path = match attachment.thumbnail_url() {
                Some(url) => match self
                    .downloader
                    .download_keyed(url, post_id, MediaType::Thumbnail)
                    .await
                {
                    Ok(path) => Some(path),
                    Err(e) => {
                        warn!(post_id, "Thumbnail download failed: {}", e);
                        None
                    }
                },
                None => None,
            };

            let item = Item::from_feed(entry, attachment, &video_path, thumbnail_path.as_deref());
            if let Err(e) = self.repo.insert(&item).await {
                // The file stays on disk; the next run finds it and retries the insert.
                warn!(post_id, "Failed to record item: {}", e);
            }

            result.downloaded += 1;
            result.video_paths.push(video_path);
            result.thumbnail_paths.extend(thumbnail_path);
        }

        result.duration = started.elapsed();
        info!(
            "Ingestion complete: fetched={} new={} downloaded={} skipped={} failed={} in {:.1}s",
            result.fetched,
            result.new_count,
            result.downloaded,
            result.skipped,
            result.failed,
            result.duration.as_secs_f64()
        );
        Ok(result)
    }
}
