//! Feed endpoint access and saved feed snapshots.

mod fetcher;
mod snapshot;

use std::path::PathBuf;

use thiserror::Error;

use crate::browser::BrowserError;

pub use fetcher::{
    extract_payload, parse_feed, validate_feed, FeedFetcher, DEFAULT_FEED_URL, VALIDATION_SAMPLE,
};
pub use snapshot::{load_feed, save_feed};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Failed to load feed page: {0}")]
    Navigation(#[source] BrowserError),
    #[error("Timed out after {0}s loading the feed")]
    Timeout(u64),
    #[error("Could not extract feed text: {0}")]
    Extract(String),
    #[error("Malformed feed payload: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("Unusable feed: {0}")]
    Unusable(String),
    #[error("Feed snapshot I/O on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
