//! Feed snapshots on disk.
//!
//! Snapshots use the live payload schema, indented with four spaces.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use super::fetcher::parse_feed;
use super::FeedError;
use crate::models::FeedResponse;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> FeedError {
    let path = path.to_path_buf();
    move |source| FeedError::Io { path, source }
}

pub async fn save_feed(path: &Path, feed: &FeedResponse) -> Result<(), FeedError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    feed.serialize(&mut serializer).map_err(FeedError::Parse)?;
    buf.push(b'\n');

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(io_error(parent))?;
    }
    tokio::fs::write(path, buf).await.map_err(io_error(path))?;

    info!("Saved feed with {} items to {}", feed.items.len(), path.display());
    Ok(())
}

pub async fn load_feed(path: &Path) -> Result<FeedResponse, FeedError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(io_error(path))?;
    let feed = parse_feed(&contents)?;

    info!("Loaded feed with {} items from {}", feed.items.len(), path.display());
    Ok(feed)
}
