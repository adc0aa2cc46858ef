//! Fetching the feed endpoint through a browser session.
//!
//! The endpoint only answers inside a browser that passes the bot checks, so
//! the JSON is read back out of the rendered page.

use std::time::Duration;

use scraper::{Html, Selector};
use tracing::{debug, info};

use super::FeedError;
use crate::browser::BrowserSession;
use crate::models::FeedResponse;

pub const DEFAULT_FEED_URL: &str = "https://sora.chatgpt.com/backend/public/nf2/feed";

/// Items inspected when deciding whether a feed is usable.
pub const VALIDATION_SAMPLE: usize = 5;

const PAGE_HTML_SCRIPT: &str =
    "document.documentElement ? document.documentElement.outerHTML : ''";

/// Pull the raw payload out of a rendered page.
///
/// Browsers render JSON responses inside a `<pre>` element; otherwise the
/// whole body text is used.
pub fn extract_payload(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    for selector in ["pre", "body"] {
        let Ok(selector) = Selector::parse(selector) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text: String = element.text().collect();
            let text = text.trim();
            if !text.is_empty() {
                return Some(text.to_string());
            }
        }
    }
    None
}

pub fn parse_feed(payload: &str) -> Result<FeedResponse, FeedError> {
    serde_json::from_str(payload).map_err(FeedError::Parse)
}

/// Reject feeds that parsed but carry nothing usable.
///
/// At least one of the first few items needs an identifier and an attachment.
pub fn validate_feed(feed: &FeedResponse) -> Result<(), FeedError> {
    if feed.items.is_empty() {
        return Err(FeedError::Unusable("feed contains no items".to_string()));
    }

    let valid = feed
        .items
        .iter()
        .take(VALIDATION_SAMPLE)
        .filter(|item| !item.post.id.is_empty() && !item.post.attachments.is_empty())
        .count();

    if valid == 0 {
        return Err(FeedError::Unusable(
            "no valid items found in feed".to_string(),
        ));
    }

    debug!("Feed validation passed: {} valid items in sample", valid);
    Ok(())
}

/// Loads the feed endpoint in a browser page and parses the response.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    pub feed_url: String,
    pub timeout: Duration,
    /// Pause after load before reading the page.
    pub settle_delay: Duration,
}

impl Default for FeedFetcher {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            timeout: Duration::from_secs(60),
            settle_delay: Duration::from_secs(2),
        }
    }
}

impl FeedFetcher {
    /// Fetch, parse, and validate the feed.
    pub async fn fetch(&self, session: &dyn BrowserSession) -> Result<FeedResponse, FeedError> {
        info!("Fetching feed from {}", self.feed_url);

        let read = async {
            session
                .navigate(&self.feed_url)
                .await
                .map_err(FeedError::Navigation)?;
            session.wait_for_load().await.map_err(FeedError::Navigation)?;
            tokio::time::sleep(self.settle_delay).await;
            session
                .evaluate(PAGE_HTML_SCRIPT)
                .await
                .map_err(|e| FeedError::Extract(e.to_string()))
        };
        let html = match tokio::time::timeout(self.timeout, read)
            .await
            .map_err(|_| FeedError::Timeout(self.timeout.as_secs()))??
        {
            serde_json::Value::String(html) => html,
            other => {
                return Err(FeedError::Extract(format!(
                    "page returned {} instead of HTML",
                    other
                )))
            }
        };

        let payload = extract_payload(&html)
            .ok_or_else(|| FeedError::Extract("page has no text content".to_string()))?;
        debug!("Extracted {} bytes of feed payload", payload.len());

        let feed = parse_feed(&payload)?;
        validate_feed(&feed)?;

        info!("Fetched feed with {} items", feed.items.len());
        Ok(feed)
    }

    /// Fetch the feed and write it to `path` as a snapshot.
    pub async fn fetch_to_file(
        &self,
        session: &dyn BrowserSession,
        path: &std::path::Path,
    ) -> Result<FeedResponse, FeedError> {
        let feed = self.fetch(session).await?;
        super::save_feed(path, &feed).await?;
        Ok(feed)
    }
}
