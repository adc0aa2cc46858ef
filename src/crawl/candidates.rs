//! Media URLs accumulated during one crawl.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::classifier::{classify_for_host, UrlClass};

/// Counters reported at the end of a crawl.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStats {
    /// Every request observed on the page.
    pub total_requests: u64,
    /// Requests addressed to the media host.
    pub media_host_requests: u64,
    /// Requests classified as video or thumbnail, duplicates included.
    pub media_requests: u64,
    pub scrolls: u64,
    pub scroll_failures: u64,
}

#[derive(Debug, Default)]
struct Inner {
    videos: BTreeSet<String>,
    thumbnails: BTreeSet<String>,
    stats: CrawlStats,
}

/// Video and thumbnail URL sets behind one lock.
///
/// Shared by the network observer and the scroll loop. The lock is only held
/// for set updates and reads.
#[derive(Debug)]
pub struct CandidateSet {
    media_host: String,
    inner: Mutex<Inner>,
}

impl CandidateSet {
    pub fn new(media_host: impl Into<String>) -> Self {
        Self {
            media_host: media_host.into(),
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Classify an observed request and record it if it is media.
    ///
    /// Returns true when the URL was not seen before.
    pub fn observe(&self, url: &str) -> bool {
        let class = classify_for_host(url, &self.media_host);
        let on_media_host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.eq_ignore_ascii_case(&self.media_host)))
            .unwrap_or(false);

        let mut inner = self.lock();
        inner.stats.total_requests += 1;
        if on_media_host {
            inner.stats.media_host_requests += 1;
        }

        match class {
            UrlClass::Video => {
                inner.stats.media_requests += 1;
                inner.videos.insert(url.to_string())
            }
            UrlClass::Thumbnail => {
                inner.stats.media_requests += 1;
                inner.thumbnails.insert(url.to_string())
            }
            UrlClass::Irrelevant => false,
        }
    }

    pub fn record_scroll(&self, succeeded: bool) {
        let mut inner = self.lock();
        inner.stats.scrolls += 1;
        if !succeeded {
            inner.stats.scroll_failures += 1;
        }
    }

    /// (videos, thumbnails) seen so far.
    pub fn counts(&self) -> (usize, usize) {
        let inner = self.lock();
        (inner.videos.len(), inner.thumbnails.len())
    }

    pub fn stats(&self) -> CrawlStats {
        self.lock().stats
    }

    /// Sorted copies of both sets.
    pub fn snapshot(&self) -> (Vec<String>, Vec<String>) {
        let inner = self.lock();
        (
            inner.videos.iter().cloned().collect(),
            inner.thumbnails.iter().cloned().collect(),
        )
    }
}
