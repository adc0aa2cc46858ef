//! Bounded live crawl of the feed page.
//!
//! The session navigates to the target page, observes every request the page
//! makes, and scrolls on a fixed interval so the infinite feed keeps loading
//! media. The overall deadline (or caller cancellation) is the normal way a
//! session ends; whatever was collected by then is the result.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, info, warn};

use super::candidates::{CandidateSet, CrawlStats};
use super::classifier::MEDIA_HOST;
use crate::browser::{BrowserError, BrowserSession};

pub const DEFAULT_TARGET_URL: &str = "https://sora.chatgpt.com/";

const SCROLL_SCRIPT: &str = "window.scrollBy({ top: window.innerHeight, behavior: 'smooth' })";
const PAGE_HTML_SCRIPT: &str =
    "document.documentElement ? document.documentElement.outerHTML : ''";
const LOGIN_MARKERS: &[&str] = &["Sign in", "Log in", "login"];
const DEBUG_SCREENSHOT: &str = "debug_initial_page.png";

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Navigation failed: {0}")]
    Navigation(#[source] BrowserError),
    #[error("Initial page load failed: {0}")]
    PageLoad(#[source] BrowserError),
    #[error("Could not observe network requests: {0}")]
    Observer(#[source] BrowserError),
}

/// Lifecycle of a crawl session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlState {
    Running,
    TimedOut,
    Completed,
}

/// Parameters of one crawl session.
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub target_url: String,
    pub media_host: String,
    /// Overall deadline, in whole seconds.
    pub duration: Duration,
    pub scroll_interval: Duration,
    /// Pause after each scroll for new content to render.
    pub settle_delay: Duration,
    /// Pause after the first load before scrolling begins.
    pub initial_wait: Duration,
    /// Directory for the debug screenshot. None disables it.
    pub debug_dir: Option<PathBuf>,
}

impl Default for CrawlRequest {
    fn default() -> Self {
        Self {
            target_url: DEFAULT_TARGET_URL.to_string(),
            media_host: MEDIA_HOST.to_string(),
            duration: Duration::from_secs(300),
            scroll_interval: Duration::from_secs(20),
            settle_delay: Duration::from_secs(2),
            initial_wait: Duration::from_secs(5),
            debug_dir: None,
        }
    }
}

/// What a finished session collected.
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub videos: Vec<String>,
    pub thumbnails: Vec<String>,
    pub state: CrawlState,
    pub elapsed: Duration,
    pub stats: CrawlStats,
}

/// Resolve once `cancel` carries `true`. A dropped sender never cancels.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            futures::future::pending::<()>().await;
        }
    }
}

/// Sleep for `duration`, cut short by the deadline or cancellation.
///
/// Returns false when the session should stop.
async fn pause(duration: Duration, deadline: Instant, cancel: &mut watch::Receiver<bool>) -> bool {
    let until = (Instant::now() + duration).min(deadline);
    tokio::select! {
        _ = sleep_until(until) => Instant::now() < deadline,
        _ = cancelled(cancel) => false,
    }
}

/// One crawl over a browser page.
pub struct CrawlSession<'a> {
    session: &'a dyn BrowserSession,
    request: CrawlRequest,
    candidates: Arc<CandidateSet>,
    state: CrawlState,
}

impl<'a> CrawlSession<'a> {
    pub fn new(session: &'a dyn BrowserSession, request: CrawlRequest) -> Self {
        let candidates = Arc::new(CandidateSet::new(request.media_host.clone()));
        Self {
            session,
            request,
            candidates,
            state: CrawlState::Running,
        }
    }

    pub fn state(&self) -> CrawlState {
        self.state
    }

    /// Run until the deadline or until `cancel` becomes true.
    ///
    /// The page is closed on every exit path.
    pub async fn run(mut self, cancel: watch::Receiver<bool>) -> Result<CrawlOutcome, CrawlError> {
        let started = Instant::now();
        let result = self.drive(started, cancel).await;

        if let Err(e) = self.session.close().await {
            warn!("Failed to close crawl page: {}", e);
        }

        let stats = self.candidates.stats();
        result.map(|()| {
            let (videos, thumbnails) = self.candidates.snapshot();
            CrawlOutcome {
                videos,
                thumbnails,
                state: self.state,
                elapsed: started.elapsed(),
                stats,
            }
        })
    }

    async fn drive(
        &mut self,
        started: Instant,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<(), CrawlError> {
        let deadline = started + self.request.duration;

        // Subscribe before navigating so requests made during the first load are seen.
        let mut requests = self
            .session
            .network_requests()
            .await
            .map_err(CrawlError::Observer)?;

        info!("Navigating to {}", self.request.target_url);
        let timeout_secs = self.request.duration.as_secs();
        timeout_at(deadline, self.session.navigate(&self.request.target_url))
            .await
            .map_err(|_| CrawlError::Navigation(BrowserError::Timeout(timeout_secs)))?
            .map_err(CrawlError::Navigation)?;
        timeout_at(deadline, self.session.wait_for_load())
            .await
            .map_err(|_| CrawlError::PageLoad(BrowserError::Timeout(timeout_secs)))?
            .map_err(CrawlError::PageLoad)?;

        self.state = CrawlState::Running;
        info!("Page loaded, crawling for {}s", self.request.duration.as_secs());

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let candidates = Arc::clone(&self.candidates);
        let observer = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    next = requests.next() => match next {
                        Some(url) => {
                            if candidates.observe(&url) {
                                debug!("Captured media URL: {}", url);
                            }
                        }
                        None => break,
                    },
                }
            }
            // Drain requests that were already delivered.
            while let Some(Some(url)) = requests.next().now_or_never() {
                candidates.observe(&url);
            }
        });

        tokio::select! {
            finished = timeout_at(deadline, self.inspect_initial_page()) => {
                if finished.is_err() {
                    debug!("Initial page inspection cut short by the deadline");
                }
            }
            _ = cancelled(&mut cancel) => debug!("Initial page inspection cancelled"),
        }

        if pause(self.request.initial_wait, deadline, &mut cancel).await {
            self.scroll_loop(deadline, &mut cancel).await;
        }

        self.state = CrawlState::TimedOut;
        let (videos, thumbnails) = self.candidates.counts();
        info!(
            "Crawl window closed after {:.1}s: {} videos, {} thumbnails",
            started.elapsed().as_secs_f64(),
            videos,
            thumbnails
        );

        let _ = stop_tx.send(true);
        if let Err(e) = observer.await {
            warn!("Network observer ended abnormally: {}", e);
        }
        self.state = CrawlState::Completed;

        Ok(())
    }

    async fn scroll_loop(&self, deadline: Instant, cancel: &mut watch::Receiver<bool>) {
        let interval = self.request.scroll_interval.max(Duration::from_millis(10));
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = sleep_until(deadline) => return,
                _ = cancelled(cancel) => {
                    info!("Crawl cancelled");
                    return;
                }
                _ = ticker.tick() => {}
            }

            match timeout_at(deadline, self.session.evaluate(SCROLL_SCRIPT)).await {
                Ok(Ok(_)) => self.candidates.record_scroll(true),
                Ok(Err(e)) => {
                    warn!("Scroll failed, continuing: {}", e);
                    self.candidates.record_scroll(false);
                }
                Err(_) => return,
            }

            if !pause(self.request.settle_delay, deadline, cancel).await {
                return;
            }

            let (videos, thumbnails) = self.candidates.counts();
            let stats = self.candidates.stats();
            info!(
                "Status: {} videos, {} thumbnails ({} requests, {} on media host)",
                videos, thumbnails, stats.total_requests, stats.media_host_requests
            );
        }
    }

    /// Best-effort checks on the first page: login wall warning and a debug screenshot.
    ///
    /// Callers bound this by the crawl deadline.
    async fn inspect_initial_page(&self) {
        match self.session.evaluate(PAGE_HTML_SCRIPT).await {
            Ok(serde_json::Value::String(html)) => {
                if LOGIN_MARKERS.iter().any(|marker| html.contains(marker)) {
                    warn!("Page may require login; results may be limited");
                }
            }
            Ok(_) => {}
            Err(e) => debug!("Could not read page HTML: {}", e),
        }

        let Some(ref dir) = self.request.debug_dir else {
            return;
        };
        match self.session.screenshot().await {
            Ok(png) => {
                let path = dir.join(DEBUG_SCREENSHOT);
                let write = async {
                    tokio::fs::create_dir_all(dir).await?;
                    tokio::fs::write(&path, png).await
                };
                match write.await {
                    Ok(()) => debug!("Saved debug screenshot to {}", path.display()),
                    Err(e) => warn!("Failed to save debug screenshot: {}", e),
                }
            }
            Err(e) => warn!("Failed to take debug screenshot: {}", e),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::browser::RequestStream;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::mpsc;
    /// Scripted page: emits a batch of requests on load and on each scroll.
    pub(crate) struct FakePage {
        pub on_load: Vec<String>,
        pub per_scroll: Vec<String>,
        pub fail_navigation: bool,
        pub fail_scrolls: bool,
        pub html: String,
        /// Delay on page reads and screenshots.
        pub inspect_delay: Duration,
        sender: Mutex<Option<mpsc::UnboundedSender<String>>>,
        pub scrolls: AtomicUsize,
        pub closed: AtomicUsize,
    }

    impl FakePage {
        pub fn new(on_load: &[&str], per_scroll: &[&str]) -> Self {
            Self {
                on_load: on_load.iter().map(|s| s.to_string()).collect(),
                per_scroll: per_scroll.iter().map(|s| s.to_string()).collect(),
                fail_navigation: false,
                fail_scrolls: false,
                html: "<html><body>feed</body></html>".to_string(),
                inspect_delay: Duration::ZERO,
                sender: Mutex::new(None),
                scrolls: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
            }
        }

        fn emit(&self, urls: &[String]) {
            if let Some(sender) = self.sender.lock().unwrap().as_ref() {
                for url in urls {
                    let _ = sender.send(url.clone());
                }
            }
        }
    }

    #[async_trait]
    impl BrowserSession for FakePage {
        async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
            if self.fail_navigation {
                return Err(BrowserError::Navigation {
                    url: url.to_string(),
                    message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
                });
            }
            Ok(())
        }

        async fn wait_for_load(&self) -> Result<(), BrowserError> {
            self.emit(&self.on_load);
            Ok(())
        }

        async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError> {
            if script.starts_with("window.scrollBy") {
                self.scrolls.fetch_add(1, Ordering::SeqCst);
                if self.fail_scrolls {
                    return Err(BrowserError::Script("Execution context was destroyed".into()));
                }
                self.emit(&self.per_scroll);
                return Ok(serde_json::Value::Null);
            }
            tokio::time::sleep(self.inspect_delay).await;
            Ok(serde_json::Value::String(self.html.clone()))
        }

        async fn network_requests(&self) -> Result<RequestStream, BrowserError> {
            let (tx, rx) = mpsc::unbounded_channel();
            *self.sender.lock().unwrap() = Some(tx);
            let stream = futures::stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|url| (url, rx))
            });
            Ok(stream.boxed())
        }

        async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
            tokio::time::sleep(self.inspect_delay).await;
            Ok(b"\x89PNG".to_vec())
        }

        async fn close(&self) -> Result<(), BrowserError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            *self.sender.lock().unwrap() = None;
            Ok(())
        }
    }

    fn quick_request(duration_secs: u64, scroll_secs: u64) -> CrawlRequest {
        CrawlRequest {
            duration: Duration::from_secs(duration_secs),
            scroll_interval: Duration::from_secs(scroll_secs),
            settle_delay: Duration::from_millis(50),
            initial_wait: Duration::from_millis(50),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_deadline_ends_crawl_with_partial_results() {
        let page = FakePage::new(
            &[
                "https://videos.openai.com/task_a/video.mp4",
                "https://videos.openai.com/task_a/thumb.webp",
                "https://sora.chatgpt.com/backend/nf/feed",
            ],
            &["https://videos.openai.com/task_b/video.mp4"],
        );
        let (_cancel_tx, cancel_rx) = watch::channel(false);

        let started = std::time::Instant::now();
        let outcome = CrawlSession::new(&page, quick_request(1, 1))
            .run(cancel_rx)
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_millis(900), "{:?}", elapsed);
        assert!(elapsed < Duration::from_secs(3), "{:?}", elapsed);
        assert_eq!(outcome.state, CrawlState::Completed);
        assert!(outcome
            .videos
            .contains(&"https://videos.openai.com/task_a/video.mp4".to_string()));
        assert_eq!(
            outcome.thumbnails,
            vec!["https://videos.openai.com/task_a/thumb.webp"]
        );
        assert_eq!(page.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_repeated_urls_across_scrolls_recorded_once() {
        let page = FakePage::new(&[], &["https://videos.openai.com/task_a/video.mp4"]);
        let request = CrawlRequest {
            duration: Duration::from_secs(1),
            scroll_interval: Duration::from_millis(100),
            settle_delay: Duration::from_millis(10),
            initial_wait: Duration::ZERO,
            ..Default::default()
        };
        let (_cancel_tx, cancel_rx) = watch::channel(false);

        let outcome = CrawlSession::new(&page, request).run(cancel_rx).await.unwrap();

        assert!(page.scrolls.load(Ordering::SeqCst) > 1);
        assert_eq!(outcome.videos.len(), 1);
        assert!(outcome.stats.media_requests > 1);
    }

    #[tokio::test]
    async fn test_scroll_failures_are_not_fatal() {
        let mut page = FakePage::new(&["https://videos.openai.com/task_a/video.mp4"], &[]);
        page.fail_scrolls = true;
        let request = CrawlRequest {
            duration: Duration::from_secs(1),
            scroll_interval: Duration::from_millis(200),
            settle_delay: Duration::from_millis(10),
            initial_wait: Duration::ZERO,
            ..Default::default()
        };
        let (_cancel_tx, cancel_rx) = watch::channel(false);

        let outcome = CrawlSession::new(&page, request).run(cancel_rx).await.unwrap();

        assert_eq!(outcome.videos.len(), 1);
        assert!(outcome.stats.scroll_failures >= 1);
        assert_eq!(outcome.stats.scroll_failures, outcome.stats.scrolls);
    }

    #[tokio::test]
    async fn test_navigation_failure_is_fatal_and_closes_page() {
        let mut page = FakePage::new(&[], &[]);
        page.fail_navigation = true;
        let (_cancel_tx, cancel_rx) = watch::channel(false);

        let err = CrawlSession::new(&page, quick_request(5, 1))
            .run(cancel_rx)
            .await
            .unwrap_err();

        assert!(matches!(err, CrawlError::Navigation(_)));
        assert_eq!(page.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellation_stops_early() {
        let page = FakePage::new(&["https://videos.openai.com/task_a/video.mp4"], &[]);
        let (cancel_tx, cancel_rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let _ = cancel_tx.send(true);
        });

        let started = std::time::Instant::now();
        let outcome = CrawlSession::new(&page, quick_request(30, 1))
            .run(cancel_rx)
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(outcome.state, CrawlState::Completed);
        assert_eq!(outcome.videos.len(), 1);
        assert_eq!(page.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_debug_screenshot_written() {
        let dir = tempfile::tempdir().unwrap();
        let page = FakePage::new(&[], &[]);
        let request = CrawlRequest {
            duration: Duration::from_secs(1),
            debug_dir: Some(dir.path().to_path_buf()),
            initial_wait: Duration::ZERO,
            ..quick_request(1, 1)
        };
        let (_cancel_tx, cancel_rx) = watch::channel(false);

        CrawlSession::new(&page, request).run(cancel_rx).await.unwrap();

        assert!(dir.path().join(DEBUG_SCREENSHOT).exists());
    }

    #[tokio::test]
    async fn test_slow_page_reads_do_not_outlive_deadline() {
        let mut page = FakePage::new(&["https://videos.openai.com/task_a/video.mp4"], &[]);
        page.inspect_delay = Duration::from_secs(6);
        let (_cancel_tx, cancel_rx) = watch::channel(false);

        let started = std::time::Instant::now();
        let outcome = CrawlSession::new(&page, quick_request(1, 1))
            .run(cancel_rx)
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert!(elapsed < Duration::from_secs(3), "{:?}", elapsed);
        assert_eq!(outcome.state, CrawlState::Completed);
        assert_eq!(outcome.videos.len(), 1);
        assert_eq!(page.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_slow_page_reads() {
        let dir = tempfile::tempdir().unwrap();
        let mut page = FakePage::new(&[], &[]);
        page.inspect_delay = Duration::from_secs(6);
        let request = CrawlRequest {
            debug_dir: Some(dir.path().to_path_buf()),
            ..quick_request(30, 1)
        };
        let (cancel_tx, cancel_rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let _ = cancel_tx.send(true);
        });

        let started = std::time::Instant::now();
        CrawlSession::new(&page, request).run(cancel_rx).await.unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!dir.path().join(DEBUG_SCREENSHOT).exists());
        assert_eq!(page.closed.load(Ordering::SeqCst), 1);
    }
}
