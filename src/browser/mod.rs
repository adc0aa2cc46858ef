//! Browser session capability.
//!
//! The crawl and feed paths drive a page only through [`BrowserSession`].
//! [`StealthBrowser`] provides sessions backed by Chrome over CDP, with the
//! anti-detection payload installed before any site script runs.

#[cfg(feature = "browser")]
mod chromium;
mod config;
#[cfg(feature = "browser")]
mod stealth;

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

#[cfg(feature = "browser")]
pub use chromium::{ChromiumSession, StealthBrowser};
pub use config::{BrowserEngineConfig, DEFAULT_USER_AGENT};

/// Stream of request URLs observed on a page.
pub type RequestStream = BoxStream<'static, String>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    #[error("Timed out after {0}s waiting for the page")]
    Timeout(u64),
    #[error("Script evaluation failed: {0}")]
    Script(String),
    #[error("DevTools protocol error: {0}")]
    Protocol(String),
    #[error("Browser support not compiled. Rebuild with: cargo build --features browser")]
    NotCompiled,
}

/// One controllable browser page.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Start navigating to `url`.
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// Wait until the current navigation has finished loading.
    async fn wait_for_load(&self) -> Result<(), BrowserError>;

    /// Evaluate a script in the page and return its JSON value.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError>;

    /// Observe every outgoing request URL. Requests are never blocked or altered.
    async fn network_requests(&self) -> Result<RequestStream, BrowserError>;

    /// PNG screenshot of the viewport.
    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError>;

    /// Release the page.
    async fn close(&self) -> Result<(), BrowserError>;
}

/// Launch a browser for `config`, honouring its headless setting.
#[cfg(feature = "browser")]
pub async fn launch(config: &BrowserEngineConfig) -> Result<StealthBrowser, BrowserError> {
    StealthBrowser::launch(config.clone()).await
}
