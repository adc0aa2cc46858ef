//! Chrome sessions over the DevTools protocol.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventRequestWillBeSent, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, NavigateParams,
};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::stealth::{STEALTH_ARGS, STEALTH_PAYLOAD};
use super::{BrowserEngineConfig, BrowserError, BrowserSession, RequestStream};

fn protocol_error(e: impl std::fmt::Display) -> BrowserError {
    BrowserError::Protocol(e.to_string())
}

/// A launched (or remotely attached) Chrome with evasion applied to its pages.
pub struct StealthBrowser {
    config: BrowserEngineConfig,
    browser: Browser,
    handler: JoinHandle<()>,
    remote: bool,
}

impl StealthBrowser {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        // Common install locations
        "/opt/google/chrome/google-chrome",
    ];

    fn find_chrome() -> Result<PathBuf, BrowserError> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        info!("Found Chrome in PATH: {}", path);
                        return Ok(PathBuf::from(path));
                    }
                }
            }
        }

        Err(BrowserError::Launch(
            "Chrome/Chromium not found. Install it or set browser.remote_url".to_string(),
        ))
    }

    /// Launch Chrome, or attach to `remote_url` when configured.
    pub async fn launch(config: BrowserEngineConfig) -> Result<Self, BrowserError> {
        if let Some(remote_url) = config.remote_url.clone() {
            return Self::connect_remote(config, &remote_url).await;
        }

        info!("Launching browser (headless={})", config.headless);

        let chrome_path = Self::find_chrome()?;
        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .request_timeout(Duration::from_secs(config.timeout));

        // with_head means NOT headless
        if !config.headless {
            builder = builder.with_head();
        }

        if let Some(ref proxy) = config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        for arg in STEALTH_ARGS {
            builder = builder.arg(*arg);
        }
        for arg in &config.chrome_args {
            builder = builder.arg(arg);
        }

        let browser_config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            config,
            browser,
            handler,
            remote: false,
        })
    }

    async fn connect_remote(config: BrowserEngineConfig, url: &str) -> Result<Self, BrowserError> {
        info!(
            "Connecting to remote browser at {} (timeout: {}s)",
            url, config.timeout
        );

        // The WebSocket URL comes from the /json/version endpoint
        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .timeout(Duration::from_secs(config.timeout))
            .send()
            .await
            .map_err(|e| BrowserError::Launch(format!("remote browser unreachable: {}", e)))?
            .json()
            .await
            .map_err(|e| BrowserError::Launch(format!("bad version info: {}", e)))?;

        let ws_url = resp
            .get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .ok_or_else(|| BrowserError::Launch("No webSocketDebuggerUrl in response".into()))?;

        debug!("Connecting to WebSocket: {}", ws_url);

        let handler_config = chromiumoxide::handler::HandlerConfig {
            request_timeout: Duration::from_secs(config.timeout),
            ..Default::default()
        };

        let (browser, mut handler) = Browser::connect_with_config(ws_url, handler_config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            config,
            browser,
            handler,
            remote: true,
        })
    }

    /// Open a fresh page with the user agent and evasion payload installed.
    pub async fn new_session(&self) -> Result<ChromiumSession, BrowserError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(protocol_error)?;

        page.execute(SetUserAgentOverrideParams::new(
            self.config.user_agent.clone(),
        ))
        .await
        .map_err(protocol_error)?;

        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(STEALTH_PAYLOAD))
            .await
            .map_err(protocol_error)?;

        Ok(ChromiumSession {
            page,
            timeout: Duration::from_secs(self.config.timeout),
        })
    }

    /// Shut the browser down. A remote browser is only disconnected.
    pub async fn close(mut self) {
        if !self.remote {
            if let Err(e) = self.browser.close().await {
                warn!("Failed to close browser: {}", e);
            }
            let _ = self.browser.wait().await;
        }
        self.handler.abort();
    }
}

/// A single Chrome tab.
pub struct ChromiumSession {
    page: Page,
    timeout: Duration,
}

const READY_STATE_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete') {
            resolve(document.readyState);
        } else {
            window.addEventListener('load', () => resolve(document.readyState));
            setTimeout(() => resolve(document.readyState), 10000);
        }
    })
"#;

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        let params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                message: e,
            })?;

        let response = self
            .page
            .execute(params)
            .await
            .map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if let Some(ref error_text) = response.result.error_text {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                message: error_text.clone(),
            });
        }
        Ok(())
    }

    async fn wait_for_load(&self) -> Result<(), BrowserError> {
        let wait = async {
            self.page
                .wait_for_navigation()
                .await
                .map_err(protocol_error)?;
            let state = self
                .page
                .evaluate(READY_STATE_SCRIPT)
                .await
                .map_err(|e| BrowserError::Script(e.to_string()))?;
            debug!("Page ready state: {:?}", state.value());
            Ok(())
        };

        tokio::time::timeout(self.timeout, wait)
            .await
            .map_err(|_| BrowserError::Timeout(self.timeout.as_secs()))?
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, BrowserError> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?;

        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn network_requests(&self) -> Result<RequestStream, BrowserError> {
        self.page
            .execute(EnableParams::default())
            .await
            .map_err(protocol_error)?;

        let events = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(protocol_error)?;

        Ok(events.map(|event| event.request.url.clone()).boxed())
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        self.page
            .screenshot(ScreenshotParams::builder().build())
            .await
            .map_err(protocol_error)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.page.clone().close().await.map_err(protocol_error)
    }
}
