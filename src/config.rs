//! Configuration management for socrawler using the prefer crate.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::browser::BrowserEngineConfig;
use crate::crawl::{CrawlRequest, DEFAULT_TARGET_URL, MEDIA_HOST};
use crate::feed::{FeedFetcher, DEFAULT_FEED_URL};
use crate::services::cms::CmsConfig;
use crate::services::download::DownloadConfig;
use crate::services::object_store::ObjectStoreConfig;

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "sora.db";

/// Default downloads directory, relative to the data directory.
const DOWNLOADS_SUBDIR: &str = "downloads/sora";

/// Live crawl timing and targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub target_url: String,
    pub media_host: String,
    /// Overall crawl duration in seconds.
    pub duration: u64,
    /// Seconds between scrolls.
    pub scroll_interval: u64,
    pub settle_delay: u64,
    pub initial_wait: u64,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            target_url: DEFAULT_TARGET_URL.to_string(),
            media_host: MEDIA_HOST.to_string(),
            duration: 300,
            scroll_interval: 20,
            settle_delay: 2,
            initial_wait: 5,
        }
    }
}

impl CrawlConfig {
    pub fn to_request(&self, debug_dir: Option<PathBuf>) -> CrawlRequest {
        CrawlRequest {
            target_url: self.target_url.clone(),
            media_host: self.media_host.clone(),
            duration: Duration::from_secs(self.duration),
            scroll_interval: Duration::from_secs(self.scroll_interval),
            settle_delay: Duration::from_secs(self.settle_delay),
            initial_wait: Duration::from_secs(self.initial_wait),
            debug_dir,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub url: String,
    /// Fetch timeout in seconds.
    pub timeout: u64,
    pub settle_delay: u64,
    /// Default snapshot path for `feed fetch` / `feed download --from`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
    /// New items downloaded per run; 0 means no limit.
    pub limit: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_FEED_URL.to_string(),
            timeout: 60,
            settle_delay: 2,
            snapshot: None,
            limit: 50,
        }
    }
}

impl FeedConfig {
    pub fn fetcher(&self) -> FeedFetcher {
        FeedFetcher {
            feed_url: self.url.clone(),
            timeout: Duration::from_secs(self.timeout),
            settle_delay: Duration::from_secs(self.settle_delay),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadSection {
    /// Per-file timeout in seconds.
    pub timeout: u64,
    pub concurrency: usize,
}

impl Default for DownloadSection {
    fn default() -> Self {
        Self {
            timeout: 60,
            concurrency: 4,
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Base data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Database filename or path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloads_dir: Option<String>,
    #[serde(default)]
    pub browser: BrowserEngineConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub download: DownloadSection,
    #[serde(default)]
    pub object_store: ObjectStoreConfig,
    #[serde(default)]
    pub cms: CmsConfig,
    /// Path the configuration was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Discover a `socrawler` config file in the standard locations.
    pub async fn load() -> Self {
        match prefer::load("socrawler").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => Self::load_from_path(path).await.unwrap_or_else(|e| {
                    tracing::warn!("Ignoring config {}: {}", path.display(), e);
                    Self::default()
                }),
                None => Self::default(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file.
    /// The format follows the extension: TOML, YAML, or JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e))?,
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e))?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Directory relative paths are resolved against.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Expand `~` and resolve relative paths against `base_dir`.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
            settings.database_path = settings.data_dir.join(DEFAULT_DATABASE_FILENAME);
            settings.downloads_dir = settings.data_dir.join(DOWNLOADS_SUBDIR);
        }
        if let Some(ref database) = self.database {
            settings.database_path = self.resolve_path(database, &settings.data_dir);
        }
        if let Some(ref downloads) = self.downloads_dir {
            settings.downloads_dir = self.resolve_path(downloads, &settings.data_dir);
        }

        settings.browser = self.browser.clone();
        settings.crawl = self.crawl.clone();
        settings.feed = self.feed.clone();
        settings.download = self.download.clone();
        settings.object_store = self.object_store.clone();
        settings.cms = self.cms.clone();
    }
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub downloads_dir: PathBuf,
    pub browser: BrowserEngineConfig,
    pub crawl: CrawlConfig,
    pub feed: FeedConfig,
    pub download: DownloadSection,
    pub object_store: ObjectStoreConfig,
    pub cms: CmsConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self::with_data_dir(PathBuf::from("."))
    }
}

impl Settings {
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join(DEFAULT_DATABASE_FILENAME),
            downloads_dir: data_dir.join(DOWNLOADS_SUBDIR),
            data_dir,
            browser: BrowserEngineConfig::default(),
            crawl: CrawlConfig::default(),
            feed: FeedConfig::default(),
            download: DownloadSection::default(),
            object_store: ObjectStoreConfig::default(),
            cms: CmsConfig::default(),
        }
    }

    pub fn database_url(&self) -> String {
        self.database_path.display().to_string()
    }

    pub fn download_config(&self) -> DownloadConfig {
        DownloadConfig {
            downloads_dir: self.downloads_dir.clone(),
            request_timeout: Duration::from_secs(self.download.timeout),
            concurrency: self.download.concurrency,
            user_agent: self.browser.user_agent.clone(),
        }
    }

    /// Apply secrets and endpoints from the environment.
    pub fn apply_env(&mut self) {
        if let Some(path) = std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()) {
            tracing::debug!("Using DATABASE_URL from environment: {}", path);
            let path = path.strip_prefix("sqlite:").unwrap_or(&path);
            self.database_path = PathBuf::from(shellexpand::tilde(path).as_ref());
        }
        self.object_store.apply_env();
        self.cms.apply_env();
    }

    /// Ensure the data and downloads directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        for (dir, label) in [(&self.data_dir, "data"), (&self.downloads_dir, "downloads")] {
            fs::create_dir_all(dir).map_err(|e| {
                std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create {} directory '{}': {}",
                        label,
                        dir.display(),
                        e
                    ),
                )
            })?;
        }
        if let Some(parent) = self.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

/// Load settings from `config_path`, or from a discovered config file.
///
/// An explicit path that cannot be read or parsed is an error; discovery
/// failures fall back to defaults.
pub async fn load_settings(config_path: Option<&Path>) -> Result<Settings, String> {
    let config = match config_path {
        Some(path) => Config::load_from_path(path).await?,
        None => Config::load().await,
    };

    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let mut settings = Settings::with_data_dir(base_dir.clone());
    config.apply_to_settings(&mut settings, &base_dir);
    settings.apply_env();

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_toml_resolves_relative_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("socrawler.toml");
        std::fs::write(
            &path,
            r#"
data_dir = "state"
downloads_dir = "media"

[browser]
headless = false

[crawl]
duration = 60

[feed]
limit = 10

[object_store]
bucket = "archive"
key_prefix = "clips"
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, dir.path());

        assert_eq!(settings.data_dir, dir.path().join("state"));
        assert_eq!(settings.database_path, dir.path().join("state").join("sora.db"));
        assert_eq!(settings.downloads_dir, dir.path().join("state").join("media"));
        assert!(!settings.browser.headless);
        assert_eq!(settings.crawl.duration, 60);
        assert_eq!(settings.crawl.scroll_interval, 20);
        assert_eq!(settings.feed.limit, 10);
        assert_eq!(settings.object_store.bucket, "archive");
        assert_eq!(settings.object_store.endpoint, "oss-cn-beijing.aliyuncs.com");
    }

    #[tokio::test]
    async fn test_load_yaml_and_json() {
        let dir = tempdir().unwrap();

        let yaml = dir.path().join("socrawler.yaml");
        std::fs::write(&yaml, "cms:\n  delay_ms: 0\n  user:\n    name: Archivist\n").unwrap();
        let config = Config::load_from_path(&yaml).await.unwrap();
        assert_eq!(config.cms.delay_ms, 0);
        assert_eq!(config.cms.user.name, "Archivist");
        assert_eq!(config.cms.user.email, "api@example.com");

        let json = dir.path().join("socrawler.json");
        std::fs::write(&json, r#"{"download": {"concurrency": 8}}"#).unwrap();
        let config = Config::load_from_path(&json).await.unwrap();
        assert_eq!(config.download.concurrency, 8);
        assert_eq!(config.download.timeout, 60);
    }

    #[tokio::test]
    async fn test_explicit_config_errors_surface() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "data_dir = [").unwrap();

        assert!(load_settings(Some(&path)).await.is_err());
        assert!(load_settings(Some(&dir.path().join("absent.toml")))
            .await
            .is_err());
    }

    #[test]
    fn test_crawl_request_conversion() {
        let request = CrawlConfig {
            duration: 1,
            scroll_interval: 1,
            ..Default::default()
        }
        .to_request(None);

        assert_eq!(request.duration, Duration::from_secs(1));
        assert_eq!(request.settle_delay, Duration::from_secs(2));
        assert_eq!(request.target_url, DEFAULT_TARGET_URL);
    }

    #[test]
    fn test_tilde_expansion() {
        let config = Config::default();
        let resolved = config.resolve_path("~/sora", Path::new("/base"));
        assert!(!resolved.starts_with("~"));
        assert_eq!(config.resolve_path("/abs", Path::new("/base")), PathBuf::from("/abs"));
        assert_eq!(config.resolve_path("rel", Path::new("/base")), PathBuf::from("/base/rel"));
    }
}
