//! Durable object store hosting for downloaded videos.
//!
//! The CMS ingests media by URL, so every video is pushed to an S3-compatible
//! bucket first and its public URL recorded on the item.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::StageResult;
use crate::models::Item;
use crate::repository::{DbError, ItemRepository};

pub const DEFAULT_BUCKET: &str = "dreammedias";
pub const DEFAULT_ENDPOINT: &str = "oss-cn-beijing.aliyuncs.com";
pub const DEFAULT_REGION: &str = "cn-beijing";
pub const DEFAULT_KEY_PREFIX: &str = "sora_videos";

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("Item {0} has no local video path")]
    NoLocalPath(String),
    #[error("Local video file not found: {}", .0.display())]
    MissingLocalFile(std::path::PathBuf),
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Upload of {key} failed: {message}")]
    Upload { key: String, message: String },
    #[error("Object store configuration: {0}")]
    Config(String),
    #[error("Failed to record object store URL: {0}")]
    Database(#[from] DbError),
}

/// Result of storing one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutResult {
    pub url: String,
    pub etag: Option<String>,
}

/// Minimal object store capability.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<PutResult, ObjectStoreError>;
}

/// Bucket coordinates and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStoreConfig {
    pub bucket: String,
    /// Host name without scheme, e.g. `oss-cn-beijing.aliyuncs.com`.
    pub endpoint: String,
    pub region: String,
    pub key_prefix: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key_secret: Option<String>,
}

impl Default for ObjectStoreConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            region: DEFAULT_REGION.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            access_key_id: None,
            access_key_secret: None,
        }
    }
}

impl ObjectStoreConfig {
    /// Apply `OSS_*` environment overrides.
    pub fn apply_env(&mut self) {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        if let Some(v) = var("OSS_ACCESS_KEY_ID") {
            self.access_key_id = Some(v);
        }
        if let Some(v) = var("OSS_ACCESS_KEY_SECRET") {
            self.access_key_secret = Some(v);
        }
        if let Some(v) = var("OSS_BUCKET_NAME") {
            self.bucket = v;
        }
        if let Some(v) = var("OSS_ENDPOINT") {
            self.endpoint = v;
        }
        if let Some(v) = var("OSS_REGION") {
            self.region = v;
        }
    }

    /// Public URL of `key` in this bucket.
    pub fn public_url(&self, key: &str) -> String {
        format!("https://{}.{}/{}", self.bucket, self.endpoint, key)
    }
}

/// S3-protocol object store (Aliyun OSS, MinIO, AWS).
pub struct S3ObjectStore {
    client: Client,
    config: ObjectStoreConfig,
}

impl S3ObjectStore {
    /// Build a client. Missing credentials are a configuration error.
    pub fn new(config: ObjectStoreConfig) -> Result<Self, ObjectStoreError> {
        let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.access_key_secret)
        else {
            return Err(ObjectStoreError::Config(
                "OSS_ACCESS_KEY_ID and OSS_ACCESS_KEY_SECRET must be set".to_string(),
            ));
        };

        let credentials = Credentials::new(key_id, secret, None, None, "socrawler");
        let endpoint = if config.endpoint.starts_with("http") {
            config.endpoint.clone()
        } else {
            format!("https://{}", config.endpoint)
        };

        let s3_config = aws_sdk_s3::Config::builder()
            .credentials_provider(credentials)
            .region(Region::new(config.region.clone()))
            .endpoint_url(endpoint)
            .behavior_version_latest()
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            config,
        })
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<PutResult, ObjectStoreError> {
        let output = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| ObjectStoreError::Upload {
                key: key.to_string(),
                message: aws_sdk_s3::error::DisplayErrorContext(&e).to_string(),
            })?;

        Ok(PutResult {
            url: self.config.public_url(key),
            etag: output.e_tag().map(str::to_string),
        })
    }
}

/// Object key for a post's video: `<prefix>/<post_id><ext>`.
///
/// The extension comes from the local file and defaults to `.mp4`.
pub fn object_key(prefix: &str, post_id: &str, local_path: &Path) -> String {
    let ext = local_path
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| format!(".{}", e))
        .unwrap_or_else(|| ".mp4".to_string());

    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        format!("{}{}", post_id, ext)
    } else {
        format!("{}/{}{}", prefix, post_id, ext)
    }
}

/// Ensures each item's video has a durable object store URL.
pub struct ObjectStoreUploader {
    store: Arc<dyn ObjectStore>,
    repo: ItemRepository,
    key_prefix: String,
}

impl ObjectStoreUploader {
    pub fn new(store: Arc<dyn ObjectStore>, repo: ItemRepository, key_prefix: &str) -> Self {
        Self {
            store,
            repo,
            key_prefix: key_prefix.to_string(),
        }
    }

    /// Return the item's object store URL, uploading the video if needed.
    ///
    /// An item that already carries a URL is returned as is, without any
    /// network call. On success the URL is persisted and set on `item`.
    pub async fn ensure_url(&self, item: &mut Item) -> Result<String, ObjectStoreError> {
        if let Some(url) = &item.object_store_url {
            debug!(post_id = %item.post_id, "Already in object store");
            return Ok(url.clone());
        }

        let path = item.local_video_path.clone();
        if path.as_os_str().is_empty() {
            return Err(ObjectStoreError::NoLocalPath(item.post_id.clone()));
        }
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ObjectStoreError::MissingLocalFile(path));
        }

        let body = tokio::fs::read(&path)
            .await
            .map_err(|source| ObjectStoreError::Io {
                path: path.clone(),
                source,
            })?;
        let size = body.len();

        let key = object_key(&self.key_prefix, &item.post_id, &path);
        let put = self.store.put_object(&key, body).await?;
        info!(
            post_id = %item.post_id,
            "Uploaded {} bytes to {} (etag {})",
            size,
            key,
            put.etag.as_deref().unwrap_or("-")
        );

        self.repo.set_object_store_url(&item.post_id, &put.url).await?;
        item.object_store_url = Some(put.url.clone());
        Ok(put.url)
    }

    /// Push every item still missing from the object store, one at a time.
    pub async fn upload_pending(&self, limit: usize) -> Result<StageResult, DbError> {
        let started = Instant::now();
        let items = self.repo.pending_object_store(limit).await?;

        let mut result = StageResult {
            total_pending: items.len() as u64,
            ..Default::default()
        };

        for mut item in items {
            result.attempted += 1;
            match self.ensure_url(&mut item).await {
                Ok(_) => result.succeeded += 1,
                Err(e) => {
                    warn!(post_id = %item.post_id, "Object store upload failed: {}", e);
                    result.record_failure(&item.post_id, e);
                }
            }
        }

        result.duration = started.elapsed();
        info!(
            "Object store stage: {} attempted, {} succeeded, {} failed",
            result.attempted, result.succeeded, result.failed
        );
        Ok(result)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::repository::{run_migrations, SqlitePool};
    use chrono::Utc;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// In-memory store that counts uploads.
    #[derive(Default)]
    pub(crate) struct MemoryStore {
        pub puts: AtomicUsize,
        pub keys: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn put_object(
            &self,
            key: &str,
            _body: Vec<u8>,
        ) -> Result<PutResult, ObjectStoreError> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            self.keys.lock().unwrap().push(key.to_string());
            Ok(PutResult {
                url: format!("https://bucket.example.com/{}", key),
                etag: Some("\"abc\"".to_string()),
            })
        }
    }

    pub(crate) fn item(post_id: &str, video: PathBuf) -> Item {
        Item {
            post_id: post_id.to_string(),
            generation_id: String::new(),
            video_url: "https://videos.openai.com/v.mp4".to_string(),
            thumbnail_url: String::new(),
            text: String::new(),
            username: String::new(),
            user_id: String::new(),
            posted_at: 1759700000.0,
            width: 0,
            height: 0,
            downloaded_at: Utc::now(),
            local_video_path: video,
            local_thumbnail_path: None,
            object_store_url: None,
            uploaded_to_cms: false,
            cms_token: None,
        }
    }

    async fn repo(dir: &Path) -> ItemRepository {
        let db_url = dir.join("test.db").display().to_string();
        run_migrations(&db_url).await.unwrap();
        ItemRepository::new(SqlitePool::new(&db_url))
    }

    #[test]
    fn test_object_key() {
        assert_eq!(
            object_key("sora_videos", "s_1", Path::new("/d/s_1/video.mp4")),
            "sora_videos/s_1.mp4"
        );
        assert_eq!(
            object_key("sora_videos/", "s_1", Path::new("/d/s_1/video.webm")),
            "sora_videos/s_1.webm"
        );
        assert_eq!(object_key("", "s_1", Path::new("/d/s_1/video")), "s_1.mp4");
    }

    #[test]
    fn test_public_url() {
        let config = ObjectStoreConfig::default();
        assert_eq!(
            config.public_url("sora_videos/s_1.mp4"),
            "https://dreammedias.oss-cn-beijing.aliyuncs.com/sora_videos/s_1.mp4"
        );
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let err = S3ObjectStore::new(ObjectStoreConfig::default()).err();
        assert!(matches!(err, Some(ObjectStoreError::Config(_))));
    }

    #[tokio::test]
    async fn test_ensure_url_uploads_once() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path()).await;
        let video = dir.path().join("video.mp4");
        std::fs::write(&video, b"mp4").unwrap();

        let mut stored = item("s_1", video);
        repo.insert(&stored).await.unwrap();

        let store = Arc::new(MemoryStore::default());
        let uploader = ObjectStoreUploader::new(store.clone(), repo.clone(), "sora_videos");

        let first = uploader.ensure_url(&mut stored).await.unwrap();
        let second = uploader.ensure_url(&mut stored).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first, "https://bucket.example.com/sora_videos/s_1.mp4");
        assert_eq!(store.puts.load(Ordering::SeqCst), 1);

        let reloaded = repo.get("s_1").await.unwrap().unwrap();
        assert_eq!(reloaded.object_store_url.as_deref(), Some(first.as_str()));
    }

    #[tokio::test]
    async fn test_missing_file_fails_item_only() {
        let dir = tempdir().unwrap();
        let repo = repo(dir.path()).await;
        let present = dir.path().join("present.mp4");
        std::fs::write(&present, b"mp4").unwrap();

        let mut missing = item("s_missing", dir.path().join("gone.mp4"));
        missing.posted_at = 1759800000.0;
        repo.insert(&missing).await.unwrap();
        repo.insert(&item("s_present", present)).await.unwrap();

        let store = Arc::new(MemoryStore::default());
        let uploader = ObjectStoreUploader::new(store.clone(), repo.clone(), "v");

        let result = uploader.upload_pending(0).await.unwrap();
        assert_eq!(result.attempted, 2);
        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed_post_ids(), vec!["s_missing"]);
        assert_eq!(store.puts.load(Ordering::SeqCst), 1);

        assert!(repo.get("s_missing").await.unwrap().unwrap().object_store_url.is_none());
        assert_eq!(repo.pending_object_store(0).await.unwrap().len(), 1);
    }
}
