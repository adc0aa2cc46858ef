//! CMS ingestion: publish object-store hosted videos to the external CMS.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::object_store::{ObjectStoreError, ObjectStoreUploader};
use super::StageResult;
use crate::models::Item;
use crate::repository::{DbError, ItemRepository};

/// Longest title sent to the CMS, in characters.
pub const MAX_TITLE_CHARS: usize = 100;

#[derive(Debug, Error)]
pub enum CmsError {
    #[error("Object store stage failed: {0}")]
    ObjectStore(#[from] ObjectStoreError),
    #[error("CMS request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Malformed CMS response (HTTP {status}): {message}")]
    Decode { status: u16, message: String },
    #[error("Upload rejected: {0}")]
    Rejected(String),
    #[error("Content store failed: {0}")]
    Database(#[from] DbError),
    #[error("CMS configuration: {0}")]
    Config(String),
}

/// Account the uploads are attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CmsUser {
    pub username: String,
    pub email: String,
    pub name: String,
}

impl Default for CmsUser {
    fn default() -> Self {
        Self {
            username: "api".to_string(),
            email: "api@example.com".to_string(),
            name: "API User".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CmsConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub user: CmsUser,
    /// Pause between consecutive uploads, in milliseconds.
    pub delay_ms: u64,
    /// Request timeout, in seconds.
    pub timeout: u64,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            user: CmsUser::default(),
            delay_ms: 500,
            timeout: 60,
        }
    }
}

impl CmsConfig {
    /// Apply `CMS_API_URL` / `CMS_API_KEY` overrides.
    pub fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("CMS_API_URL") {
            if !url.is_empty() {
                self.api_url = Some(url);
            }
        }
        if let Ok(key) = std::env::var("CMS_API_KEY") {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadRequest<'a> {
    pub media_url: &'a str,
    pub title: String,
    pub description: String,
    pub user: &'a CmsUser,
}

/// The `error` field arrives either as a string or as an object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApiError {
    Message(String),
    Detailed { message: String },
    Other(serde_json::Value),
}

impl ApiError {
    fn message(&self) -> Option<String> {
        match self {
            ApiError::Message(m) | ApiError::Detailed { message: m } => {
                (!m.is_empty()).then(|| m.clone())
            }
            ApiError::Other(serde_json::Value::Null) => None,
            ApiError::Other(value) => Some(value.to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UploadResponse {
    pub success: bool,
    pub task_id: Option<String>,
    pub friendly_token: Option<String>,
    pub status_url: Option<String>,
    pub media_url: Option<String>,
    pub error: Option<ApiError>,
    pub message: Option<String>,
}

impl UploadResponse {
    /// Human-readable reason for a failed upload.
    pub fn error_message(&self) -> String {
        self.error
            .as_ref()
            .and_then(ApiError::message)
            .or_else(|| self.message.clone().filter(|m| !m.is_empty()))
            .unwrap_or_else(|| "unknown error".to_string())
    }
}

/// Title for a post: its trimmed text, cut to [`MAX_TITLE_CHARS`].
pub fn generate_title(text: &str, post_id: &str) -> String {
    let text = text.trim();
    if text.is_empty() {
        return format!("Sora Video - {}", post_id);
    }
    if text.chars().count() <= MAX_TITLE_CHARS {
        return text.to_string();
    }
    let truncated: String = text.chars().take(MAX_TITLE_CHARS - 3).collect();
    format!("{}...", truncated)
}

pub fn generate_description(text: &str, post_id: &str) -> String {
    if text.is_empty() {
        format!("Sora generated video - {}", post_id)
    } else {
        text.to_string()
    }
}

/// HTTP client for the CMS upload endpoint.
pub struct CmsClient {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    user: CmsUser,
}

impl CmsClient {
    pub fn new(config: &CmsConfig) -> Result<Self, CmsError> {
        let api_url = config
            .api_url
            .clone()
            .ok_or_else(|| CmsError::Config("CMS_API_URL is not set".to_string()))?;
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| CmsError::Config("CMS_API_KEY is not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()?;

        Ok(Self {
            client,
            api_url,
            api_key,
            user: config.user.clone(),
        })
    }

    /// Submit one item. Returns the CMS token when one is issued.
    pub async fn upload(&self, item: &Item, media_url: &str) -> Result<Option<String>, CmsError> {
        let request = UploadRequest {
            media_url,
            title: generate_title(&item.text, &item.post_id),
            description: generate_description(&item.text, &item.post_id),
            user: &self.user,
        };
        debug!(post_id = %item.post_id, "CMS upload request: title={:?}", request.title);

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Api-Key {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(post_id = %item.post_id, "CMS response: status={}, body={}", status, body);

        let parsed: UploadResponse =
            serde_json::from_str(&body).map_err(|e| CmsError::Decode {
                status,
                message: e.to_string(),
            })?;

        if !parsed.success {
            return Err(CmsError::Rejected(parsed.error_message()));
        }

        Ok(parsed.friendly_token.filter(|t| !t.is_empty()))
    }
}

/// Publishes pending items: object store first, then the CMS.
pub struct CmsUploader {
    client: CmsClient,
    object_store: ObjectStoreUploader,
    repo: ItemRepository,
    delay: Duration,
}

impl CmsUploader {
    pub fn new(
        client: CmsClient,
        object_store: ObjectStoreUploader,
        repo: ItemRepository,
        delay: Duration,
    ) -> Self {
        Self {
            client,
            object_store,
            repo,
            delay,
        }
    }

    async fn publish(&self, item: &mut Item) -> Result<(), CmsError> {
        let media_url = self.object_store.ensure_url(item).await?;
        let token = self.client.upload(item, &media_url).await?;

        match token {
            Some(token) => {
                if let Err(e) = self.repo.set_cms_token(&item.post_id, &token).await {
                    warn!(post_id = %item.post_id, "Failed to save CMS token: {}", e);
                }
                info!(post_id = %item.post_id, "Uploaded to CMS, token {}", token);
            }
            None => info!(post_id = %item.post_id, "Uploaded to CMS (no token returned)"),
        }

        self.repo.mark_cms_uploaded(&item.post_id).await?;
        Ok(())
    }

    /// Upload every item not yet in the CMS, newest first, one at a time.
    ///
    /// One item's failure never stops the batch.
    pub async fn upload_pending(&self, limit: usize) -> Result<StageResult, DbError> {
        let started = Instant::now();
        let items = self.repo.pending_cms(limit).await?;

        let mut result = StageResult {
            total_pending: items.len() as u64,
            ..Default::default()
        };
        if items.is_empty() {
            info!("No items waiting for the CMS");
            return Ok(result);
        }
        info!("Uploading {} items to the CMS", items.len());

        let total = items.len();
        for (i, mut item) in items.into_iter().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            result.attempted += 1;
            debug!(post_id = %item.post_id, "CMS upload {}/{}", i + 1, total);
            match self.publish(&mut item).await {
                Ok(()) => result.succeeded += 1,
                Err(e) => {
                    warn!(post_id = %item.post_id, "CMS upload failed: {}", e);
                    result.record_failure(&item.post_id, e);
                }
            }
        }

        result.duration = started.elapsed();
        info!(
            "CMS stage: {} attempted, {} succeeded, {} failed in {:.1}s",
            result.attempted,
            result.succeeded,
            result.failed,
            result.duration.as_secs_f64()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{run_migrations, SqlitePool};
    use crate::services::object_store::tests::{item, MemoryStore};
    use mockito::Matcher;
    use std::path::Path;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use tempfile::tempdir;

    async fn repo(dir: &Path) -> ItemRepository {
        let db_url = dir.join("test.db").display().to_string();
        run_migrations(&db_url).await.unwrap();
        ItemRepository::new(SqlitePool::new(&db_url))
    }

    fn uploader(url: String, repo: &ItemRepository, store: Arc<MemoryStore>) -> CmsUploader {
        paced_uploader(url, repo, store, Duration::ZERO)
    }

    fn paced_uploader(
        url: String,
        repo: &ItemRepository,
        store: Arc<MemoryStore>,
        delay: Duration,
    ) -> CmsUploader {
        let client = CmsClient::new(&CmsConfig {
            api_url: Some(url),
            api_key: Some("secret".to_string()),
            timeout: 5,
            ..Default::default()
        })
        .unwrap();
        let object_store = ObjectStoreUploader::new(store, repo.clone(), "sora_videos");
        CmsUploader::new(client, object_store, repo.clone(), delay)
    }

    #[test]
    fn test_title_boundaries() {
        let exact = "a".repeat(100);
        assert_eq!(generate_title(&exact, "s_1"), exact);

        let long = "b".repeat(101);
        let title = generate_title(&long, "s_1");
        assert_eq!(title, format!("{}...", "b".repeat(97)));
        assert_eq!(title.chars().count(), 100);

        assert_eq!(generate_title("   ", "s_1"), "Sora Video - s_1");
        assert_eq!(generate_title("  a cat  ", "s_1"), "a cat");
    }

    #[test]
    fn test_title_counts_characters() {
        let text = "猫".repeat(101);
        let title = generate_title(&text, "s_1");
        assert_eq!(title.chars().count(), 100);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_description_fallback() {
        assert_eq!(generate_description("", "s_9"), "Sora generated video - s_9");
        assert_eq!(generate_description("hello", "s_9"), "hello");
    }

    #[test]
    fn test_error_shapes() {
        let parse = |body: &str| serde_json::from_str::<UploadResponse>(body).unwrap();

        assert_eq!(
            parse(r#"{"success": false, "error": "quota exceeded"}"#).error_message(),
            "quota exceeded"
        );
        assert_eq!(
            parse(r#"{"success": false, "error": {"message": "bad request"}}"#).error_message(),
            "bad request"
        );
        assert_eq!(
            parse(r#"{"success": false, "error": {"code": 7}}"#).error_message(),
            r#"{"code":7}"#
        );
        assert_eq!(
            parse(r#"{"success": false, "message": "try later"}"#).error_message(),
            "try later"
        );
        assert_eq!(parse(r#"{"success": false}"#).error_message(), "unknown error");
    }

    #[test]
    fn test_client_requires_credentials() {
        let err = CmsClient::new(&CmsConfig::default()).err();
        assert!(matches!(err, Some(CmsError::Config(_))));
    }

    #[tokio::test]
    async fn test_successful_upload_saves_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/upload")
            .match_header("authorization", "Api-Key secret")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "media_url": "https://bucket.example.com/sora_videos/s_1.mp4",
                "title": "a cat surfing",
                "user": {"email": "api@example.com"}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"success": true, "task_id": "t1", "friendly_token": "Xy12"}"#)
            .expect(1)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let repo = repo(dir.path()).await;
        let video = dir.path().join("video.mp4");
        std::fs::write(&video, b"mp4").unwrap();
        let mut stored = item("s_1", video);
        stored.text = "a cat surfing".to_string();
        repo.insert(&stored).await.unwrap();

        let store = Arc::new(MemoryStore::default());
        let result = uploader(format!("{}/upload", server.url()), &repo, store.clone())
            .upload_pending(0)
            .await
            .unwrap();

        assert_eq!(result.total_pending, 1);
        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 0);
        assert_eq!(store.puts.load(Ordering::SeqCst), 1);

        let reloaded = repo.get("s_1").await.unwrap().unwrap();
        assert!(reloaded.uploaded_to_cms);
        assert_eq!(reloaded.cms_token.as_deref(), Some("Xy12"));
        assert!(reloaded.object_store_url.is_some());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejection_is_recorded_and_batch_continues() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/upload")
            .match_body(Matcher::PartialJson(serde_json::json!({"title": "bad"})))
            .with_status(400)
            .with_body(r#"{"success": false, "error": {"message": "bad request"}}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/upload")
            .match_body(Matcher::PartialJson(serde_json::json!({"title": "good"})))
            .with_status(200)
            .with_body(r#"{"success": true}"#)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let repo = repo(dir.path()).await;
        for (id, text, posted_at) in [("s_bad", "bad", 2.0), ("s_good", "good", 1.0)] {
            let video = dir.path().join(format!("{}.mp4", id));
            std::fs::write(&video, b"mp4").unwrap();
            let mut stored = item(id, video);
            stored.text = text.to_string();
            stored.posted_at = posted_at;
            repo.insert(&stored).await.unwrap();
        }

        let store = Arc::new(MemoryStore::default());
        let result = uploader(format!("{}/upload", server.url()), &repo, store)
            .upload_pending(0)
            .await
            .unwrap();

        assert_eq!(result.attempted, 2);
        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed_post_ids(), vec!["s_bad"]);
        assert!(result.failures[0].error.contains("bad request"));

        assert!(!repo.get("s_bad").await.unwrap().unwrap().uploaded_to_cms);
        let good = repo.get("s_good").await.unwrap().unwrap();
        assert!(good.uploaded_to_cms);
        assert_eq!(good.cms_token, None);
        // The object store step still completed for the rejected item.
        assert!(repo.get("s_bad").await.unwrap().unwrap().object_store_url.is_some());
    }

    #[tokio::test]
    async fn test_missing_video_never_reaches_cms() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/upload")
            .expect(0)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let repo = repo(dir.path()).await;
        repo.insert(&item("s_lost", dir.path().join("missing.mp4")))
            .await
            .unwrap();

        let result = uploader(format!("{}/upload", server.url()), &repo, Arc::new(MemoryStore::default()))
            .upload_pending(0)
            .await
            .unwrap();

        assert_eq!(result.failed_post_ids(), vec!["s_lost"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_token_save_failure_still_counts_as_uploaded() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/upload")
            .with_status(200)
            .with_body(r#"{"success": true, "friendly_token": "Xy12"}"#)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let repo = repo(dir.path()).await;
        let video = dir.path().join("video.mp4");
        std::fs::write(&video, b"mp4").unwrap();
        repo.insert(&item("s_1", video)).await.unwrap();

        let db = rusqlite::Connection::open(dir.path().join("test.db")).unwrap();
        db.execute_batch(
            "CREATE TRIGGER reject_tokens BEFORE UPDATE OF cms_token ON videos
             BEGIN SELECT RAISE(ABORT, 'token column locked'); END;",
        )
        .unwrap();

        let result = uploader(format!("{}/upload", server.url()), &repo, Arc::new(MemoryStore::default()))
            .upload_pending(0)
            .await
            .unwrap();

        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 0);
        let reloaded = repo.get("s_1").await.unwrap().unwrap();
        assert!(reloaded.uploaded_to_cms);
        assert_eq!(reloaded.cms_token, None);
    }

    #[tokio::test]
    async fn test_delay_between_items() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/upload")
            .with_status(200)
            .with_body(r#"{"success": true}"#)
            .expect(3)
            .create_async()
            .await;

        let dir = tempdir().unwrap();
        let repo = repo(dir.path()).await;
        for (i, id) in ["s_1", "s_2", "s_3"].iter().enumerate() {
            let video = dir.path().join(format!("{}.mp4", id));
            std::fs::write(&video, b"mp4").unwrap();
            let mut stored = item(id, video);
            stored.posted_at = i as f64;
            repo.insert(&stored).await.unwrap();
        }

        let delay = Duration::from_millis(200);
        let started = std::time::Instant::now();
        let result = paced_uploader(
            format!("{}/upload", server.url()),
            &repo,
            Arc::new(MemoryStore::default()),
            delay,
        )
        .upload_pending(0)
        .await
        .unwrap();

        assert_eq!(result.succeeded, 3);
        assert!(started.elapsed() >= delay * 2, "{:?}", started.elapsed());
    }
}
