//! Item repository.
//!
//! The single source of truth for which posts were captured and how far each
//! one has progressed through the upload pipeline.

use std::collections::HashSet;
use std::path::PathBuf;

use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::models::{NewVideo, VideoRecord};
use super::pool::{DbError, SqlitePool};
use super::util::parse_datetime;
use crate::models::{FeedResponse, Item};
use crate::schema::videos;

/// Convert a database record to a domain model.
impl From<VideoRecord> for Item {
    fn from(record: VideoRecord) -> Self {
        let object_store_url = record
            .object_store_url
            .filter(|_| record.uploaded_to_object_store != 0);
        let local_thumbnail_path = (!record.local_thumbnail_path.is_empty())
            .then(|| PathBuf::from(&record.local_thumbnail_path));

        Item {
            post_id: record.post_id,
            generation_id: record.generation_id,
            video_url: record.video_url,
            thumbnail_url: record.thumbnail_url,
            text: record.text,
            username: record.username,
            user_id: record.user_id,
            posted_at: record.posted_at,
            width: record.width,
            height: record.height,
            downloaded_at: parse_datetime(&record.downloaded_at),
            local_video_path: PathBuf::from(record.local_video_path),
            local_thumbnail_path,
            object_store_url,
            uploaded_to_cms: record.uploaded_to_cms != 0,
            cms_token: record.cms_token,
        }
    }
}

/// Upload progress across all stored items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub total: u64,
    pub in_object_store: u64,
    pub uploaded: u64,
    pub pending: u64,
}

/// Diesel-backed repository for captured items.
#[derive(Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
}

impl ItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All known post identifiers.
    pub async fn existing_post_ids(&self) -> Result<HashSet<String>, DbError> {
        let mut conn = self.pool.get().await?;

        let ids = videos::table
            .select(videos::post_id)
            .load::<String>(&mut conn)
            .await?;

        Ok(ids.into_iter().collect())
    }

    pub async fn exists(&self, post_id: &str) -> Result<bool, DbError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        let count: i64 = videos::table
            .filter(videos::post_id.eq(post_id))
            .select(count_star())
            .first(&mut conn)
            .await?;

        Ok(count > 0)
    }

    /// Insert a newly downloaded item.
    ///
    /// Fails with a unique violation if the post is already stored; rows are
    /// never replaced.
    pub async fn insert(&self, item: &Item) -> Result<(), DbError> {
        let mut conn = self.pool.get().await?;

        let downloaded_at = item.downloaded_at.to_rfc3339();
        let video_path = item.local_video_path.display().to_string();
        let thumbnail_path = item
            .local_thumbnail_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        let record = NewVideo {
            post_id: &item.post_id,
            generation_id: &item.generation_id,
            video_url: &item.video_url,
            thumbnail_url: &item.thumbnail_url,
            text: &item.text,
            username: &item.username,
            user_id: &item.user_id,
            posted_at: item.posted_at,
            width: item.width,
            height: item.height,
            downloaded_at: &downloaded_at,
            local_video_path: &video_path,
            local_thumbnail_path: &thumbnail_path,
        };

        diesel::insert_into(videos::table)
            .values(&record)
            .execute(&mut conn)
            .await?;

        Ok(())
    }

    pub async fn get(&self, post_id: &str) -> Result<Option<Item>, DbError> {
        let mut conn = self.pool.get().await?;

        videos::table
            .find(post_id)
            .first::<VideoRecord>(&mut conn)
            .await
            .optional()
            .map(|opt| opt.map(Item::from))
    }

    pub async fn count(&self) -> Result<u64, DbError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        let count: i64 = videos::table.select(count_star()).first(&mut conn).await?;

        Ok(count as u64)
    }

    /// Items ordered newest first. A limit of 0 returns everything.
    pub async fn list(&self, limit: usize) -> Result<Vec<Item>, DbError> {
        let mut conn = self.pool.get().await?;

        let mut query = videos::table.order(videos::posted_at.desc()).into_boxed();
        if limit > 0 {
            query = query.limit(limit as i64);
        }

        query
            .load::<VideoRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(Item::from).collect())
    }

    /// Items not yet accepted by the CMS, newest first.
    pub async fn pending_cms(&self, limit: usize) -> Result<Vec<Item>, DbError> {
        let mut conn = self.pool.get().await?;

        let mut query = videos::table
            .filter(videos::uploaded_to_cms.eq(0))
            .order(videos::posted_at.desc())
            .into_boxed();
        if limit > 0 {
            query = query.limit(limit as i64);
        }

        query
            .load::<VideoRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(Item::from).collect())
    }

    /// Items whose video has not been pushed to the object store.
    pub async fn pending_object_store(&self, limit: usize) -> Result<Vec<Item>, DbError> {
        let mut conn = self.pool.get().await?;

        let mut query = videos::table
            .filter(videos::uploaded_to_object_store.eq(0))
            .order(videos::posted_at.desc())
            .into_boxed();
        if limit > 0 {
            query = query.limit(limit as i64);
        }

        query
            .load::<VideoRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(Item::from).collect())
    }

    /// Record the object store URL. The URL and flag are always written together.
    pub async fn set_object_store_url(&self, post_id: &str, url: &str) -> Result<(), DbError> {
        let mut conn = self.pool.get().await?;

        let rows = diesel::update(videos::table.find(post_id))
            .set((
                videos::object_store_url.eq(Some(url)),
                videos::uploaded_to_object_store.eq(1),
            ))
            .execute(&mut conn)
            .await?;

        if rows == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    pub async fn set_cms_token(&self, post_id: &str, token: &str) -> Result<(), DbError> {
        let mut conn = self.pool.get().await?;

        let rows = diesel::update(videos::table.find(post_id))
            .set(videos::cms_token.eq(Some(token)))
            .execute(&mut conn)
            .await?;

        if rows == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    pub async fn mark_cms_uploaded(&self, post_id: &str) -> Result<(), DbError> {
        let mut conn = self.pool.get().await?;

        let rows = diesel::update(videos::table.find(post_id))
            .set(videos::uploaded_to_cms.eq(1))
            .execute(&mut conn)
            .await?;

        if rows == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    pub async fn upload_stats(&self) -> Result<UploadStats, DbError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        let total: i64 = videos::table.select(count_star()).first(&mut conn).await?;
        let in_object_store: i64 = videos::table
            .filter(videos::uploaded_to_object_store.eq(1))
            .select(count_star())
            .first(&mut conn)
            .await?;
        let uploaded: i64 = videos::table
            .filter(videos::uploaded_to_cms.eq(1))
            .select(count_star())
            .first(&mut conn)
            .await?;

        Ok(UploadStats {
            total: total as u64,
            in_object_store: in_object_store as u64,
            uploaded: uploaded as u64,
            pending: (total - uploaded) as u64,
        })
    }

    /// Rebuild a feed document from stored items, newest first.
    pub async fn export_feed(&self, limit: usize) -> Result<FeedResponse, DbError> {
        let items = self.list(limit).await?;

        Ok(FeedResponse {
            items: items.iter().map(Item::to_feed_item).collect(),
        })
    }
}
