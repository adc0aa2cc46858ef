//! Stored item model.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use super::feed::{Attachment, Encoding, FeedItem, Post, Profile, DOWNLOADABLE_KIND};

/// One captured piece of content and its pipeline state.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub post_id: String,
    pub generation_id: String,
    pub video_url: String,
    pub thumbnail_url: String,
    pub text: String,
    pub username: String,
    pub user_id: String,
    /// Seconds since the epoch.
    pub posted_at: f64,
    pub width: i32,
    pub height: i32,
    pub downloaded_at: DateTime<Utc>,
    pub local_video_path: PathBuf,
    /// None when the thumbnail could not be fetched.
    pub local_thumbnail_path: Option<PathBuf>,
    /// Public object store URL. Present exactly when the video is in the store.
    pub object_store_url: Option<String>,
    pub uploaded_to_cms: bool,
    /// Token returned by the CMS, which may omit it.
    pub cms_token: Option<String>,
}

impl Item {
    /// Build a freshly downloaded item from a feed entry.
    pub fn from_feed(
        entry: &FeedItem,
        attachment: &Attachment,
        local_video_path: &Path,
        local_thumbnail_path: Option<&Path>,
    ) -> Self {
        Self {
            post_id: entry.post.id.clone(),
            generation_id: attachment.generation_id.clone().unwrap_or_default(),
            video_url: attachment.download_url().unwrap_or_default().to_string(),
            thumbnail_url: attachment.thumbnail_url().unwrap_or_default().to_string(),
            text: entry.post.text.clone().unwrap_or_default(),
            username: entry.profile.username.clone().unwrap_or_default(),
            user_id: entry.profile.user_id.clone(),
            posted_at: entry.post.posted_at,
            width: attachment.width,
            height: attachment.height,
            downloaded_at: Utc::now(),
            local_video_path: local_video_path.to_path_buf(),
            local_thumbnail_path: local_thumbnail_path.map(Path::to_path_buf),
            object_store_url: None,
            uploaded_to_cms: false,
            cms_token: None,
        }
    }

    pub fn uploaded_to_object_store(&self) -> bool {
        self.object_store_url.is_some()
    }

    /// Rebuild a feed entry carrying the fields this item keeps.
    pub fn to_feed_item(&self) -> FeedItem {
        let mut encodings = std::collections::BTreeMap::new();
        if !self.thumbnail_url.is_empty() {
            encodings.insert(
                "thumbnail".to_string(),
                Some(Encoding {
                    path: Some(self.thumbnail_url.clone()),
                    size: None,
                }),
            );
        }

        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());

        FeedItem {
            post: Post {
                id: self.post_id.clone(),
                posted_at: self.posted_at,
                text: non_empty(&self.text),
                attachments: vec![Attachment {
                    id: self.post_id.clone(),
                    kind: DOWNLOADABLE_KIND.to_string(),
                    generation_id: non_empty(&self.generation_id),
                    downloadable_url: non_empty(&self.video_url),
                    width: self.width,
                    height: self.height,
                    encodings,
                    ..Default::default()
                }],
                ..Default::default()
            },
            profile: Profile {
                user_id: self.user_id.clone(),
                username: non_empty(&self.username),
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_entry() -> FeedItem {
        FeedItem {
            post: Post {
                id: "s_1".to_string(),
                posted_at: 1759700000.5,
                text: Some("hello".to_string()),
                attachments: vec![Attachment {
                    id: "a".to_string(),
                    kind: DOWNLOADABLE_KIND.to_string(),
                    generation_id: Some("gen".to_string()),
                    downloadable_url: Some("https://videos.openai.com/v.mp4".to_string()),
                    width: 720,
                    height: 1280,
                    ..Default::default()
                }],
                ..Default::default()
            },
            profile: Profile {
                user_id: "u1".to_string(),
                username: Some("alice".to_string()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_from_feed_and_back() {
        let entry = feed_entry();
        let attachment = entry.video_attachment().unwrap();
        let item = Item::from_feed(&entry, attachment, Path::new("/d/s_1/video.mp4"), None);

        assert_eq!(item.post_id, "s_1");
        assert_eq!(item.username, "alice");
        assert_eq!(item.local_thumbnail_path, None);
        assert!(!item.uploaded_to_object_store());

        let back = item.to_feed_item();
        assert_eq!(back.post.id, "s_1");
        assert_eq!(back.post.text.as_deref(), Some("hello"));
        assert!(back.video_attachment().is_some());
        assert_eq!(back.profile.username.as_deref(), Some("alice"));
    }
}
