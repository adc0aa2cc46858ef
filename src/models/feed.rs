//! Feed payload schema.
//!
//! The same types parse the live feed endpoint and saved snapshots. Maps are
//! ordered so serialized snapshots are stable across runs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The only attachment kind treated as a downloadable video.
pub const DOWNLOADABLE_KIND: &str = "sora";

/// Top-level feed response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedResponse {
    #[serde(default)]
    pub items: Vec<FeedItem>,
}

/// One entry of the feed: a post and its author.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedItem {
    pub post: Post,
    pub profile: Profile,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Post {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_by: Option<String>,
    pub posted_at: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub attachments: Vec<Attachment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
    pub like_count: i64,
    pub view_count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture_url: Option<String>,
    pub follower_count: i64,
    pub post_count: i64,
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attachment {
    pub id: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloadable_url: Option<String>,
    pub width: i32,
    pub height: i32,
    /// Named variants (`thumbnail`, `source`, `md`, ...). Variants may be null.
    pub encodings: BTreeMap<String, Option<Encoding>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Encoding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
}

impl Attachment {
    /// Non-empty download URL, if any.
    pub fn download_url(&self) -> Option<&str> {
        self.downloadable_url.as_deref().filter(|u| !u.is_empty())
    }

    pub fn is_downloadable(&self) -> bool {
        self.kind == DOWNLOADABLE_KIND && self.download_url().is_some()
    }

    /// Path of the `thumbnail` encoding, if present.
    pub fn thumbnail_url(&self) -> Option<&str> {
        self.encodings
            .get("thumbnail")
            .and_then(|e| e.as_ref())
            .and_then(|e| e.path.as_deref())
            .filter(|p| !p.is_empty())
    }
}

impl FeedItem {
    /// First attachment that can be downloaded as the item's video.
    pub fn video_attachment(&self) -> Option<&Attachment> {
        self.post.attachments.iter().find(|a| a.is_downloadable())
    }
}
