//! Classification of observed network requests.

use url::Url;

use crate::models::MediaType;

/// Host that serves generated media.
pub const MEDIA_HOST: &str = "videos.openai.com";

const VIDEO_SUFFIX: &str = ".mp4";
const THUMBNAIL_SUFFIX: &str = ".webp";
const THUMBNAIL_TOKEN: &str = "thumbnail";

/// Outcome of classifying one request URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlClass {
    Video,
    Thumbnail,
    Irrelevant,
}

impl UrlClass {
    pub fn media_type(&self) -> Option<MediaType> {
        match self {
            Self::Video => Some(MediaType::Video),
            Self::Thumbnail => Some(MediaType::Thumbnail),
            Self::Irrelevant => None,
        }
    }
}

/// Classify a request URL against the default media host.
pub fn classify(url: &str) -> UrlClass {
    classify_for_host(url, MEDIA_HOST)
}

/// Classify a request URL. Only URLs served by `media_host` can be media.
///
/// Rules are ordered: a video suffix wins over thumbnail markers.
pub fn classify_for_host(url: &str, media_host: &str) -> UrlClass {
    let Ok(parsed) = Url::parse(url) else {
        return UrlClass::Irrelevant;
    };
    if !parsed
        .host_str()
        .is_some_and(|host| host.eq_ignore_ascii_case(media_host))
    {
        return UrlClass::Irrelevant;
    }

    // Signed media URLs carry the file name in the path, but match the whole
    // URL so suffixes in query parameters still count.
    let lowered = url.to_ascii_lowercase();
    if lowered.contains(VIDEO_SUFFIX) {
        UrlClass::Video
    } else if lowered.contains(THUMBNAIL_SUFFIX) || lowered.contains(THUMBNAIL_TOKEN) {
        UrlClass::Thumbnail
    } else {
        UrlClass::Irrelevant
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_urls() {
        assert_eq!(
            classify("https://videos.openai.com/vg-assets/assets%2Ftask_01k6/src.mp4?st=2025"),
            UrlClass::Video
        );
        assert_eq!(
            classify("https://videos.openai.com/az/files/00000000/raw?se=1&name=clip.mp4"),
            UrlClass::Video
        );
    }

    #[test]
    fn test_thumbnail_urls() {
        assert_eq!(
            classify("https://videos.openai.com/vg-assets/task_01k6/thumb.webp"),
            UrlClass::Thumbnail
        );
        assert_eq!(
            classify("https://videos.openai.com/vg-assets/task_01k6/thumbnail?size=md"),
            UrlClass::Thumbnail
        );
    }

    #[test]
    fn test_video_suffix_wins() {
        assert_eq!(
            classify("https://videos.openai.com/thumbnail/preview.mp4"),
            UrlClass::Video
        );
    }

    #[test]
    fn test_other_hosts_are_irrelevant() {
        for url in [
            "https://cdn.example.com/clip.mp4",
            "https://sora.chatgpt.com/thumbnail.webp",
            "https://videos.openai.com.evil.net/clip.mp4",
            "https://evil.net/?u=https://videos.openai.com/clip.mp4",
            "not a url",
        ] {
            assert_eq!(classify(url), UrlClass::Irrelevant, "{}", url);
        }
    }

    #[test]
    fn test_media_host_without_media_marker() {
        assert_eq!(
            classify("https://videos.openai.com/api/health"),
            UrlClass::Irrelevant
        );
        assert_eq!(UrlClass::Irrelevant.media_type(), None);
        assert_eq!(UrlClass::Video.media_type(), Some(MediaType::Video));
    }

    #[test]
    fn test_custom_host() {
        assert_eq!(
            classify_for_host("https://media.test/a/b.mp4", "media.test"),
            UrlClass::Video
        );
    }
}
