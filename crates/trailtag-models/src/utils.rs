//! YouTube URL parsing.

use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use crate::VideoId;

/// Error raised when no video ID can be recovered from a URL.
///
/// The display string is part of the public API contract and is matched by
/// the browser extension, so it stays in the original wording.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("無法從 URL 提取有效的 YouTube video_id: {url}")]
pub struct VideoIdExtractError {
    pub url: String,
}

/// Extraction patterns, tried in order; the first match wins.
fn patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // youtu.be/XXX or youtube.com/watch?v=XXX
            Regex::new(r"(?:v=|/)([0-9A-Za-z_-]{11}).*").unwrap(),
            // youtube.com/embed/XXX, /v/XXX
            Regex::new(r"(?:embed/|v/|youtu\.be/)([0-9A-Za-z_-]{11})").unwrap(),
        ]
    })
}

/// Extract the 11-character video ID from a YouTube URL.
pub fn extract_video_id(url: &str) -> Result<VideoId, VideoIdExtractError> {
    for pattern in patterns() {
        if let Some(captures) = pattern.captures(url) {
            if let Some(id) = captures.get(1) {
                if let Ok(video_id) = VideoId::new(id.as_str()) {
                    return Ok(video_id);
                }
            }
        }
    }
    Err(VideoIdExtractError {
        url: url.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
                .unwrap()
                .as_str(),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_short_url() {
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ")
                .unwrap()
                .as_str(),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_embed_url() {
        assert_eq!(
            extract_video_id("https://youtube.com/embed/dQw4w9WgXcQ")
                .unwrap()
                .as_str(),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_trailing_query_parameters() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PLx")
                .unwrap()
                .as_str(),
            "dQw4w9WgXcQ"
        );
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ?t=30")
                .unwrap()
                .as_str(),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_invalid_urls() {
        let err = extract_video_id("https://example.com").unwrap_err();
        assert!(err
            .to_string()
            .contains("無法從 URL 提取有效的 YouTube video_id"));

        assert!(extract_video_id("not a url at all").is_err());
        assert!(extract_video_id("https://youtube.com/watch?v=short").is_err());
    }
}
