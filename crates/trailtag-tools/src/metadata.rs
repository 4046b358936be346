//! YouTube metadata probing.
//!
//! The metadata service itself is an external collaborator; this module
//! defines the seam and an HTTP client for it, plus a static provider used
//! in tests and local development.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use trailtag_models::{SubtitleStatus, VideoId, VideoMetadata};

use crate::error::{ToolError, ToolResult};

/// Source of video metadata (title, description, chapters, subtitles).
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Fetch the full metadata for a video.
    async fn fetch(&self, video_id: &VideoId) -> ToolResult<VideoMetadata>;

    /// Probe subtitle availability only.
    ///
    /// Probe failures degrade to "unavailable" instead of erroring: the
    /// submission path treats the probe as advisory.
    async fn probe_subtitles(&self, video_id: &VideoId) -> SubtitleStatus {
        match self.fetch(video_id).await {
            Ok(metadata) => metadata.subtitle_availability,
            Err(e) => {
                warn!(%video_id, "Subtitle probe failed: {}", e);
                SubtitleStatus::unavailable()
            }
        }
    }
}

/// Configuration for the HTTP metadata client.
#[derive(Debug, Clone)]
pub struct MetadataClientConfig {
    /// Base URL of the metadata service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries for retryable failures
    pub max_retries: u32,
}

impl Default for MetadataClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8100".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }
}

impl MetadataClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("METADATA_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8100".to_string()),
            timeout: Duration::from_secs(
                std::env::var("METADATA_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            max_retries: std::env::var("METADATA_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        }
    }
}

/// HTTP client against the metadata service.
pub struct HttpMetadataProvider {
    http: reqwest::Client,
    config: MetadataClientConfig,
}

impl HttpMetadataProvider {
    pub fn new(config: MetadataClientConfig) -> ToolResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ToolError::Network)?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> ToolResult<Self> {
        Self::new(MetadataClientConfig::from_env())
    }

    async fn fetch_once(&self, video_id: &VideoId) -> ToolResult<VideoMetadata> {
        let url = format!("{}/videos/{}/metadata", self.config.base_url, video_id);
        let response = self.http.get(&url).send().await?;

        match response.status() {
            status if status.is_success() => {
                let metadata: VideoMetadata = response.json().await?;
                Ok(metadata)
            }
            reqwest::StatusCode::NOT_FOUND => Err(ToolError::NotFound(video_id.to_string())),
            status if status.is_server_error() => {
                Err(ToolError::ServiceUnavailable(status.to_string()))
            }
            status => Err(ToolError::RequestFailed(format!(
                "metadata service returned {}",
                status
            ))),
        }
    }
}

#[async_trait]
impl MetadataProvider for HttpMetadataProvider {
    async fn fetch(&self, video_id: &VideoId) -> ToolResult<VideoMetadata> {
        let mut attempt = 0;
        loop {
            match self.fetch_once(video_id).await {
                Ok(metadata) => {
                    debug!(%video_id, "Fetched video metadata");
                    return Ok(metadata);
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        %video_id,
                        attempt,
                        "Metadata fetch failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// In-memory provider with canned responses. Used by tests and by local
/// development without the metadata service.
#[derive(Default)]
pub struct StaticMetadataProvider {
    videos: RwLock<HashMap<String, VideoMetadata>>,
}

impl StaticMetadataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a canned metadata document.
    pub fn insert(&self, metadata: VideoMetadata) {
        self.videos
            .write()
            .expect("metadata lock poisoned")
            .insert(metadata.video_id.clone(), metadata);
    }
}

#[async_trait]
impl MetadataProvider for StaticMetadataProvider {
    async fn fetch(&self, video_id: &VideoId) -> ToolResult<VideoMetadata> {
        self.videos
            .read()
            .expect("metadata lock poisoned")
            .get(video_id.as_str())
            .cloned()
            .ok_or_else(|| ToolError::NotFound(video_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(video_id: &str, subtitles: Option<&str>) -> VideoMetadata {
        VideoMetadata {
            video_id: video_id.to_string(),
            title: "Taiwan trip".to_string(),
            description: String::new(),
            duration_seconds: 600.0,
            chapters: vec![],
            subtitles: subtitles.map(str::to_string),
            subtitle_availability: SubtitleStatus::from_tracks(
                vec!["zh-TW".to_string()],
                vec![],
                Some("zh-TW".to_string()),
            ),
        }
    }

    #[tokio::test]
    async fn test_static_provider_fetch() {
        let provider = StaticMetadataProvider::new();
        provider.insert(metadata("dQw4w9WgXcQ", Some("subtitle text")));

        let video = VideoId::new("dQw4w9WgXcQ").unwrap();
        let fetched = provider.fetch(&video).await.unwrap();
        assert_eq!(fetched.title, "Taiwan trip");
        assert!(fetched.has_subtitles());
    }

    #[tokio::test]
    async fn test_static_provider_missing_video() {
        let provider = StaticMetadataProvider::new();
        let video = VideoId::new("AAAAAAAAAAA").unwrap();
        assert!(matches!(
            provider.fetch(&video).await,
            Err(ToolError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_probe_degrades_to_unavailable() {
        let provider = StaticMetadataProvider::new();
        let video = VideoId::new("AAAAAAAAAAA").unwrap();
        let status = provider.probe_subtitles(&video).await;
        assert!(!status.available);
        assert_eq!(status.confidence_score, 0.0);
    }

    #[tokio::test]
    async fn test_probe_reports_tracks() {
        let provider = StaticMetadataProvider::new();
        provider.insert(metadata("dQw4w9WgXcQ", Some("text")));
        let video = VideoId::new("dQw4w9WgXcQ").unwrap();
        let status = provider.probe_subtitles(&video).await;
        assert!(status.available);
        assert_eq!(status.confidence_score, 0.95);
    }
}
