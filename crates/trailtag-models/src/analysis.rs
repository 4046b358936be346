//! Analysis pipeline contract types.
//!
//! The agent pipeline itself is an external collaborator; these types pin
//! down what the workflow driver feeds it and what it hands back per phase.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{JobId, MapVisualization, SubtitleStatus, VideoId};

/// Input handed to the pipeline for one analysis run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisInput {
    pub job_id: JobId,
    pub video_id: VideoId,
    /// What the summarization phase should look for in the video
    pub search_subject: String,
}

impl AnalysisInput {
    pub fn new(job_id: JobId, video_id: VideoId) -> Self {
        Self {
            job_id,
            video_id,
            search_subject: "找出景點、餐廳、交通方式與住宿的地理位置".to_string(),
        }
    }
}

/// A chapter marker from the video description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub start_seconds: f64,
}

/// Output of the metadata extraction phase.
///
/// `subtitles` is the guardrail field: the driver rejects this output and
/// retries the phase when it is missing or empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub video_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub duration_seconds: f64,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    /// Full subtitle text selected for analysis
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitles: Option<String>,
    pub subtitle_availability: SubtitleStatus,
}

impl VideoMetadata {
    /// True when the guardrail field carries analyzable text.
    pub fn has_subtitles(&self) -> bool {
        self.subtitles
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
    }
}

/// A place candidate surfaced by the summarization phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationCandidate {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Offset into the video where the place is mentioned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timecode_seconds: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Output of the summarization phase. Opaque to the driver beyond the
/// candidate list handed to geocoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoTopicSummary {
    pub video_id: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub locations: Vec<LocationCandidate>,
}

/// Raw pipeline output wrapper.
///
/// Mirrors the shapes an agent framework can produce; the final artifact is
/// recovered with [`PipelineOutput::into_map_visualization`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineOutput {
    /// Fully structured artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured: Option<MapVisualization>,
    /// Loose JSON document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_dict: Option<Value>,
    /// Raw textual output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl PipelineOutput {
    /// Extract the final artifact, in precedence order: structured object,
    /// JSON document, raw text parsed as JSON, raw text as a single route.
    pub fn into_map_visualization(self, video_id: &str) -> Option<MapVisualization> {
        if let Some(map) = self.structured {
            return Some(map);
        }
        if let Some(doc) = self.json_dict {
            if let Ok(map) = serde_json::from_value::<MapVisualization>(doc) {
                return Some(map);
            }
        }
        if let Some(raw) = self.raw {
            if let Ok(map) = serde_json::from_str::<MapVisualization>(&raw) {
                return Some(map);
            }
            if !raw.trim().is_empty() {
                return Some(MapVisualization {
                    video_id: video_id.to_string(),
                    routes: vec![crate::RouteItem {
                        location: raw,
                        coordinates: None,
                        description: None,
                        timecode: None,
                        tags: None,
                        marker: None,
                    }],
                });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RouteItem;

    fn map() -> MapVisualization {
        MapVisualization {
            video_id: "dQw4w9WgXcQ".to_string(),
            routes: vec![RouteItem {
                location: "Shibuya".to_string(),
                coordinates: Some([139.7016, 35.6580]),
                description: None,
                timecode: None,
                tags: None,
                marker: None,
            }],
        }
    }

    #[test]
    fn test_structured_takes_precedence() {
        let output = PipelineOutput {
            structured: Some(map()),
            json_dict: Some(serde_json::json!({"video_id": "other", "routes": []})),
            raw: Some("ignored".to_string()),
        };
        let extracted = output.into_map_visualization("dQw4w9WgXcQ").unwrap();
        assert_eq!(extracted.routes[0].location, "Shibuya");
    }

    #[test]
    fn test_json_dict_fallback() {
        let output = PipelineOutput {
            structured: None,
            json_dict: Some(serde_json::to_value(map()).unwrap()),
            raw: None,
        };
        assert!(output.into_map_visualization("dQw4w9WgXcQ").is_some());
    }

    #[test]
    fn test_raw_parsed_as_json() {
        let output = PipelineOutput {
            structured: None,
            json_dict: None,
            raw: Some(serde_json::to_string(&map()).unwrap()),
        };
        let extracted = output.into_map_visualization("dQw4w9WgXcQ").unwrap();
        assert_eq!(extracted.routes.len(), 1);
    }

    #[test]
    fn test_raw_as_is() {
        let output = PipelineOutput {
            structured: None,
            json_dict: None,
            raw: Some("plain text".to_string()),
        };
        let extracted = output.into_map_visualization("dQw4w9WgXcQ").unwrap();
        assert_eq!(extracted.routes[0].location, "plain text");
        assert!(extracted.routes[0].coordinates.is_none());
    }

    #[test]
    fn test_empty_output() {
        assert!(PipelineOutput::default()
            .into_map_visualization("dQw4w9WgXcQ")
            .is_none());
    }

    #[test]
    fn test_guardrail_field() {
        let mut metadata = VideoMetadata {
            video_id: "dQw4w9WgXcQ".to_string(),
            title: "t".to_string(),
            description: String::new(),
            duration_seconds: 0.0,
            chapters: vec![],
            subtitles: None,
            subtitle_availability: SubtitleStatus::unavailable(),
        };
        assert!(!metadata.has_subtitles());
        metadata.subtitles = Some("   ".to_string());
        assert!(!metadata.has_subtitles());
        metadata.subtitles = Some("we visited Taipei 101".to_string());
        assert!(metadata.has_subtitles());
    }
}
