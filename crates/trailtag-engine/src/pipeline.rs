//! Analysis pipeline contract and the tool-backed reference implementation.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use trailtag_models::{
    format_timecode, AnalysisInput, LocationCandidate, MapVisualization, PipelineOutput, RouteItem,
    VideoMetadata, VideoTopicSummary,
};
use trailtag_tools::{GeocodeClient, MetadataProvider};

use crate::error::{EngineError, EngineResult};

/// Upper bound on candidates sent to the geocoder per video.
const MAX_GEOCODE_CANDIDATES: usize = 20;

/// The three observable phases of the analysis pipeline.
///
/// The agent internals behind each phase are opaque to the driver; only
/// the per-phase output contracts are fixed.
#[async_trait]
pub trait AnalysisPipeline: Send + Sync {
    /// Phase 1: extract video metadata, including the subtitle text the
    /// later phases analyze.
    async fn fetch_metadata(&self, input: &AnalysisInput) -> EngineResult<VideoMetadata>;

    /// Phase 2: summarize the content into place candidates.
    async fn summarize(
        &self,
        input: &AnalysisInput,
        metadata: &VideoMetadata,
    ) -> EngineResult<VideoTopicSummary>;

    /// Phase 3: geocode the candidates into the final artifact.
    async fn geocode(
        &self,
        input: &AnalysisInput,
        summary: &VideoTopicSummary,
    ) -> EngineResult<PipelineOutput>;
}

/// Reference pipeline assembled from the external tool clients: chapters,
/// description lines and subtitle mentions become candidates, the
/// geocoding API resolves them into route coordinates.
pub struct ToolPipeline {
    metadata: Arc<dyn MetadataProvider>,
    geocoder: Arc<GeocodeClient>,
}

impl ToolPipeline {
    pub fn new(metadata: Arc<dyn MetadataProvider>, geocoder: Arc<GeocodeClient>) -> Self {
        Self { metadata, geocoder }
    }
}

#[async_trait]
impl AnalysisPipeline for ToolPipeline {
    async fn fetch_metadata(&self, input: &AnalysisInput) -> EngineResult<VideoMetadata> {
        let metadata = self.metadata.fetch(&input.video_id).await?;
        debug!(video_id = %input.video_id, chapters = metadata.chapters.len(), "Metadata phase done");
        Ok(metadata)
    }

    async fn summarize(
        &self,
        input: &AnalysisInput,
        metadata: &VideoMetadata,
    ) -> EngineResult<VideoTopicSummary> {
        let mut locations = Vec::new();
        let mut seen = HashSet::new();

        // Chapter titles carry both a place name and a timecode.
        for chapter in &metadata.chapters {
            let name = clean_candidate(&chapter.title);
            if name.is_empty() || !seen.insert(name.to_lowercase()) {
                continue;
            }
            locations.push(LocationCandidate {
                name,
                context: Some(chapter.title.clone()),
                timecode_seconds: Some(chapter.start_seconds),
                tags: vec!["chapter".to_string()],
            });
        }

        // Description list items are the other common place markers.
        for line in metadata.description.lines() {
            let trimmed = line.trim();
            let item = trimmed
                .strip_prefix("- ")
                .or_else(|| trimmed.strip_prefix("• "))
                .or_else(|| trimmed.strip_prefix("📍"));
            if let Some(item) = item {
                let name = clean_candidate(item);
                if name.is_empty() || !seen.insert(name.to_lowercase()) {
                    continue;
                }
                locations.push(LocationCandidate {
                    name,
                    context: Some(trimmed.to_string()),
                    timecode_seconds: None,
                    tags: vec!["description".to_string()],
                });
            }
        }

        // Proper-noun runs in the subtitle text catch places the uploader
        // never listed.
        if let Some(subtitles) = &metadata.subtitles {
            for name in capitalized_runs(subtitles) {
                if !seen.insert(name.to_lowercase()) {
                    continue;
                }
                locations.push(LocationCandidate {
                    name,
                    context: None,
                    timecode_seconds: None,
                    tags: vec!["subtitle".to_string()],
                });
            }
        }

        let keywords = metadata
            .title
            .split_whitespace()
            .map(str::to_string)
            .collect();

        debug!(
            video_id = %input.video_id,
            candidates = locations.len(),
            "Summary phase done"
        );

        Ok(VideoTopicSummary {
            video_id: metadata.video_id.clone(),
            keywords,
            locations,
        })
    }

    async fn geocode(
        &self,
        input: &AnalysisInput,
        summary: &VideoTopicSummary,
    ) -> EngineResult<PipelineOutput> {
        if summary.locations.is_empty() {
            return Err(EngineError::Pipeline(
                "no location candidates to geocode".to_string(),
            ));
        }

        let mut routes = Vec::new();
        for candidate in summary.locations.iter().take(MAX_GEOCODE_CANDIDATES) {
            // A denied or failed lookup keeps the stop without coordinates.
            let coordinates = self.geocoder.geocode(&candidate.name).await;
            routes.push(RouteItem {
                location: candidate.name.clone(),
                coordinates,
                description: candidate.context.clone(),
                timecode: candidate.timecode_seconds.map(format_timecode),
                tags: (!candidate.tags.is_empty()).then(|| candidate.tags.clone()),
                marker: None,
            });
        }

        let geocoded = routes.iter().filter(|r| r.coordinates.is_some()).count();
        info!(
            video_id = %input.video_id,
            total = routes.len(),
            geocoded,
            "Geocode phase done"
        );

        Ok(PipelineOutput {
            structured: Some(MapVisualization {
                video_id: input.video_id.to_string(),
                routes,
            }),
            json_dict: None,
            raw: None,
        })
    }
}

/// Pull proper-noun runs ("Shilin Night Market", "Taipei 101") out of
/// free-form subtitle text. A run is consecutive capitalized or numeric
/// tokens; single-token runs are dropped as sentence-start noise.
fn capitalized_runs(text: &str) -> Vec<String> {
    let mut runs = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for raw in text.split_whitespace() {
        let token = raw.trim_matches(|c: char| !c.is_alphanumeric());
        if token_extends_run(token) {
            current.push(token);
        } else {
            push_run(&mut runs, &current);
            current.clear();
        }
    }
    push_run(&mut runs, &current);
    runs
}

fn token_extends_run(token: &str) -> bool {
    match token.chars().next() {
        Some(c) if c.is_uppercase() => true,
        Some(c) if c.is_ascii_digit() => token.chars().all(|c| c.is_ascii_digit()),
        _ => false,
    }
}

fn push_run(runs: &mut Vec<String>, current: &[&str]) {
    let capitalized = current
        .iter()
        .filter(|t| t.chars().next().is_some_and(char::is_uppercase))
        .count();
    if current.len() >= 2 && capitalized >= 1 {
        runs.push(current.join(" "));
    }
}

/// Strip timestamps and decorations from a candidate name.
fn clean_candidate(raw: &str) -> String {
    raw.trim()
        .trim_start_matches(|c: char| c.is_ascii_digit() || c == ':' || c == '-' || c == ' ')
        .trim_end_matches(|c: char| c == '|' || c == '-' || c == ' ')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use trailtag_models::{Chapter, JobId, SubtitleStatus, VideoId};
    use trailtag_tools::{GeocodeConfig, StaticMetadataProvider};

    fn input() -> AnalysisInput {
        AnalysisInput::new(JobId::new(), VideoId::new("dQw4w9WgXcQ").unwrap())
    }

    fn pipeline_with(metadata: VideoMetadata) -> ToolPipeline {
        let provider = StaticMetadataProvider::new();
        provider.insert(metadata);
        ToolPipeline::new(
            Arc::new(provider),
            Arc::new(GeocodeClient::new(GeocodeConfig::default()).unwrap()),
        )
    }

    fn metadata() -> VideoMetadata {
        VideoMetadata {
            video_id: "dQw4w9WgXcQ".to_string(),
            title: "Three days in Taipei".to_string(),
            description: "Places we visited:\n- Taipei 101\n• Jiufen Old Street\nthanks for watching"
                .to_string(),
            duration_seconds: 1800.0,
            chapters: vec![
                Chapter {
                    title: "00:00 Taipei 101".to_string(),
                    start_seconds: 0.0,
                },
                Chapter {
                    title: "12:30 Shilin Night Market".to_string(),
                    start_seconds: 750.0,
                },
            ],
            subtitles: Some("today we climb taipei 101".to_string()),
            subtitle_availability: SubtitleStatus::from_tracks(
                vec!["en".to_string()],
                vec![],
                Some("en".to_string()),
            ),
        }
    }

    #[tokio::test]
    async fn test_summarize_collects_chapters_and_description() {
        let pipeline = pipeline_with(metadata());
        let input = input();

        let fetched = pipeline.fetch_metadata(&input).await.unwrap();
        let summary = pipeline.summarize(&input, &fetched).await.unwrap();

        let names: Vec<&str> = summary.locations.iter().map(|l| l.name.as_str()).collect();
        assert!(names.contains(&"Taipei 101"));
        assert!(names.contains(&"Shilin Night Market"));
        assert!(names.contains(&"Jiufen Old Street"));
        // Chapter duplicate of a description item is deduplicated.
        assert_eq!(
            names.iter().filter(|n| **n == "Taipei 101").count(),
            1
        );
    }

    #[tokio::test]
    async fn test_chapter_candidates_carry_timecodes() {
        let pipeline = pipeline_with(metadata());
        let input = input();
        let fetched = pipeline.fetch_metadata(&input).await.unwrap();
        let summary = pipeline.summarize(&input, &fetched).await.unwrap();

        let market = summary
            .locations
            .iter()
            .find(|l| l.name == "Shilin Night Market")
            .unwrap();
        assert_eq!(market.timecode_seconds, Some(750.0));
    }

    #[tokio::test]
    async fn test_summarize_extracts_subtitle_mentions() {
        // No chapters and no description list items: every candidate has
        // to come from the subtitle text.
        let metadata = VideoMetadata {
            chapters: vec![],
            description: "thanks for watching".to_string(),
            subtitles: Some(
                "Next stop is Taoyuan Airport before we ride out to Sun Moon Lake".to_string(),
            ),
            ..metadata()
        };
        let pipeline = pipeline_with(metadata);
        let input = input();

        let fetched = pipeline.fetch_metadata(&input).await.unwrap();
        let summary = pipeline.summarize(&input, &fetched).await.unwrap();

        let names: Vec<&str> = summary.locations.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Taoyuan Airport", "Sun Moon Lake"]);
        assert_eq!(summary.locations[0].tags, vec!["subtitle".to_string()]);
    }

    #[tokio::test]
    async fn test_subtitle_mentions_deduplicate_against_chapters() {
        let metadata = VideoMetadata {
            description: String::new(),
            subtitles: Some("here we are at Shilin Night Market at last".to_string()),
            ..metadata()
        };
        let pipeline = pipeline_with(metadata);
        let input = input();

        let fetched = pipeline.fetch_metadata(&input).await.unwrap();
        let summary = pipeline.summarize(&input, &fetched).await.unwrap();

        // The chapter already names the market; the subtitle mention must
        // not add a second candidate.
        let markets = summary
            .locations
            .iter()
            .filter(|l| l.name == "Shilin Night Market")
            .count();
        assert_eq!(markets, 1);
    }

    #[test]
    fn test_capitalized_runs() {
        assert_eq!(
            capitalized_runs("we rode to Sun Moon Lake today"),
            vec!["Sun Moon Lake"]
        );
        assert_eq!(
            capitalized_runs("then Taipei 101, obviously"),
            vec!["Taipei 101"]
        );
        // Sentence-start capitals and bare numbers are noise, not places.
        assert!(capitalized_runs("Nothing notable happened here").is_empty());
        assert!(capitalized_runs("around 101 2024 degrees").is_empty());
    }

    #[tokio::test]
    async fn test_geocode_requires_candidates() {
        let pipeline = pipeline_with(metadata());
        let summary = VideoTopicSummary {
            video_id: "dQw4w9WgXcQ".to_string(),
            keywords: vec![],
            locations: vec![],
        };
        assert!(matches!(
            pipeline.geocode(&input(), &summary).await,
            Err(EngineError::Pipeline(_))
        ));
    }

    #[test]
    fn test_clean_candidate() {
        assert_eq!(clean_candidate("00:00 Taipei 101"), "Taipei 101");
        assert_eq!(clean_candidate("  Jiufen Old Street  "), "Jiufen Old Street");
        assert_eq!(clean_candidate("12:30 - Shilin Night Market"), "Shilin Night Market");
    }
}
