//! HTTP request/response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::{Job, JobError, JobPhase, JobStatus, SubtitleStatus};

/// Body of `POST /api/videos/analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// YouTube video URL
    pub url: String,
}

/// Job representation returned by submission and status queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResponse {
    pub job_id: String,
    pub video_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<JobPhase>,
    pub progress: u8,
    pub cached: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_availability: Option<SubtitleStatus>,
}

impl From<&Job> for JobResponse {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.job_id.to_string(),
            video_id: job.video_id.to_string(),
            status: job.status,
            phase: job.phase,
            progress: job.progress,
            cached: job.cached,
            created_at: job.created_at,
            updated_at: job.updated_at,
            subtitle_availability: job.subtitle_availability.clone(),
        }
    }
}

/// Condensed job state returned by `GET /api/videos/{video_id}/job`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<JobPhase>,
    pub progress: u8,
    #[serde(default)]
    pub stats: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_availability: Option<SubtitleStatus>,
}

impl From<&Job> for JobStatusResponse {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.job_id.to_string(),
            status: job.status,
            phase: job.phase,
            progress: job.progress,
            stats: BTreeMap::new(),
            // Error details are only exposed for terminal failures.
            error: if matches!(job.status, JobStatus::Failed | JobStatus::Canceled) {
                job.error.clone()
            } else {
                None
            },
            subtitle_availability: job.subtitle_availability.clone(),
        }
    }
}

/// Structured 422 body for videos without analyzable subtitles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoSubtitlesResponse {
    pub message: String,
    pub suggestion: String,
    pub video_id: String,
    pub subtitle_status: SubtitleStatus,
}

impl NoSubtitlesResponse {
    pub fn new(video_id: impl Into<String>, subtitle_status: SubtitleStatus) -> Self {
        Self {
            message: "此影片沒有可用的字幕或自動字幕，無法進行分析".to_string(),
            suggestion: "請選擇有字幕的影片，或者等待 YouTube 生成自動字幕後再試".to_string(),
            video_id: video_id.into(),
            subtitle_status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VideoId;

    #[test]
    fn test_job_response_from_job() {
        let job = Job::new_queued(
            VideoId::new("dQw4w9WgXcQ").unwrap(),
            SubtitleStatus::unavailable(),
        );
        let response = JobResponse::from(&job);
        assert_eq!(response.video_id, "dQw4w9WgXcQ");
        assert_eq!(response.status, JobStatus::Queued);
        assert_eq!(response.progress, 0);
        assert!(!response.cached);
    }

    #[test]
    fn test_status_response_hides_error_for_running_jobs() {
        let mut job = Job::new_queued(
            VideoId::new("dQw4w9WgXcQ").unwrap(),
            SubtitleStatus::unavailable(),
        );
        job.error = Some(JobError::exception("stale"));
        let response = JobStatusResponse::from(&job);
        assert!(response.error.is_none());

        let failed = job.fail(JobError::exception("boom"));
        let response = JobStatusResponse::from(&failed);
        assert_eq!(response.error.unwrap().message, "boom");
    }
}
