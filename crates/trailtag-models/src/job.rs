//! Job definitions for the analysis pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{MapVisualization, SubtitleStatus};

/// TTL applied to jobs once they reach a terminal state (seconds).
pub const TERMINAL_JOB_TTL_SECS: u64 = 60;

/// Unique identifier for an analysis job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An 11-character YouTube video identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Validate and wrap a raw video ID.
    ///
    /// IDs are exactly 11 characters of `[0-9A-Za-z_-]`.
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidVideoId> {
        let id = id.into();
        if id.len() != 11 {
            return Err(InvalidVideoId(id));
        }
        if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(InvalidVideoId(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error for malformed video IDs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid YouTube video id: {0}")]
pub struct InvalidVideoId(pub String);

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting for a worker slot
    #[default]
    Queued,
    /// Job is being analyzed
    Running,
    /// Analysis finished and a result is available
    Done,
    /// Analysis failed
    Failed,
    /// Job was canceled before completion
    Canceled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Done | JobStatus::Failed | JobStatus::Canceled
        )
    }
}

/// Analysis phase the job is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    /// Video metadata extraction
    Metadata,
    /// Topic summarization
    Summary,
    /// Geocoding and route assembly
    Geocode,
    /// Generic processing (no finer phase known)
    Processing,
}

impl JobPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Metadata => "metadata",
            JobPhase::Summary => "summary",
            JobPhase::Geocode => "geocode",
            JobPhase::Processing => "processing",
        }
    }

    /// Ordinal used for monotonicity checks on progress updates.
    pub fn ordinal(&self) -> u8 {
        match self {
            JobPhase::Metadata => 0,
            JobPhase::Summary => 1,
            JobPhase::Geocode => 2,
            JobPhase::Processing => 3,
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured job error, serialized as `{"type": ..., "message": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

impl JobError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            error_type: "validation".to_string(),
            message: message.into(),
        }
    }

    pub fn exception(message: impl Into<String>) -> Self {
        Self {
            error_type: "exception".to_string(),
            message: message.into(),
        }
    }
}

/// A single analysis run, persisted under `job:{job_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID
    pub job_id: JobId,

    /// Source video
    pub video_id: VideoId,

    /// Lifecycle state
    #[serde(default)]
    pub status: JobStatus,

    /// Current analysis phase (absent until the workflow starts)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<JobPhase>,

    /// Progress (0-100)
    #[serde(default)]
    pub progress: u8,

    /// Whether the result was served from the analysis cache
    #[serde(default)]
    pub cached: bool,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Final artifact (present on non-cached done jobs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<MapVisualization>,

    /// Error details (present on failed jobs)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,

    /// Subtitle probe outcome captured at submission
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_availability: Option<SubtitleStatus>,
}

impl Job {
    /// Create a freshly queued job.
    pub fn new_queued(video_id: VideoId, subtitles: SubtitleStatus) -> Self {
        let now = Utc::now();
        Self {
            job_id: JobId::new(),
            video_id,
            status: JobStatus::Queued,
            phase: None,
            progress: 0,
            cached: false,
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
            subtitle_availability: Some(subtitles),
        }
    }

    /// Create a synthetic done-job for a cache hit.
    pub fn new_cached(video_id: VideoId, subtitles: SubtitleStatus) -> Self {
        let now = Utc::now();
        Self {
            job_id: JobId::new(),
            video_id,
            status: JobStatus::Done,
            phase: Some(JobPhase::Geocode),
            progress: 100,
            cached: true,
            created_at: now,
            updated_at: now,
            result: None,
            error: None,
            subtitle_availability: Some(subtitles),
        }
    }

    /// Mark the job running in the given phase.
    pub fn advance(mut self, phase: JobPhase, progress: u8) -> Self {
        self.status = JobStatus::Running;
        self.phase = Some(phase);
        self.progress = progress.min(100);
        self.updated_at = Utc::now();
        self
    }

    /// Mark the job done with its final artifact.
    pub fn complete(mut self, result: MapVisualization) -> Self {
        self.status = JobStatus::Done;
        self.phase = Some(JobPhase::Geocode);
        self.progress = 100;
        self.result = Some(result);
        self.updated_at = Utc::now();
        self
    }

    /// Mark the job failed. Progress resets to 0 on terminal failure.
    pub fn fail(mut self, error: JobError) -> Self {
        self.status = JobStatus::Failed;
        self.phase = Some(JobPhase::Geocode);
        self.progress = 0;
        self.error = Some(error);
        self.updated_at = Utc::now();
        self
    }

    /// Mark the job canceled.
    pub fn cancel(mut self) -> Self {
        self.status = JobStatus::Canceled;
        self.updated_at = Utc::now();
        self
    }

    /// Check the persisted-job invariants.
    pub fn check_invariants(&self) -> bool {
        if self.progress > 100 {
            return false;
        }
        if self.updated_at < self.created_at {
            return false;
        }
        if self.status == JobStatus::Done {
            if self.progress != 100 {
                return false;
            }
            if self.result.is_none() && !self.cached {
                return false;
            }
        }
        true
    }
}
