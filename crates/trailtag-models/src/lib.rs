//! Shared data models for the TrailTag backend.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, phases and lifecycle states
//! - Subtitle availability probing
//! - The map visualization artifact and its invariants
//! - Memory entry families (storage pool, job progress, analysis results,
//!   agent memories)
//! - The analysis pipeline contract (inputs, per-phase outputs)
//! - SSE progress event schemas
//! - HTTP request/response DTOs
//! - YouTube URL parsing

pub mod analysis;
pub mod api;
pub mod job;
pub mod map;
pub mod memory;
pub mod sse;
pub mod subtitle;
pub mod utils;

// Re-export common types
pub use analysis::{
    AnalysisInput, Chapter, LocationCandidate, PipelineOutput, VideoMetadata, VideoTopicSummary,
};
pub use api::{
    AnalyzeRequest, JobResponse, JobStatusResponse, NoSubtitlesResponse,
};
pub use job::{
    InvalidVideoId, Job, JobError, JobId, JobPhase, JobStatus, VideoId, TERMINAL_JOB_TTL_SECS,
};
pub use map::{format_timecode, MapValidationError, MapVisualization, RouteItem};
pub use memory::{
    AgentMemoryEntry, AnalysisResultEntry, JobProgressEntry, MemoryContent, MemoryEntry,
    MemoryStats, MemoryType,
};
pub use sse::{ErrorEvent, StreamEvent};
pub use subtitle::SubtitleStatus;
pub use utils::{extract_video_id, VideoIdExtractError};
