//! SSE progress event schemas pushed to stream consumers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{JobPhase, JobStatus};

/// Typed progress event for a single job stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Phase or progress changed since the last emission
    PhaseUpdate {
        #[serde(skip_serializing_if = "Option::is_none")]
        phase: Option<JobPhase>,
        progress: u8,
    },
    /// Job reached `done`; terminates the stream
    Completed { job_id: String, progress: u8 },
    /// Job failed/canceled, or was never found; terminates the stream
    Error(ErrorEvent),
    /// Emitted every polling tick to keep the connection alive
    Heartbeat { timestamp: f64, status: JobStatus },
}

/// Error event payload: a job-status shape for terminal jobs, or a bare
/// message when the job does not exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorEvent {
    JobFailed { job_id: String, status: JobStatus },
    Message { message: String },
}

impl StreamEvent {
    /// Wire name used in the SSE `event:` field.
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamEvent::PhaseUpdate { .. } => "phase_update",
            StreamEvent::Completed { .. } => "completed",
            StreamEvent::Error(_) => "error",
            StreamEvent::Heartbeat { .. } => "heartbeat",
        }
    }

    /// JSON payload for the SSE `data:` field.
    pub fn data_json(&self) -> Value {
        match self {
            StreamEvent::PhaseUpdate { phase, progress } => serde_json::json!({
                "phase": phase,
                "progress": progress,
            }),
            StreamEvent::Completed { job_id, progress } => serde_json::json!({
                "job_id": job_id,
                "progress": progress,
            }),
            StreamEvent::Error(ErrorEvent::JobFailed { job_id, status }) => serde_json::json!({
                "job_id": job_id,
                "status": status,
            }),
            StreamEvent::Error(ErrorEvent::Message { message }) => serde_json::json!({
                "message": message,
            }),
            StreamEvent::Heartbeat { timestamp, status } => serde_json::json!({
                "timestamp": timestamp,
                "status": status,
            }),
        }
    }

    /// True for events that end the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Completed { .. } | StreamEvent::Error(_))
    }

    pub fn not_found() -> Self {
        StreamEvent::Error(ErrorEvent::Message {
            message: "Job not found".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        let event = StreamEvent::PhaseUpdate {
            phase: Some(JobPhase::Metadata),
            progress: 30,
        };
        assert_eq!(event.event_name(), "phase_update");
        assert!(!event.is_terminal());

        assert!(StreamEvent::not_found().is_terminal());
    }

    #[test]
    fn test_phase_update_payload() {
        let event = StreamEvent::PhaseUpdate {
            phase: Some(JobPhase::Summary),
            progress: 70,
        };
        let data = event.data_json();
        assert_eq!(data["phase"], "summary");
        assert_eq!(data["progress"], 70);
    }

    #[test]
    fn test_error_payload_shapes() {
        let failed = StreamEvent::Error(ErrorEvent::JobFailed {
            job_id: "j1".to_string(),
            status: JobStatus::Failed,
        });
        assert_eq!(failed.data_json()["status"], "failed");

        let missing = StreamEvent::not_found();
        assert_eq!(missing.data_json()["message"], "Job not found");
    }

    #[test]
    fn test_completed_payload() {
        let event = StreamEvent::Completed {
            job_id: "j1".to_string(),
            progress: 100,
        };
        let data = event.data_json();
        assert_eq!(data["job_id"], "j1");
        assert_eq!(data["progress"], 100);
    }
}
