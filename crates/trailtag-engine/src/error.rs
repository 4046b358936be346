//! Engine error types.

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A phase output failed its guardrail after all retries
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The pipeline raised while executing a phase
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// The job was canceled at a phase boundary
    #[error("Job canceled")]
    Canceled,

    /// A job with the same ID is already tracked
    #[error("Job {0} already exists")]
    DuplicateJob(String),

    /// The executor is shutting down and accepts no new work
    #[error("Executor is shut down")]
    ShutDown,

    #[error("Tool error: {0}")]
    Tool(#[from] trailtag_tools::ToolError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
