//! Analysis orchestration for the TrailTag backend.
//!
//! - [`AnalysisExecutor`]: bounded-concurrency scheduler with cooperative
//!   cancellation and a best-effort persisted lifecycle.
//! - [`WorkflowDriver`]: the three-phase metadata → summary → geocode
//!   controller, including the subtitle guardrail.
//! - [`ProgressSink`]: the one-way channel workflows write progress
//!   through; no component reaches back into the executor.
//! - [`AnalysisPipeline`]: the seam behind which the agent pipeline lives,
//!   with [`ToolPipeline`] as the tool-backed implementation.

pub mod config;
pub mod driver;
pub mod error;
pub mod executor;
pub mod pipeline;
pub mod progress;

pub use config::EngineConfig;
pub use driver::WorkflowDriver;
pub use error::{EngineError, EngineResult};
pub use executor::{AnalysisExecutor, ExecutionJob, ExecutionStatus};
pub use pipeline::{AnalysisPipeline, ToolPipeline};
pub use progress::{ProgressCallback, ProgressSink};
