//! Three-phase sequential workflow driver.
//!
//! Runs metadata → summary → geocode over an [`AnalysisPipeline`], writing
//! every transition through the [`ProgressSink`] and persisting the final
//! artifact. Cancellation is observed at phase boundaries.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tracing::{error, info, warn};

use trailtag_models::{AnalysisInput, Job, JobError, JobPhase, MapVisualization};

use crate::error::{EngineError, EngineResult};
use crate::pipeline::AnalysisPipeline;
use crate::progress::ProgressSink;

/// Retries allowed when a phase output fails its guardrail.
const GUARDRAIL_MAX_RETRIES: u32 = 3;

/// Guardrail message for a metadata output without subtitles. Part of the
/// observable API contract.
const MISSING_SUBTITLES_MESSAGE: &str = "欄位 'subtitles' 缺失或為空";

/// Progress values at phase boundaries: (entry, exit) per phase.
const METADATA_PROGRESS: (u8, u8) = (10, 30);
const SUMMARY_PROGRESS: (u8, u8) = (30, 70);
const GEOCODE_PROGRESS: (u8, u8) = (70, 100);

/// Drives one analysis run end to end.
pub struct WorkflowDriver {
    pipeline: Arc<dyn AnalysisPipeline>,
}

impl WorkflowDriver {
    pub fn new(pipeline: Arc<dyn AnalysisPipeline>) -> Self {
        Self { pipeline }
    }

    /// Run the workflow for `job`. All job-state writes go through `sink`;
    /// the returned artifact is also persisted under `analysis:{video_id}`.
    pub async fn run(
        &self,
        job: Job,
        input: AnalysisInput,
        sink: &ProgressSink,
        cancel: watch::Receiver<bool>,
    ) -> EngineResult<MapVisualization> {
        let started = Instant::now();
        let video_id = job.video_id.clone();

        let result = self.run_phases(&job, &input, sink, &cancel, started).await;

        match &result {
            Ok(_) => {
                info!(job_id = %job.job_id, %video_id, "Workflow completed");
            }
            Err(EngineError::Canceled) => {
                warn!(job_id = %job.job_id, %video_id, "Workflow canceled");
                sink.cancel(&job);
            }
            Err(EngineError::Validation(message)) => {
                error!(job_id = %job.job_id, %video_id, "Guardrail failure: {}", message);
                sink.fail(&job, JobError::validation(message.clone()));
            }
            Err(e) => {
                error!(job_id = %job.job_id, %video_id, "Workflow failed: {}", e);
                sink.fail(&job, JobError::exception(e.to_string()));
            }
        }

        // A terminal job no longer owns the video mapping; the removal is
        // best-effort and the next submission overwrites a leftover.
        sink.registry().remove_mapping(&video_id);

        result
    }

    async fn run_phases(
        &self,
        job: &Job,
        input: &AnalysisInput,
        sink: &ProgressSink,
        cancel: &watch::Receiver<bool>,
        started: Instant,
    ) -> EngineResult<MapVisualization> {
        // Phase 1: metadata, with the subtitle guardrail.
        check_canceled(cancel)?;
        let job = sink.phase_update(job, JobPhase::Metadata, METADATA_PROGRESS.0);

        let metadata = self.fetch_metadata_guarded(input).await?;
        let job = sink.phase_update(&job, JobPhase::Metadata, METADATA_PROGRESS.1);

        // Phase 2: summary.
        check_canceled(cancel)?;
        let job = sink.phase_update(&job, JobPhase::Summary, SUMMARY_PROGRESS.0);

        let summary = self.pipeline.summarize(input, &metadata).await?;
        let job = sink.phase_update(&job, JobPhase::Summary, SUMMARY_PROGRESS.1);

        // Phase 3: geocode.
        check_canceled(cancel)?;
        let job = sink.phase_update(&job, JobPhase::Geocode, GEOCODE_PROGRESS.0);

        let output = self.pipeline.geocode(input, &summary).await?;
        let map = output
            .into_map_visualization(job.video_id.as_str())
            .ok_or_else(|| EngineError::Pipeline("pipeline produced no artifact".to_string()))?;
        map.validate()
            .map_err(|e| EngineError::Pipeline(e.to_string()))?;

        // Persist the artifact and the terminal job state.
        sink.store_analysis(
            &job,
            serde_json::to_value(&metadata)?,
            serde_json::to_value(&summary)?,
            &map,
            started.elapsed().as_secs_f64(),
        );
        sink.complete(&job, map.clone());

        Ok(map)
    }

    /// Run the metadata phase, retrying guardrail rejections.
    async fn fetch_metadata_guarded(
        &self,
        input: &AnalysisInput,
    ) -> EngineResult<trailtag_models::VideoMetadata> {
        let mut attempt = 0u32;
        loop {
            let metadata = self.pipeline.fetch_metadata(input).await?;
            if metadata.has_subtitles() {
                return Ok(metadata);
            }
            if attempt >= GUARDRAIL_MAX_RETRIES {
                return Err(EngineError::Validation(
                    MISSING_SUBTITLES_MESSAGE.to_string(),
                ));
            }
            attempt += 1;
            warn!(
                video_id = %input.video_id,
                attempt,
                "Metadata output missing subtitles, retrying phase"
            );
        }
    }
}

fn check_canceled(cancel: &watch::Receiver<bool>) -> EngineResult<()> {
    if *cancel.borrow() {
        return Err(EngineError::Canceled);
    }
    Ok(())
}
