//! Progress sink: the one-way channel a workflow writes its state through.
//!
//! The driver never reaches into the cache directly; every status change
//! goes through here, which keeps the executor → driver dependency one-way.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use trailtag_cache::JobRegistry;
use trailtag_models::{Job, JobError, JobPhase, MapVisualization};

/// Callback fired on every persisted transition: `(job_id, progress, phase)`.
pub type ProgressCallback = Arc<dyn Fn(&str, u8, &str) + Send + Sync>;

/// Writes job progress to the registry and the job-progress memory family,
/// and fans out to an optional callback.
#[derive(Clone)]
pub struct ProgressSink {
    registry: JobRegistry,
    callback: Option<ProgressCallback>,
}

impl ProgressSink {
    pub fn new(registry: JobRegistry, callback: Option<ProgressCallback>) -> Self {
        Self { registry, callback }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Merge a running-phase update into the persisted job.
    pub fn phase_update(&self, job: &Job, phase: JobPhase, progress: u8) -> Job {
        let updated = job.clone().advance(phase, progress);
        self.persist(&updated, None);
        updated
    }

    /// Persist the terminal done state with the final artifact.
    pub fn complete(&self, job: &Job, result: MapVisualization) -> Job {
        let done = job.clone().complete(result);
        self.persist(&done, None);
        done
    }

    /// Persist the terminal failed state.
    pub fn fail(&self, job: &Job, error: JobError) -> Job {
        let message = error.message.clone();
        let failed = job.clone().fail(error);
        self.persist(&failed, Some(message));
        failed
    }

    /// Persist the canceled state.
    pub fn cancel(&self, job: &Job) -> Job {
        let canceled = job.clone().cancel();
        self.persist(&canceled, None);
        canceled
    }

    fn persist(&self, job: &Job, error_message: Option<String>) {
        self.registry.store_job(job);

        // Mirror into the job-progress family; failures there are advisory.
        let result = job
            .result
            .as_ref()
            .and_then(|r| serde_json::to_value(r).ok());
        self.registry.cache().memory().save_job_progress(
            job.job_id.as_str(),
            job.video_id.as_str(),
            job.status,
            job.phase.unwrap_or(JobPhase::Processing),
            job.progress,
            job.cached,
            result,
            error_message,
        );

        if let Some(callback) = &self.callback {
            let phase = job
                .phase
                .map(|p| p.as_str())
                .unwrap_or(JobPhase::Processing.as_str());
            callback(job.job_id.as_str(), job.progress, phase);
        }
    }

    /// Record the full analysis result alongside the cache artifact.
    pub fn store_analysis(
        &self,
        job: &Job,
        metadata: Value,
        topic_summary: Value,
        map: &MapVisualization,
        processing_time: f64,
    ) {
        self.registry.store_analysis(&job.video_id, map);

        match serde_json::to_value(map) {
            Ok(map_value) => {
                self.registry.cache().memory().save_analysis_result(
                    job.video_id.as_str(),
                    metadata,
                    topic_summary,
                    map_value,
                    processing_time,
                );
            }
            Err(e) => warn!(video_id = %job.video_id, "Failed to serialize analysis: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use trailtag_cache::CacheManager;
    use trailtag_memory::{MemoryConfig, MemoryManager};
    use trailtag_models::{JobStatus, SubtitleStatus, VideoId};

    fn sink(dir: &std::path::Path, callback: Option<ProgressCallback>) -> ProgressSink {
        let memory = Arc::new(MemoryManager::open(MemoryConfig::at_path(dir)));
        ProgressSink::new(JobRegistry::new(CacheManager::new(memory)), callback)
    }

    fn job() -> Job {
        Job::new_queued(
            VideoId::new("dQw4w9WgXcQ").unwrap(),
            SubtitleStatus::unavailable(),
        )
    }

    #[test]
    fn test_phase_update_persists_both_layers() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink(dir.path(), None);

        let job = job();
        sink.registry().store_job(&job);
        let updated = sink.phase_update(&job, JobPhase::Metadata, 10);

        assert_eq!(updated.status, JobStatus::Running);

        let persisted = sink.registry().get_job(&job.job_id).unwrap();
        assert_eq!(persisted.phase, Some(JobPhase::Metadata));
        assert_eq!(persisted.progress, 10);

        let progress = sink
            .registry()
            .cache()
            .memory()
            .get_job_progress(job.job_id.as_str())
            .unwrap();
        assert_eq!(progress.progress, 10);
    }

    #[test]
    fn test_callback_fires_per_transition() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let calls_clone = Arc::clone(&calls);
        let seen_clone = Arc::clone(&seen);

        let callback: ProgressCallback = Arc::new(move |_job_id, progress, phase| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            seen_clone.lock().unwrap().push((progress, phase.to_string()));
        });
        let sink = sink(dir.path(), Some(callback));

        let job = job();
        let job = sink.phase_update(&job, JobPhase::Metadata, 10);
        sink.phase_update(&job, JobPhase::Metadata, 30);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0], (10, "metadata".to_string()));
        assert_eq!(seen[1], (30, "metadata".to_string()));
    }

    #[test]
    fn test_fail_records_error_message() {
        let dir = tempfile::tempdir().unwrap();
        let sink = sink(dir.path(), None);

        let failed = sink.fail(&job(), JobError::validation("missing subtitles"));
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.progress, 0);

        let progress = sink
            .registry()
            .cache()
            .memory()
            .get_job_progress(failed.job_id.as_str())
            .unwrap();
        assert_eq!(progress.error_message.as_deref(), Some("missing subtitles"));
    }
}
