//! Bounded-concurrency analysis executor.
//!
//! Schedules workflows on the tokio runtime behind a semaphore, tracks
//! their lifecycle in an in-memory table, and persists transitions through
//! the progress sink. The running table is authoritative while the process
//! lives; the cache is the fallback for finished jobs.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, error, info, warn};

use trailtag_models::{AnalysisInput, Job, JobId};

use crate::config::EngineConfig;
use crate::driver::WorkflowDriver;
use crate::error::{EngineError, EngineResult};
use crate::progress::{ProgressCallback, ProgressSink};

/// Executor-side lifecycle state of a tracked workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Canceled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Canceled
        )
    }
}

/// In-memory tracking record for a scheduled workflow.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionJob {
    pub job_id: String,
    pub workflow_name: String,
    pub status: ExecutionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct TrackedJob {
    execution: ExecutionJob,
    cancel: watch::Sender<bool>,
}

/// Bounded-concurrency runner for analysis workflows.
pub struct AnalysisExecutor {
    config: EngineConfig,
    driver: Arc<WorkflowDriver>,
    sink_template: ProgressSink,
    permits: Arc<Semaphore>,
    running: Arc<Mutex<HashMap<String, TrackedJob>>>,
    shutdown: watch::Sender<bool>,
}

impl AnalysisExecutor {
    pub fn new(config: EngineConfig, driver: WorkflowDriver, sink: ProgressSink) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);
        info!(
            max_concurrent_jobs = config.max_concurrent_jobs,
            "AnalysisExecutor initialized"
        );
        Self {
            config,
            driver: Arc::new(driver),
            sink_template: sink,
            permits,
            running: Arc::new(Mutex::new(HashMap::new())),
            shutdown,
        }
    }

    /// Schedule a workflow for background execution and return immediately.
    ///
    /// `job` must already carry its identity; a duplicate `job_id` in the
    /// running table is rejected. The persisted queued record is written
    /// before scheduling so status queries see it at once.
    pub fn submit(
        &self,
        job: Job,
        input: AnalysisInput,
        progress_cb: Option<ProgressCallback>,
    ) -> EngineResult<JobId> {
        if *self.shutdown.borrow() {
            return Err(EngineError::ShutDown);
        }

        let job_id = job.job_id.clone();
        let (cancel_tx, cancel_rx) = watch::channel(false);

        {
            let mut running = self.running.lock().expect("running table lock poisoned");
            if running.contains_key(job_id.as_str()) {
                return Err(EngineError::DuplicateJob(job_id.to_string()));
            }
            running.insert(
                job_id.to_string(),
                TrackedJob {
                    execution: ExecutionJob {
                        job_id: job_id.to_string(),
                        workflow_name: "video_analysis".to_string(),
                        status: ExecutionStatus::Pending,
                        created_at: Utc::now(),
                        started_at: None,
                        completed_at: None,
                        error: None,
                    },
                    cancel: cancel_tx,
                },
            );
        }

        let sink = ProgressSink::new(self.sink_template.registry().clone(), progress_cb);
        sink.registry().store_job(&job);

        let driver = Arc::clone(&self.driver);
        let permits = Arc::clone(&self.permits);
        let running = Arc::clone(&self.running);
        let spawned_job_id = job_id.to_string();

        tokio::spawn(async move {
            let permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(job_id = %spawned_job_id, "Executor closed before dispatch");
                    return;
                }
            };
            let _permit = permit;

            mark(&running, &spawned_job_id, |execution| {
                execution.status = ExecutionStatus::Running;
                execution.started_at = Some(Utc::now());
            });
            debug!(job_id = %spawned_job_id, "Dispatched workflow");

            let result = driver.run(job, input, &sink, cancel_rx).await;

            let status = match &result {
                Ok(_) => ExecutionStatus::Completed,
                Err(EngineError::Canceled) => ExecutionStatus::Canceled,
                Err(_) => ExecutionStatus::Failed,
            };
            let error = result.as_ref().err().map(|e| e.to_string());
            mark(&running, &spawned_job_id, |execution| {
                execution.status = status;
                execution.completed_at = Some(Utc::now());
                execution.error = error.clone();
            });

            if let Err(e) = &result {
                error!(job_id = %spawned_job_id, "Workflow ended with error: {}", e);
            }

            // Terminal jobs leave the running table; the cache keeps them
            // observable until their TTL elapses.
            running
                .lock()
                .expect("running table lock poisoned")
                .remove(&spawned_job_id);
        });

        info!(job_id = %job_id, "Submitted analysis workflow");
        Ok(job_id)
    }

    /// Look a job up: the running table proves liveness, but the persisted
    /// record in the cache is the externally-visible state. Once a terminal
    /// job's cache TTL elapses the job is gone for callers.
    pub fn get_job_status(&self, job_id: &JobId) -> Option<Job> {
        self.sink_template.registry().get_job(job_id)
    }

    /// Cooperative cancellation; returns false for unknown or finished jobs.
    pub fn cancel(&self, job_id: &JobId) -> bool {
        let running = self.running.lock().expect("running table lock poisoned");
        match running.get(job_id.as_str()) {
            Some(tracked) => {
                let signaled = tracked.cancel.send(true).is_ok();
                if signaled {
                    info!(%job_id, "Cancellation requested");
                } else {
                    warn!(%job_id, "Cancellation signal had no receiver");
                }
                signaled
            }
            None => {
                warn!(%job_id, "Cancel requested for unknown job");
                false
            }
        }
    }

    /// Snapshot of the running table.
    pub fn get_running_jobs(&self) -> HashMap<String, ExecutionJob> {
        self.running
            .lock()
            .expect("running table lock poisoned")
            .iter()
            .map(|(id, tracked)| (id.clone(), tracked.execution.clone()))
            .collect()
    }

    /// Number of jobs currently tracked.
    pub fn running_count(&self) -> usize {
        self.running
            .lock()
            .expect("running table lock poisoned")
            .len()
    }

    /// Cancel everything and wait for in-flight workflows to drain.
    pub async fn shutdown(&self) {
        info!("Shutting down AnalysisExecutor");
        let _ = self.shutdown.send(true);

        {
            let running = self.running.lock().expect("running table lock poisoned");
            for tracked in running.values() {
                let _ = tracked.cancel.send(true);
            }
        }

        // Drain: all permits free means no workflow still holds one.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(30);
        loop {
            if self.permits.available_permits() == self.config.max_concurrent_jobs {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!("Executor shutdown timed out with jobs still in flight");
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        info!("AnalysisExecutor shutdown complete");
    }
}

fn mark(
    running: &Arc<Mutex<HashMap<String, TrackedJob>>>,
    job_id: &str,
    f: impl FnOnce(&mut ExecutionJob),
) {
    if let Some(tracked) = running
        .lock()
        .expect("running table lock poisoned")
        .get_mut(job_id)
    {
        f(&mut tracked.execution);
    }
}
