//! Job status handlers.

use axum::extract::{Path, State};
use axum::Json;
use tracing::warn;

use trailtag_models::{JobId, JobResponse};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `GET /api/jobs/{job_id}` — query a job by ID.
///
/// Terminal jobs stay visible until their TTL elapses, then 404.
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobResponse>> {
    let job_id = JobId::from_string(&job_id);
    state
        .executor
        .get_job_status(&job_id)
        .map(|job| Json(JobResponse::from(&job)))
        .ok_or_else(|| {
            warn!(%job_id, "Job not found");
            ApiError::not_found(format!("任務不存在: {}", job_id))
        })
}
