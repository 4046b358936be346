//! Video analysis handlers: submission, locations, subtitle probe and
//! video-to-job resolution.

use axum::extract::{Path, State};
use axum::Json;
use tracing::{info, warn};

use trailtag_models::{
    extract_video_id, AnalysisInput, AnalyzeRequest, Job, JobResponse, JobStatusResponse,
    MapVisualization, NoSubtitlesResponse, SubtitleStatus, VideoId, TERMINAL_JOB_TTL_SECS,
};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// `POST /api/videos/analyze` — submit a video for analysis.
///
/// Cache hits short-circuit into a synthetic done-job; a video without
/// subtitles is rejected with 422 unless a cached analysis exists.
pub async fn analyze_video(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<JobResponse>> {
    let video_id = extract_video_id(&request.url).map_err(|e| {
        warn!(url = %request.url, "Invalid analyze URL");
        ApiError::bad_request(format!(
            "無效的 YouTube URL：{}。請確認 URL 格式正確，支援的格式包括 youtube.com/watch?v=ID 或 youtu.be/ID",
            e
        ))
    })?;

    let subtitle_status = state.metadata.probe_subtitles(&video_id).await;
    info!(
        %video_id,
        available = subtitle_status.available,
        confidence = subtitle_status.confidence_score,
        "Subtitle probe"
    );

    let has_cached = state.registry.has_analysis(&video_id);

    // A cached analysis trumps the probe; without one, missing subtitles
    // end the request before any job exists.
    if !subtitle_status.available && !has_cached {
        warn!(%video_id, "No analyzable subtitles");
        return Err(ApiError::no_subtitles(NoSubtitlesResponse::new(
            video_id.as_str(),
            subtitle_status,
        )));
    }

    if has_cached {
        info!(%video_id, "Analysis cache hit");
        metrics::record_cache_hit();

        let job = Job::new_cached(video_id.clone(), subtitle_status);
        state.registry.store_job(&job);
        state
            .registry
            .store_mapping(&video_id, &job.job_id, Some(TERMINAL_JOB_TTL_SECS));
        return Ok(Json(JobResponse::from(&job)));
    }

    let job = Job::new_queued(video_id.clone(), subtitle_status);
    state.registry.store_job(&job);
    state.registry.store_mapping(&video_id, &job.job_id, None);

    let input = AnalysisInput::new(job.job_id.clone(), video_id.clone());
    let response = JobResponse::from(&job);
    state
        .executor
        .submit(job, input, None)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    metrics::record_job_submitted();

    info!(%video_id, job_id = %response.job_id, "Job created");
    Ok(Json(response))
}

/// `GET /api/videos/{video_id}/locations` — fetch the final artifact.
pub async fn get_video_locations(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<MapVisualization>> {
    let video_id = VideoId::new(&video_id)
        .map_err(|_| ApiError::not_found(format!("找不到影片地點資料: {}", video_id)))?;

    state
        .registry
        .get_analysis(&video_id)
        .map(Json)
        .ok_or_else(|| {
            warn!(%video_id, "Locations not found");
            ApiError::not_found(format!("找不到影片地點資料: {}", video_id))
        })
}

/// `GET /api/videos/{video_id}/subtitles/check` — probe subtitle
/// availability without creating a job.
pub async fn check_video_subtitles(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<SubtitleStatus>> {
    let video_id = VideoId::new(&video_id)
        .map_err(|e| ApiError::internal(format!("無法檢查影片字幕狀態: {}", e)))?;

    let status = state.metadata.probe_subtitles(&video_id).await;
    info!(%video_id, available = status.available, "Subtitle check");
    Ok(Json(status))
}

/// `GET /api/videos/{video_id}/job` — resolve the current job for a video
/// through the `video_job` mapping; the job table is never scanned.
pub async fn get_job_by_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> ApiResult<Json<JobStatusResponse>> {
    let video_id = VideoId::new(&video_id)
        .map_err(|_| ApiError::not_found(format!("找不到針對影片的進行中任務: {}", video_id)))?;

    let job = state.registry.job_for_video(&video_id).ok_or_else(|| {
        info!(%video_id, "No current job for video");
        ApiError::not_found(format!("找不到針對影片的進行中任務: {}", video_id))
    })?;

    Ok(Json(JobStatusResponse::from(&job)))
}
