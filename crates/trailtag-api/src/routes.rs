//! API routes.

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;

use crate::handlers::health;
use crate::handlers::jobs::get_job_status;
use crate::handlers::videos::{
    analyze_video, check_video_subtitles, get_job_by_video, get_video_locations,
};
use crate::metrics::metrics_middleware;
use crate::middleware::cors_layer;
use crate::sse::stream_job_events;
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let api_routes = Router::new()
        .route("/videos/analyze", post(analyze_video))
        .route("/videos/:video_id/locations", get(get_video_locations))
        .route(
            "/videos/:video_id/subtitles/check",
            get(check_video_subtitles),
        )
        .route("/videos/:video_id/job", get(get_job_by_video))
        .route("/jobs/:job_id", get(get_job_status))
        .route("/jobs/:job_id/stream", get(stream_job_events));

    let health_routes = Router::new().route("/health", get(health));

    // Metrics endpoint (if enabled)
    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
