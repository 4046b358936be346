//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "trailtag_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "trailtag_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "trailtag_http_requests_in_flight";

    // SSE metrics
    pub const SSE_STREAMS_TOTAL: &str = "trailtag_sse_streams_total";
    pub const SSE_STREAMS_ACTIVE: &str = "trailtag_sse_streams_active";
    pub const SSE_EVENTS_SENT: &str = "trailtag_sse_events_sent_total";

    // Job metrics
    pub const JOBS_SUBMITTED_TOTAL: &str = "trailtag_jobs_submitted_total";
    pub const JOBS_CACHE_HITS_TOTAL: &str = "trailtag_jobs_cache_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record an SSE stream being opened.
pub fn record_sse_stream_opened() {
    counter!(names::SSE_STREAMS_TOTAL).increment(1);
}

/// Update the active SSE stream gauge.
pub fn set_sse_active_streams(count: i64) {
    gauge!(names::SSE_STREAMS_ACTIVE).set(count as f64);
}

/// Record an SSE event sent to a client.
pub fn record_sse_event(event_type: &str) {
    let labels = [("type", event_type.to_string())];
    counter!(names::SSE_EVENTS_SENT, &labels).increment(1);
}

/// Record an analysis job submission.
pub fn record_job_submitted() {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
}

/// Record a submission answered from the analysis cache.
pub fn record_cache_hit() {
    counter!(names::JOBS_CACHE_HITS_TOTAL).increment(1);
}

/// Sanitize path for metrics labels (remove IDs, etc.).
fn sanitize_path(path: &str) -> String {
    let path = regex::Regex::new(
        r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
    )
    .unwrap()
    .replace_all(path, ":job_id");
    // Normalize video IDs (path segment after /videos/)
    let path = regex::Regex::new(r"/videos/[a-zA-Z0-9_-]+")
        .unwrap()
        .replace_all(&path, "/videos/:video_id");
    path.to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
