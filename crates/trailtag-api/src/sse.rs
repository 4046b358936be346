//! SSE progress stream.
//!
//! One cooperative poll loop per connection: read the job from the cache
//! every ~2 seconds, emit `phase_update` on change, a single terminal
//! `completed`/`error`, and a `heartbeat` each tick. Client disconnect
//! closes the channel and reaps the loop.

use std::convert::Infallible;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use chrono::Utc;
use futures_util::Stream;
use tokio::sync::mpsc;
use tracing::{debug, info};

use trailtag_models::{ErrorEvent, JobId, JobPhase, JobStatus, StreamEvent};

use crate::metrics;
use crate::state::AppState;

/// Global counter for active SSE streams.
static ACTIVE_SSE_STREAMS: AtomicI64 = AtomicI64::new(0);

/// Buffered events per connection before backpressure kicks in.
const SSE_SEND_BUFFER_SIZE: usize = 32;

/// Poll interval against the job cache.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// `GET /api/jobs/{job_id}/stream` — stream job progress as SSE.
pub async fn stream_job_events(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> impl IntoResponse {
    metrics::record_sse_stream_opened();
    let count = ACTIVE_SSE_STREAMS.fetch_add(1, Ordering::SeqCst) + 1;
    metrics::set_sse_active_streams(count);

    let (tx, rx) = mpsc::channel::<Event>(SSE_SEND_BUFFER_SIZE);

    tokio::spawn(async move {
        run_event_loop(state, job_id, tx).await;
        let count = ACTIVE_SSE_STREAMS.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_sse_active_streams(count);
    });

    Sse::new(receiver_stream(rx))
}

/// Wrap the channel receiver as a stream; the channel closing ends it.
fn receiver_stream(
    mut rx: mpsc::Receiver<Event>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    futures_util::stream::poll_fn(move |cx| rx.poll_recv(cx).map(|event| event.map(Ok)))
}

/// The per-connection poll loop.
async fn run_event_loop(state: AppState, job_id: String, tx: mpsc::Sender<Event>) {
    info!(job_id, "SSE stream opened");
    let id = JobId::from_string(&job_id);
    let mut last_seen: Option<(Option<JobPhase>, u8)> = None;

    loop {
        let job = state.registry.get_job(&id);

        let job = match job {
            Some(job) => job,
            None => {
                // Unknown job: exactly one error event, then close.
                send(&tx, &job_id, StreamEvent::not_found()).await;
                break;
            }
        };

        let observed = (job.phase, job.progress);
        if last_seen != Some(observed) {
            let delivered = send(
                &tx,
                &job_id,
                StreamEvent::PhaseUpdate {
                    phase: job.phase,
                    progress: job.progress,
                },
            )
            .await;
            if !delivered {
                break;
            }
            last_seen = Some(observed);
        }

        match job.status {
            JobStatus::Done => {
                send(
                    &tx,
                    &job_id,
                    StreamEvent::Completed {
                        job_id: job_id.clone(),
                        progress: 100,
                    },
                )
                .await;
                break;
            }
            JobStatus::Failed | JobStatus::Canceled => {
                send(
                    &tx,
                    &job_id,
                    StreamEvent::Error(ErrorEvent::JobFailed {
                        job_id: job_id.clone(),
                        status: job.status,
                    }),
                )
                .await;
                break;
            }
            JobStatus::Queued | JobStatus::Running => {}
        }

        let delivered = send(
            &tx,
            &job_id,
            StreamEvent::Heartbeat {
                timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
                status: job.status,
            },
        )
        .await;
        if !delivered {
            break;
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }

    debug!(job_id, "SSE stream closed");
}

/// Send one event; returns false once the client is gone.
async fn send(tx: &mpsc::Sender<Event>, job_id: &str, event: StreamEvent) -> bool {
    metrics::record_sse_event(event.event_name());
    let frame = Event::default()
        .event(event.event_name())
        .data(event.data_json().to_string())
        .id(job_id);
    tx.send(frame).await.is_ok()
}
