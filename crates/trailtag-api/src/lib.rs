//! TrailTag HTTP API.
//!
//! Request validation, job submission with cache short-circuiting, status
//! and result queries, and per-job SSE progress streams.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod sse;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
