//! HTTP transport (axum).
//!
//! Thin layer over [`crate::application::AssessmentService`]: JSON in and out,
//! FHE work on the blocking pool, errors mapped to status codes.

mod error;
mod handlers;
mod router;
mod state;

pub use error::{ApiError, RequestId};
pub use handlers::AssessmentRequest;
pub use router::build_router;
pub use state::{AppState, SharedState};
