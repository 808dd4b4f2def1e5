//! Shared application state for the HTTP server.

use std::sync::Arc;
use std::time::Duration;

use crate::application::AssessmentService;
use crate::ports::FheEngine;

/// Shared state injected into every Axum handler.
pub struct AppState<E: FheEngine> {
    pub service: AssessmentService<E>,
    /// Upper bound on the time a request waits for its FHE work.
    pub request_timeout: Duration,
}

impl<E: FheEngine> AppState<E> {
    pub fn new(service: AssessmentService<E>, request_timeout: Duration) -> Self {
        Self {
            service,
            request_timeout,
        }
    }
}

pub type SharedState<E> = Arc<AppState<E>>;
