//! Axum router: maps URL paths to handlers.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{assessment, assessment_encrypted, index, self_check};
use super::state::{AppState, SharedState};
use crate::config::ServerConfig;
use crate::ports::FheEngine;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring unusable CORS origin {origin:?}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Build and return the full Axum router.
pub fn build_router<E: FheEngine>(state: AppState<E>, config: &ServerConfig) -> Router {
    let shared: SharedState<E> = Arc::new(state);

    Router::new()
        .route("/", get(index::<E>))
        .route("/assessment", post(assessment::<E>))
        .route("/assessment-encrypted", post(assessment_encrypted::<E>))
        .route("/test", get(self_check::<E>))
        // Middleware
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}
