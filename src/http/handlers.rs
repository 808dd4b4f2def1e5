//! Request handlers.
//!
//! FHE work is CPU-bound and takes seconds, so every assessment runs on the
//! blocking pool under the configured timeout. A request that times out gets
//! its error response immediately; its blocking task finishes on its own and
//! drops its context without side effects.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::Instrument;

use super::error::{ApiError, RequestId};
use super::state::SharedState;
use crate::application::{AssessmentService, SelfCheckReport};
use crate::domain::{
    EncryptedAssessmentRequest, EncryptedAssessmentResponse, RiskAssessment, FEATURE_NAMES,
};
use crate::ports::FheEngine;
use crate::AssessmentError;

/// Body of `POST /assessment`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentRequest {
    pub features: Vec<f64>,
}

async fn run_blocking<E, T, F>(
    state: &SharedState<E>,
    request_id: &RequestId,
    job: F,
) -> Result<T, ApiError>
where
    E: FheEngine,
    T: Send + 'static,
    F: FnOnce(&AssessmentService<E>) -> Result<T, AssessmentError> + Send + 'static,
{
    let service = state.service.clone();
    let span = tracing::Span::current();
    let task = tokio::task::spawn_blocking(move || span.in_scope(|| job(&service)));

    match tokio::time::timeout(state.request_timeout, task).await {
        Err(_) => Err(ApiError::timeout(state.request_timeout, request_id)),
        Ok(Err(join_error)) => Err(ApiError::internal(join_error, request_id)),
        Ok(Ok(result)) => result.map_err(|e| ApiError::from_assessment(e, request_id)),
    }
}

/// `GET /`: service banner and endpoint index.
pub async fn index<E: FheEngine>(State(state): State<SharedState<E>>) -> Json<Value> {
    let model = state.service.model();
    Json(json!({
        "service": "cipherscore",
        "version": env!("CARGO_PKG_VERSION"),
        "model_version": model.version,
        "features": FEATURE_NAMES,
        "scheme": state.service.engine().parameters(),
        "endpoints": {
            "GET /": "this index",
            "POST /assessment": "score plaintext features through a server-side encryption context",
            "POST /assessment-encrypted": "score client-encrypted, normalized features; returns the encrypted raw score",
            "GET /test": "homomorphic self-check",
        },
    }))
}

/// `POST /assessment`: plaintext-input mode.
pub async fn assessment<E: FheEngine>(
    State(state): State<SharedState<E>>,
    payload: Result<Json<AssessmentRequest>, JsonRejection>,
) -> Result<Json<RiskAssessment>, ApiError> {
    let request_id = RequestId::generate();
    let span = tracing::info_span!("assessment", request_id = %request_id);

    async {
        let Json(request) = payload.map_err(|r| ApiError::from_rejection(r, &request_id))?;
        tracing::info!("Received {} features", request.features.len());

        let assessment =
            run_blocking(&state, &request_id, move |service| service.assess(&request.features))
                .await?;
        Ok(Json(assessment))
    }
    .instrument(span)
    .await
}

/// `POST /assessment-encrypted`: client-encrypted mode.
pub async fn assessment_encrypted<E: FheEngine>(
    State(state): State<SharedState<E>>,
    payload: Result<Json<EncryptedAssessmentRequest>, JsonRejection>,
) -> Result<Json<EncryptedAssessmentResponse>, ApiError> {
    let request_id = RequestId::generate();
    let span = tracing::info_span!("assessment_encrypted", request_id = %request_id);

    async {
        let Json(request) = payload.map_err(|r| ApiError::from_rejection(r, &request_id))?;
        tracing::info!("Received encrypted request {request:?}");

        let response = run_blocking(&state, &request_id, move |service| {
            service.assess_encrypted(&request)
        })
        .await?;
        Ok(Json(response))
    }
    .instrument(span)
    .await
}

/// `GET /test`: self-check. Reports failures in the body with status 200.
pub async fn self_check<E: FheEngine>(
    State(state): State<SharedState<E>>,
) -> Result<Json<SelfCheckReport>, ApiError> {
    let request_id = RequestId::generate();
    let span = tracing::info_span!("self_check", request_id = %request_id);

    async {
        let report = run_blocking(&state, &request_id, |service| Ok(service.self_check())).await?;
        Ok(Json(report))
    }
    .instrument(span)
    .await
}
