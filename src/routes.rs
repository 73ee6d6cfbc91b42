// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::features::{PredictRequest, FEATURE_COLUMNS};
use crate::playbooks;
use crate::predict::raw_prediction;
use crate::safety::{apply_safety_and_risk, PredictionOutcome};
use crate::store::PredictionRecord;
use crate::{ApiError, AppState};
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

/// Response for the health endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub feature_checksum: String,
    pub dev_stub: bool,
}

/// Response for /v1/validate.
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationResult {
    pub ok: bool,
    pub errors: Vec<String>,
    pub hints: Vec<String>,
}

/// Stable checksum of the feature model, so clients can verify schema
/// compatibility against the columns they were built for.
pub fn feature_checksum() -> String {
    let mut hasher = Sha256::new();
    hasher.update(FEATURE_COLUMNS.join(",").as_bytes());
    hex::encode(hasher.finalize())[..8].to_string()
}

/// Liveness and config echo.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        feature_checksum: feature_checksum(),
        dev_stub: state.settings.dev_stub,
    })
}

/// Validate incoming features and return errors/hints without predicting.
pub async fn post_validate(
    Json(body): Json<serde_json::Value>,
) -> Result<Json<ValidationResult>, ApiError> {
    let request = PredictRequest::from_body(body)?;
    let errors = request.features.validate();
    let hints = request.features.hints();
    Ok(Json(ValidationResult {
        ok: errors.is_empty(),
        errors,
        hints,
    }))
}

/// Validate, predict, classify, persist, respond.
pub async fn post_predict(
    State(state): State<Arc<AppState>>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<PredictionOutcome>, ApiError> {
    let request = PredictRequest::from_body(body)?;
    let errors = request.features.validate();
    if !errors.is_empty() {
        return Err(ApiError::Validation {
            errors,
            hints: request.features.hints(),
        });
    }

    let raw = raw_prediction(&request.features, &state.settings, &state.http).await?;
    let outcome = apply_safety_and_risk(&request.features, &raw, &state.settings.thresholds);

    // Best effort: a failed write must not cost the caller their computed
    // outcome, but it has to be visible for alerting.
    match state
        .store
        .record(request.user_id, request.session_id, &request.features, &outcome)
        .await
    {
        Ok(record_id) => info!(
            "Recorded prediction {record_id} with badge {}",
            outcome.safety_badge.as_str()
        ),
        Err(e) => warn!("Failed to persist prediction: {e}"),
    }

    Ok(Json(outcome))
}

/// Feature column list, as consumed by the ops frontend.
pub async fn get_features() -> Json<Vec<&'static str>> {
    Json(FEATURE_COLUMNS.to_vec())
}

/// All playbooks from the external content store.
pub async fn get_playbooks(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    let records = playbooks::fetch_playbooks(&state.settings, &state.http).await?;
    Ok(Json(records))
}

/// Single playbook by slug, or 404.
pub async fn get_playbook(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    playbooks::fetch_playbook_by_slug(&state.settings, &state.http, &slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Playbook not found".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
}

/// Most recent persisted predictions, newest first.
pub async fn get_predictions(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<PredictionRecord>>, ApiError> {
    let records = state
        .store
        .list_recent(params.limit.unwrap_or(50))
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to read prediction log: {e}")))?;
    Ok(Json(records))
}

/// Assemble the application router. CORS stays permissive for the MVP.
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/validate", post(post_validate))
        .route("/v1/predict", post(post_predict))
        .route("/v1/features", get(get_features))
        .route("/v1/playbooks", get(get_playbooks))
        .route("/v1/playbooks/:slug", get(get_playbook))
        .route("/v1/predictions", get(get_predictions))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_feature_checksum_is_stable() {
        let a = feature_checksum();
        let b = feature_checksum();
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
