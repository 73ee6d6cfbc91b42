// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::config::Settings;
use crate::features::{FeatureSet, Regimen};
use crate::ApiError;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

/// Raw deltas as returned by the prediction source, before any safety
/// derivation. Extra fields (model version and the like) ride along in
/// `extra` and end up in the response's model_meta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPrediction {
    pub predicted_weight_change: f64,
    pub predicted_hba1c_change: f64,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Obtain a raw prediction for the given features: the deterministic stub
/// formula in dev-stub mode, a delegate call to the model service otherwise.
pub async fn raw_prediction(
    features: &FeatureSet,
    settings: &Settings,
    http: &reqwest::Client,
) -> Result<RawPrediction, ApiError> {
    if settings.dev_stub {
        return Ok(stub_prediction(features, settings));
    }
    delegate_prediction(features, settings, http).await
}

/// Deterministic stub: weight and HbA1c deltas scale with the regimen factor,
/// cycle count and baseline values, capped by the configured per-cycle
/// thresholds. Identical input always yields identical output.
pub fn stub_prediction(features: &FeatureSet, settings: &Settings) -> RawPrediction {
    let regimen_factor = match features.fmd_regimen_type {
        Regimen::StandardFmd => 1.0,
        Regimen::ModifiedFmd => 0.7,
        Regimen::Maintenance => 0.3,
    };
    let cycles = features.n_cycles as f64;
    let weight_change = -regimen_factor
        * cycles
        * (features.weight_kg * 0.01).min(settings.thresholds.max_wl_cycle_kg);
    let hba1c_change = -regimen_factor
        * cycles
        * (features.hba1c * 0.1).min(settings.thresholds.hba1c_drop_amber);

    let mut extra = serde_json::Map::new();
    extra.insert(
        "model_version".to_string(),
        serde_json::Value::String("stub-0.1".to_string()),
    );
    RawPrediction {
        predicted_weight_change: weight_change,
        predicted_hba1c_change: hba1c_change,
        extra,
    }
}

/// Forward the features to the external model service. Non-success responses
/// surface as delegate failures with the delegate's own status and body;
/// they are never replaced by stub output.
async fn delegate_prediction(
    features: &FeatureSet,
    settings: &Settings,
    http: &reqwest::Client,
) -> Result<RawPrediction, ApiError> {
    let url = format!("{}/v1/predict", settings.ml_url);
    info!("Forwarding prediction request to delegate at {url}");

    let response = http
        .post(&url)
        .json(features)
        .timeout(Duration::from_secs(settings.ml_timeout_secs))
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                ApiError::Upstream(format!(
                    "Delegate prediction timed out after {}s",
                    settings.ml_timeout_secs
                ))
            } else {
                ApiError::Upstream(format!("Delegate prediction request failed: {e}"))
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Delegate {
            // reqwest and axum track different http crate versions; carry the
            // status over by value.
            status: StatusCode::from_u16(status.as_u16())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            body,
        });
    }

    response
        .json::<RawPrediction>()
        .await
        .map_err(|e| ApiError::Upstream(format!("Invalid delegate response: {e}")))
}
