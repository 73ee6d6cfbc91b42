// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use serde_json::json;
use std::fmt;

pub mod config;
pub mod features;
pub mod playbooks;
pub mod predict;
pub mod routes;
pub mod safety;
pub mod store;

use config::Settings;
use store::PredictionStore;

/// App state, holds the immutable settings, the shared HTTP client and the
/// prediction log. Built once in main and passed to every handler.
pub struct AppState {
    /// Settings loaded from the environment at startup, read-only thereafter.
    pub settings: Settings,
    /// Shared client for delegate and playbook calls.
    pub http: reqwest::Client,
    /// Append-only prediction log.
    pub store: PredictionStore,
}

/// API errors enum.
#[derive(Debug)]
pub enum ApiError {
    /// Structural validation failed; carries field errors plus advisory hints.
    Validation {
        errors: Vec<String>,
        hints: Vec<String>,
    },
    /// Malformed request body (e.g. no features present).
    BadRequest(String),
    /// The delegate prediction service answered with a non-success status.
    /// Its status and body are passed through to the caller unchanged.
    Delegate { status: StatusCode, body: String },
    /// The delegate call failed at the transport level (timeout, refused).
    Upstream(String),
    /// Unknown playbook slug or record id.
    NotFound(String),
    Internal(String),
}

/// Implement IntoResponse for ApiError.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation { errors, hints } => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "errors": errors, "hints": hints })),
            )
                .into_response(),
            ApiError::BadRequest(e) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": e }))).into_response()
            }
            ApiError::Delegate { status, body } => {
                // Keep the delegate's body verbatim when it is JSON, wrap it
                // otherwise so the client always gets a JSON response.
                match serde_json::from_str::<serde_json::Value>(&body) {
                    Ok(value) => (status, Json(value)).into_response(),
                    Err(_) => (status, Json(json!({ "error": body }))).into_response(),
                }
            }
            ApiError::Upstream(e) => {
                (StatusCode::BAD_GATEWAY, Json(json!({ "error": e }))).into_response()
            }
            ApiError::NotFound(e) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": e }))).into_response()
            }
            ApiError::Internal(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": e }))).into_response()
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Validation { errors, .. } => {
                write!(f, "validation failed: {}", errors.join("; "))
            }
            ApiError::Delegate { status, body } => {
                write!(f, "delegate error {status}: {body}")
            }
            ApiError::Upstream(e) => write!(f, "upstream error: {e}"),
            ApiError::BadRequest(e) | ApiError::NotFound(e) | ApiError::Internal(e) => {
                write!(f, "{e}")
            }
        }
    }
}

impl std::error::Error for ApiError {}
