// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::features::FeatureSet;
use crate::safety::PredictionOutcome;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use uuid::Uuid;

/// Hard cap on /v1/predictions?limit=N to keep result sets bounded.
pub const MAX_LIST_LIMIT: u32 = 500;

/// Prediction log schema. Append-only; rows are never updated or deleted by
/// the service itself. Risk and badge are duplicated out of the outcome JSON
/// so operational queries do not have to parse it.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS predictions (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    user_id TEXT,
    session_id TEXT,
    features TEXT NOT NULL,
    outcome TEXT NOT NULL,
    risk_category TEXT NOT NULL,
    safety_badge TEXT NOT NULL,
    model_version TEXT
);

CREATE INDEX IF NOT EXISTS idx_predictions_created_at ON predictions(created_at);
"#;

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid timestamp: {0}")]
    Timestamp(String),

    #[error("Task join error: {0}")]
    Join(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One persisted prediction, as served by /v1/predictions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub features: FeatureSet,
    pub outcome: PredictionOutcome,
}

/// Append-only prediction log backed by SQLite. The connection is shared
/// behind a mutex and every call runs on the blocking thread pool, so
/// handlers never block the async runtime on SQLite I/O.
#[derive(Clone)]
pub struct PredictionStore {
    conn: Arc<Mutex<Connection>>,
}

impl PredictionStore {
    /// Open the log at path, creating the schema if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// In-memory log (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Append one prediction and return its generated record id. A single
    /// atomic insert; no cross-request ordering beyond the timestamp.
    pub async fn record(
        &self,
        user_id: Option<String>,
        session_id: Option<String>,
        features: &FeatureSet,
        outcome: &PredictionOutcome,
    ) -> StoreResult<String> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now().to_rfc3339();
        let features_json = serde_json::to_string(features)?;
        let outcome_json = serde_json::to_string(outcome)?;
        let risk = outcome.risk_category.as_str();
        let badge = outcome.safety_badge.as_str();
        let model_version = outcome
            .model_meta
            .get("model_version")
            .and_then(|v| v.as_str())
            .map(String::from);

        let conn = self.conn.clone();
        let record_id = id.clone();
        tokio::task::spawn_blocking(move || -> StoreResult<()> {
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            conn.execute(
                "INSERT INTO predictions
                     (id, created_at, user_id, session_id, features, outcome,
                      risk_category, safety_badge, model_version)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    record_id,
                    created_at,
                    user_id,
                    session_id,
                    features_json,
                    outcome_json,
                    risk,
                    badge,
                    model_version,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))??;

        Ok(id)
    }

    /// Most recent records, newest first. The limit is clamped to
    /// 1..=MAX_LIST_LIMIT.
    pub async fn list_recent(&self, limit: u32) -> StoreResult<Vec<PredictionRecord>> {
        let limit = limit.clamp(1, MAX_LIST_LIMIT);
        let conn = self.conn.clone();

        let rows = tokio::task::spawn_blocking(
            move || -> StoreResult<Vec<(String, String, Option<String>, Option<String>, String, String)>> {
                let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
                let mut stmt = conn.prepare(
                    "SELECT id, created_at, user_id, session_id, features, outcome
                     FROM predictions
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT ?1",
                )?;
                let rows = stmt
                    .query_map([limit], |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            },
        )
        .await
        .map_err(|e| StoreError::Join(e.to_string()))??;

        rows.into_iter()
            .map(|(id, created_at, user_id, session_id, features, outcome)| {
                Ok(PredictionRecord {
                    id,
                    created_at: DateTime::parse_from_rfc3339(&created_at)
                        .map_err(|e| StoreError::Timestamp(e.to_string()))?
                        .with_timezone(&Utc),
                    user_id,
                    session_id,
                    features: serde_json::from_str(&features)?,
                    outcome: serde_json::from_str(&outcome)?,
                })
            })
            .collect()
    }

    /// Number of persisted predictions (for tests and ops checks).
    pub async fn count(&self) -> StoreResult<u64> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || -> StoreResult<u64> {
            let conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            let n: u64 = conn.query_row("SELECT COUNT(*) FROM predictions", [], |row| row.get(0))?;
            Ok(n)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::{SafetyThresholds, Settings};
    use crate::features::{Regimen, Sex};
    use crate::predict::stub_prediction;
    use crate::safety::apply_safety_and_risk;

    fn baseline() -> FeatureSet {
        FeatureSet {
            age_years: 45,
            sex: Sex::M,
            weight_kg: 90.0,
            bmi: 28.0,
            hba1c: 6.5,
            meds_diabetes: 0,
            fmd_regimen_type: Regimen::StandardFmd,
            n_cycles: 3,
            adherence_pct: 80.0,
        }
    }

    fn outcome_for(features: &FeatureSet) -> PredictionOutcome {
        let settings = Settings {
            dev_stub: true,
            ..Settings::default()
        };
        let raw = stub_prediction(features, &settings);
        apply_safety_and_risk(features, &raw, &SafetyThresholds::default())
    }

    #[tokio::test]
    async fn test_record_and_list_roundtrip() {
        let store = PredictionStore::open_in_memory().unwrap();
        let f = baseline();
        let outcome = outcome_for(&f);
        let id = store
            .record(Some("u-1".to_string()), None, &f, &outcome)
            .await
            .unwrap();

        let records = store.list_recent(10).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert_eq!(records[0].user_id.as_deref(), Some("u-1"));
        assert_eq!(records[0].features.weight_kg, 90.0);
        assert_eq!(records[0].outcome.safety_badge, outcome.safety_badge);
    }

    #[tokio::test]
    async fn test_list_recent_newest_first() {
        let store = PredictionStore::open_in_memory().unwrap();
        let f = baseline();
        let outcome = outcome_for(&f);
        let mut ids = Vec::new();
        for _ in 0..3 {
            ids.push(store.record(None, None, &f, &outcome).await.unwrap());
        }

        let records = store.list_recent(10).await.unwrap();
        assert_eq!(records.len(), 3);
        // Insert order reversed.
        assert_eq!(records[0].id, ids[2]);
        assert_eq!(records[2].id, ids[0]);
        assert!(records[0].created_at >= records[2].created_at);
    }

    #[tokio::test]
    async fn test_list_recent_honors_limit() {
        let store = PredictionStore::open_in_memory().unwrap();
        let f = baseline();
        let outcome = outcome_for(&f);
        for _ in 0..5 {
            store.record(None, None, &f, &outcome).await.unwrap();
        }
        assert_eq!(store.list_recent(2).await.unwrap().len(), 2);
        assert_eq!(store.count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_limit_zero_is_clamped_up() {
        let store = PredictionStore::open_in_memory().unwrap();
        let f = baseline();
        let outcome = outcome_for(&f);
        store.record(None, None, &f, &outcome).await.unwrap();
        // A zero limit still returns one record rather than an unbounded or
        // empty set.
        assert_eq!(store.list_recent(0).await.unwrap().len(), 1);
    }
}
