// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::env;

/// Process-wide settings, loaded from the environment once at startup and
/// passed explicitly through AppState. Read-only for the process lifetime.
///
/// Environment variables:
///
/// * `BIND_ADDR` - address the server listens on.
/// * `DEV_STUB` - if truthy, predictions use the deterministic stub formula
///   instead of calling the delegate model service.
/// * `ML_URL` - base URL of the delegate model service.
/// * `ML_TIMEOUT_SECS` - timeout for the delegate call.
/// * `MAX_WL_CYCLE_KG` - max weight loss per cycle before a red badge.
/// * `MIN_PROJECTED_BMI` - projected BMI floor before a red badge.
/// * `HBA1C_DROP_PER_CYCLE_HIGH` - high-risk HbA1c drop threshold per cycle.
/// * `HBA1C_DROP_PER_CYCLE_AMBER` - amber HbA1c drop threshold per cycle.
/// * `SUPABASE_URL` - base REST URL of the playbook content store.
/// * `SUPABASE_API_KEY` - read-only key for the content store.
/// * `DATABASE_PATH` - SQLite file for the prediction log.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: String,
    pub dev_stub: bool,
    pub ml_url: String,
    pub ml_timeout_secs: u64,
    pub thresholds: SafetyThresholds,
    pub supabase_url: Option<String>,
    pub supabase_api_key: Option<String>,
    pub database_path: String,
}

/// Safety thresholds used by the classifier.
#[derive(Debug, Clone)]
pub struct SafetyThresholds {
    pub max_wl_cycle_kg: f64,
    pub min_projected_bmi: f64,
    pub hba1c_drop_high: f64,
    pub hba1c_drop_amber: f64,
}

impl Default for SafetyThresholds {
    fn default() -> Self {
        Self {
            max_wl_cycle_kg: 3.0,
            min_projected_bmi: 18.5,
            hba1c_drop_high: 1.5,
            hba1c_drop_amber: 1.0,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            dev_stub: false,
            ml_url: "http://localhost:9000".to_string(),
            ml_timeout_secs: 30,
            thresholds: SafetyThresholds::default(),
            supabase_url: None,
            supabase_api_key: None,
            database_path: "predictions.db".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from the environment, falling back to defaults for
    /// anything unset or unparsable.
    pub fn from_env() -> Self {
        let defaults = Settings::default();
        let threshold_defaults = SafetyThresholds::default();
        Self {
            bind_addr: env_or("BIND_ADDR", defaults.bind_addr),
            dev_stub: env_truthy("DEV_STUB"),
            ml_url: env_or("ML_URL", defaults.ml_url),
            ml_timeout_secs: env_parsed("ML_TIMEOUT_SECS", defaults.ml_timeout_secs),
            thresholds: SafetyThresholds {
                max_wl_cycle_kg: env_parsed("MAX_WL_CYCLE_KG", threshold_defaults.max_wl_cycle_kg),
                min_projected_bmi: env_parsed(
                    "MIN_PROJECTED_BMI",
                    threshold_defaults.min_projected_bmi,
                ),
                hba1c_drop_high: env_parsed(
                    "HBA1C_DROP_PER_CYCLE_HIGH",
                    threshold_defaults.hba1c_drop_high,
                ),
                hba1c_drop_amber: env_parsed(
                    "HBA1C_DROP_PER_CYCLE_AMBER",
                    threshold_defaults.hba1c_drop_amber,
                ),
            },
            supabase_url: env::var("SUPABASE_URL").ok().filter(|s| !s.is_empty()),
            supabase_api_key: env::var("SUPABASE_API_KEY").ok().filter(|s| !s.is_empty()),
            database_path: env_or("DATABASE_PATH", defaults.database_path),
        }
    }
}

fn env_or(key: &str, default: String) -> String {
    env::var(key).ok().filter(|s| !s.is_empty()).unwrap_or(default)
}

fn env_truthy(key: &str) -> bool {
    matches!(
        env::var(key).unwrap_or_default().to_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
