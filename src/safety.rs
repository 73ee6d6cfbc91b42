// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::config::SafetyThresholds;
use crate::features::FeatureSet;
use crate::predict::RawPrediction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyBadge {
    Green,
    Amber,
    Red,
}

impl RiskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::Low => "low",
            RiskCategory::Moderate => "moderate",
            RiskCategory::High => "high",
        }
    }
}

impl SafetyBadge {
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyBadge::Green => "green",
            SafetyBadge::Amber => "amber",
            SafetyBadge::Red => "red",
        }
    }
}

/// Result of the safety classification rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub risk_category: RiskCategory,
    pub safety_badge: SafetyBadge,
    pub projected_bmi: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PerCycleChange {
    pub weight: f64,
    pub hba1c: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PredictionConfidence {
    pub weight: f64,
    pub hba1c: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rationale {
    pub reason: String,
    pub inputs_used: FeatureSet,
}

/// Canonical v1 prediction payload. One versioned schema; no historical key
/// aliases, no wrapper objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionOutcome {
    pub predicted_weight_change: f64,
    pub predicted_bmi_change: f64,
    pub predicted_hba1c_change: f64,
    pub per_cycle: PerCycleChange,
    pub confidence: PredictionConfidence,
    pub risk_category: RiskCategory,
    pub safety_badge: SafetyBadge,
    pub rationale: Rationale,
    pub model_meta: serde_json::Map<String, serde_json::Value>,
}

/// Classify predicted deltas into a risk tier and badge. Pure function of
/// its arguments; first matching rule wins, comparisons are strict so values
/// exactly on a threshold stay in the lower tier.
pub fn classify(
    weight_delta: f64,
    hba1c_delta: f64,
    features: &FeatureSet,
    thresholds: &SafetyThresholds,
) -> Classification {
    // BMI = weight / height^2, so the implied height is sqrt(weight / bmi).
    let height_m = (features.weight_kg / features.bmi).sqrt();
    let projected_bmi = (features.weight_kg + weight_delta) / (height_m * height_m);

    let cycles = features.n_cycles as f64;
    let (risk_category, safety_badge) = if weight_delta.abs()
        > thresholds.max_wl_cycle_kg * cycles
        || projected_bmi < thresholds.min_projected_bmi
    {
        (RiskCategory::High, SafetyBadge::Red)
    } else if hba1c_delta.abs() > thresholds.hba1c_drop_amber * cycles {
        (RiskCategory::Moderate, SafetyBadge::Amber)
    } else {
        (RiskCategory::Low, SafetyBadge::Green)
    };

    Classification {
        risk_category,
        safety_badge,
        projected_bmi,
    }
}

/// Derive the full client-facing outcome from a raw prediction: projected
/// BMI, risk tier, per-cycle deltas and the explanatory payload.
pub fn apply_safety_and_risk(
    features: &FeatureSet,
    raw: &RawPrediction,
    thresholds: &SafetyThresholds,
) -> PredictionOutcome {
    let classification = classify(
        raw.predicted_weight_change,
        raw.predicted_hba1c_change,
        features,
        thresholds,
    );

    // The validator bounds n_cycles to at least one.
    assert!(features.n_cycles >= 1, "n_cycles must be at least 1");
    let cycles = features.n_cycles as f64;

    PredictionOutcome {
        predicted_weight_change: raw.predicted_weight_change,
        predicted_bmi_change: classification.projected_bmi - features.bmi,
        predicted_hba1c_change: raw.predicted_hba1c_change,
        per_cycle: PerCycleChange {
            weight: raw.predicted_weight_change / cycles,
            hba1c: raw.predicted_hba1c_change / cycles,
        },
        confidence: PredictionConfidence {
            weight: 0.75,
            hba1c: 0.75,
        },
        risk_category: classification.risk_category,
        safety_badge: classification.safety_badge,
        rationale: Rationale {
            reason: "Predictions are generated based on baseline metrics and chosen regimen."
                .to_string(),
            inputs_used: features.clone(),
        },
        model_meta: raw.extra.clone(),
    }
}
