// Copyright (c), Mysten Labs, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::ApiError;
use serde::{Deserialize, Serialize};

/// Column names of the feature model, in wire order. Served by /v1/features
/// and hashed into the health-check feature checksum.
pub const FEATURE_COLUMNS: [&str; 9] = [
    "age_years",
    "sex",
    "weight_kg",
    "bmi",
    "hba1c",
    "meds_diabetes",
    "fmd_regimen_type",
    "n_cycles",
    "adherence_pct",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    M,
    F,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regimen {
    StandardFmd,
    ModifiedFmd,
    Maintenance,
}

/// One scenario's validated inputs. Constructed per request from the body
/// adapter, validated once, consumed by the prediction source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSet {
    pub age_years: u32,
    pub sex: Sex,
    pub weight_kg: f64,
    pub bmi: f64,
    pub hba1c: f64,
    pub meds_diabetes: u8,
    pub fmd_regimen_type: Regimen,
    pub n_cycles: u32,
    pub adherence_pct: f64,
}

impl FeatureSet {
    /// Structural bounds check. Out-of-range values are rejected, never
    /// clamped. Returns every violated field so clients can fix all of them
    /// in one round trip.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(18..=90).contains(&self.age_years) {
            errors.push("Age must be between 18 and 90".to_string());
        }
        if self.weight_kg <= 0.0 {
            errors.push("Weight must be positive".to_string());
        }
        if !(10.0..=60.0).contains(&self.bmi) {
            errors.push("BMI must be between 10 and 60".to_string());
        }
        if !(3.0..=15.0).contains(&self.hba1c) {
            errors.push("HbA1c must be between 3.0 and 15.0".to_string());
        }
        if self.meds_diabetes > 1 {
            errors.push("meds_diabetes must be 0 or 1".to_string());
        }
        if self.n_cycles < 1 {
            errors.push("At least one cycle must be planned".to_string());
        }
        if self.n_cycles > 12 {
            errors.push("Cannot plan more than 12 cycles at once".to_string());
        }
        if !(0.0..=100.0).contains(&self.adherence_pct) {
            errors.push("Adherence must be between 0 and 100".to_string());
        } else if self.adherence_pct < 50.0 {
            errors.push(
                "Adherence must be at least 50% for meaningful projections.".to_string(),
            );
        }
        errors
    }

    /// Domain hints for suspicious-but-legal combinations. Advisory only;
    /// hints never change computed outcomes or block the request.
    pub fn hints(&self) -> Vec<String> {
        let mut hints = Vec::new();
        if self.meds_diabetes == 1 && self.hba1c < 6.0 {
            hints.push(
                "Patient is on diabetes medications despite low HbA1c; verify inputs."
                    .to_string(),
            );
        }
        // Implied height outside a plausible adult range points at a
        // weight/BMI entry mix-up.
        if self.bmi > 0.0 && self.weight_kg > 0.0 {
            let height_m = (self.weight_kg / self.bmi).sqrt();
            if !(1.2..=2.2).contains(&height_m) {
                hints.push(
                    "Unusual weight to BMI ratio; double-check height inputs.".to_string(),
                );
            }
        }
        hints
    }
}

/// Prediction request with optional caller metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub features: FeatureSet,
}

impl PredictRequest {
    /// Adapter for the two request shapes accepted during the client
    /// migration window: the canonical nested `{"features": {...}}` body and
    /// the legacy flattened one with feature fields at the top level.
    /// Anything else is a 400.
    pub fn from_body(body: serde_json::Value) -> Result<Self, ApiError> {
        let obj = body
            .as_object()
            .ok_or_else(|| ApiError::BadRequest("Request body must be a JSON object".to_string()))?;

        let user_id = obj.get("user_id").and_then(|v| v.as_str()).map(String::from);
        let session_id = obj
            .get("session_id")
            .and_then(|v| v.as_str())
            .map(String::from);

        let features = if let Some(nested) = obj.get("features") {
            serde_json::from_value(nested.clone())
                .map_err(|e| ApiError::BadRequest(format!("Invalid features: {e}")))?
        } else if obj.contains_key("age_years") {
            serde_json::from_value(body.clone())
                .map_err(|e| ApiError::BadRequest(format!("Invalid features: {e}")))?
        } else {
            return Err(ApiError::BadRequest(
                "Missing 'features' in request body".to_string(),
            ));
        };

        Ok(Self {
            user_id,
            session_id,
            features,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    pub fn baseline() -> FeatureSet {
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

    #[test]
    fn test_baseline_passes_with_no_errors_or_hints() {
        let f = baseline();
        assert!(f.validate().is_empty());
        assert!(f.hints().is_empty());
    }

    #[test]
    fn test_age_bounds() {
        let mut f = baseline();
        f.age_years = 17;
        assert_eq!(f.validate(), vec!["Age must be between 18 and 90"]);
        f.age_years = 91;
        assert_eq!(f.validate(), vec!["Age must be between 18 and 90"]);
        f.age_years = 18;
        assert!(f.validate().is_empty());
        f.age_years = 90;
        assert!(f.validate().is_empty());
    }

    #[test]
    fn test_bmi_and_hba1c_bounds() {
        let mut f = baseline();
        f.bmi = 9.9;
        assert!(f.validate().contains(&"BMI must be between 10 and 60".to_string()));
        f = baseline();
        f.hba1c = 15.1;
        assert!(f
            .validate()
            .contains(&"HbA1c must be between 3.0 and 15.0".to_string()));
    }

    #[test]
    fn test_cycle_bounds() {
        let mut f = baseline();
        f.n_cycles = 0;
        assert!(f
            .validate()
            .contains(&"At least one cycle must be planned".to_string()));
        f.n_cycles = 13;
        assert!(f
            .validate()
            .contains(&"Cannot plan more than 12 cycles at once".to_string()));
        f.n_cycles = 12;
        assert!(f.validate().is_empty());
    }

    #[test]
    fn test_low_adherence_is_an_error_not_a_hint() {
        let mut f = baseline();
        f.adherence_pct = 30.0;
        assert_eq!(
            f.validate(),
            vec!["Adherence must be at least 50% for meaningful projections."]
        );
        assert!(f.hints().is_empty());
    }

    #[test]
    fn test_multiple_errors_reported_together() {
        let mut f = baseline();
        f.age_years = 10;
        f.bmi = 70.0;
        assert_eq!(f.validate().len(), 2);
    }

    #[test]
    fn test_meds_hint_with_low_hba1c() {
        let mut f = baseline();
        f.meds_diabetes = 1;
        f.hba1c = 5.2;
        assert!(f.validate().is_empty());
        assert_eq!(
            f.hints(),
            vec!["Patient is on diabetes medications despite low HbA1c; verify inputs."]
        );
    }

    #[test]
    fn test_implausible_height_hint() {
        let mut f = baseline();
        // 150 kg at BMI 12 implies a 3.5 m patient.
        f.weight_kg = 150.0;
        f.bmi = 12.0;
        assert_eq!(
            f.hints(),
            vec!["Unusual weight to BMI ratio; double-check height inputs."]
        );
    }

    #[test]
    fn test_adapter_nested_shape() {
        let body = json!({
            "user_id": "u-1",
            "features": {
                "age_years": 45, "sex": "M", "weight_kg": 90.0, "bmi": 28.0,
                "hba1c": 6.5, "meds_diabetes": 0,
                "fmd_regimen_type": "standard_fmd", "n_cycles": 3,
                "adherence_pct": 80.0
            }
        });
        let req = PredictRequest::from_body(body).expect("nested shape should parse");
        assert_eq!(req.user_id.as_deref(), Some("u-1"));
        assert_eq!(req.features.n_cycles, 3);
        assert_eq!(req.features.fmd_regimen_type, Regimen::StandardFmd);
    }

    #[test]
    fn test_adapter_flat_shape() {
        let body = json!({
            "age_years": 45, "sex": "F", "weight_kg": 70.0, "bmi": 24.0,
            "hba1c": 5.8, "meds_diabetes": 0,
            "fmd_regimen_type": "maintenance", "n_cycles": 2,
            "adherence_pct": 95.0
        });
        let req = PredictRequest::from_body(body).expect("flat shape should parse");
        assert_eq!(req.features.sex, Sex::F);
        assert_eq!(req.features.fmd_regimen_type, Regimen::Maintenance);
    }

    #[test]
    fn test_adapter_rejects_missing_features() {
        let err = PredictRequest::from_body(json!({ "user_id": "u-1" })).unwrap_err();
        assert!(matches!(err, crate::ApiError::BadRequest(_)));
    }

    #[test]
    fn test_adapter_rejects_unknown_regimen() {
        let body = json!({
            "features": {
                "age_years": 45, "sex": "M", "weight_kg": 90.0, "bmi": 28.0,
                "hba1c": 6.5, "meds_diabetes": 0,
                "fmd_regimen_type": "keto", "n_cycles": 3, "adherence_pct": 80.0
            }
        });
        assert!(PredictRequest::from_body(body).is_err());
    }

    #[test]
    fn test_regimen_wire_names() {
        assert_eq!(
            serde_json::to_string(&Regimen::StandardFmd).unwrap(),
            "\"standard_fmd\""
        );
        assert_eq!(
            serde_json::to_string(&Regimen::ModifiedFmd).unwrap(),
            "\"modified_fmd\""
        );
    }
}
