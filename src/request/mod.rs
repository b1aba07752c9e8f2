
use serde::{Deserialize, Serialize};

use crate::{DiagError, Result};

/// Minimum informativeness length for the symptom description, in characters
pub const MIN_SYMPTOM_LEN: usize = 10;

/// Caller input for one diagnosis request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosisRequest {
    pub symptom: String,
    pub vehicle_info: String,
}

impl DiagnosisRequest {
    #[inline]
    pub fn new(symptom: String, vehicle_info: String) -> Self {
        Self {
            symptom,
            vehicle_info,
        }
    }

    /// Check required fields before the pipeline is invoked. All violations
    /// are collected and reported together.
    #[inline]
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        let symptom = self.symptom.trim();
        if symptom.is_empty() {
            errors.push("Symptom is required.".to_string());
        } else if symptom.chars().count() < MIN_SYMPTOM_LEN {
            errors.push(format!(
                "Symptom must be at least {} characters long.",
                MIN_SYMPTOM_LEN
            ));
        }

        if self.vehicle_info.trim().is_empty() {
            errors.push("Vehicle info is required.".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DiagError::Validation(errors.join(" ")))
        }
    }
}
