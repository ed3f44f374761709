use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::profile::PatientId;
use crate::engine::recommend::domain::{InterventionType, RecommendationId};

/// One resolved intervention, as reported by staff once the intervention ran
/// its course. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub recommendation_id: RecommendationId,
    pub patient_id: PatientId,
    pub intervention: InterventionType,
    pub success: bool,
    pub achieved_reduction: u8,
    pub response_days: u32,
    pub recorded_at: DateTime<Utc>,
}

/// Per-intervention-type aggregate over all recorded outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionOutcome {
    pub intervention: InterventionType,
    pub attempted: u32,
    pub successful: u32,
    /// Mean achieved reduction over successful attempts only.
    pub average_reduction: f64,
    pub average_response_days: f64,
}

impl InterventionOutcome {
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        self.successful as f64 / self.attempted as f64
    }
}

/// Rolling model-quality metrics. Mutated only by the explicit calibration
/// step; `calibrated_at` doubles as the staleness indicator after a failed
/// run leaves the previous values in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub accuracy: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub false_positive_rate: f64,
    pub false_negative_rate: f64,
    pub total_predictions: u32,
    pub calibrated_at: Option<DateTime<Utc>>,
}

impl ModelMetrics {
    /// Placeholder before any calibration has run.
    pub fn initial() -> Self {
        Self {
            accuracy: 0.0,
            sensitivity: 0.0,
            specificity: 0.0,
            false_positive_rate: 0.0,
            false_negative_rate: 0.0,
            total_predictions: 0,
            calibrated_at: None,
        }
    }
}

/// Externally supplied dropout/retention label consumed by calibration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthLabel {
    pub patient_id: PatientId,
    pub dropped_out: bool,
}
