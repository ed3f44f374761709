use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use super::domain::{GroundTruthLabel, InterventionOutcome, ModelMetrics, OutcomeRecord};
use crate::engine::profile::{FactorKind, PatientRiskProfile, RiskTier};
use crate::engine::recommend::domain::InterventionType;
use crate::engine::weights::WeightSet;

const NUDGE_FLOOR: f64 = 0.9;
const NUDGE_SPAN: f64 = 0.2;

/// Fold recorded outcomes into per-intervention aggregates. Pure over its
/// input, so repeated calls over the same records reflect each outcome
/// exactly once.
pub fn aggregate(records: &[OutcomeRecord]) -> Vec<InterventionOutcome> {
    let mut grouped: BTreeMap<u8, (InterventionType, u32, u32, u64, u64)> = BTreeMap::new();

    for record in records {
        let entry = grouped
            .entry(record.intervention.rank_index())
            .or_insert((record.intervention, 0, 0, 0, 0));
        entry.1 += 1;
        entry.4 += record.response_days as u64;
        if record.success {
            entry.2 += 1;
            entry.3 += record.achieved_reduction as u64;
        }
    }

    grouped
        .into_values()
        .map(
            |(intervention, attempted, successful, reduction_sum, response_sum)| {
                InterventionOutcome {
                    intervention,
                    attempted,
                    successful,
                    average_reduction: if successful == 0 {
                        0.0
                    } else {
                        reduction_sum as f64 / successful as f64
                    },
                    average_response_days: if attempted == 0 {
                        0.0
                    } else {
                        response_sum as f64 / attempted as f64
                    },
                }
            },
        )
        .collect()
}

/// Aggregates keyed by intervention type, the shape the recommendation and
/// simulation engines consume.
pub fn aggregate_by_type(
    records: &[OutcomeRecord],
) -> BTreeMap<InterventionType, InterventionOutcome> {
    aggregate(records)
        .into_iter()
        .map(|outcome| (outcome.intervention, outcome))
        .collect()
}

/// Result of one calibration run: fresh model-quality metrics and the next
/// weight-set version.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationReport {
    pub metrics: ModelMetrics,
    pub weights: WeightSet,
}

/// Missing or inconsistent ground truth; calibration aborts and the
/// last-known-good metrics and weights stay in place.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CalibrationError {
    #[error("ground truth batch is empty")]
    EmptyGroundTruth,
    #[error("ground truth references unknown patient {0}")]
    UnknownPatient(String),
    #[error("duplicate ground truth label for patient {0}")]
    DuplicateLabel(String),
}

fn rate(numerator: u32, denominator: u32) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    numerator as f64 / denominator as f64
}

/// Explicit batch calibration step. Compares predicted-high-risk patients
/// (tier high or critical) against the supplied dropout labels to produce a
/// confusion matrix, then derives the next weight version from per-factor
/// intervention success rates with a bounded, renormalized nudge.
pub fn calibrate(
    profiles: &[PatientRiskProfile],
    labels: &[GroundTruthLabel],
    records: &[OutcomeRecord],
    weights: &WeightSet,
    now: DateTime<Utc>,
) -> Result<CalibrationReport, CalibrationError> {
    if labels.is_empty() {
        return Err(CalibrationError::EmptyGroundTruth);
    }

    let by_patient: HashMap<_, _> = profiles
        .iter()
        .map(|profile| (&profile.patient_id, profile))
        .collect();

    let mut seen = Vec::with_capacity(labels.len());
    let mut true_positive = 0u32;
    let mut false_positive = 0u32;
    let mut true_negative = 0u32;
    let mut false_negative = 0u32;

    for label in labels {
        if seen.contains(&&label.patient_id) {
            return Err(CalibrationError::DuplicateLabel(label.patient_id.0.clone()));
        }
        seen.push(&label.patient_id);

        let profile = by_patient
            .get(&label.patient_id)
            .ok_or_else(|| CalibrationError::UnknownPatient(label.patient_id.0.clone()))?;
        let predicted_dropout = profile.tier >= RiskTier::High;

        match (predicted_dropout, label.dropped_out) {
            (true, true) => true_positive += 1,
            (true, false) => false_positive += 1,
            (false, false) => true_negative += 1,
            (false, true) => false_negative += 1,
        }
    }

    let total = labels.len() as u32;
    let metrics = ModelMetrics {
        accuracy: rate(true_positive + true_negative, total),
        sensitivity: rate(true_positive, true_positive + false_negative),
        specificity: rate(true_negative, true_negative + false_positive),
        false_positive_rate: rate(false_positive, false_positive + true_negative),
        false_negative_rate: rate(false_negative, false_negative + true_positive),
        total_predictions: total,
        calibrated_at: Some(now),
    };

    let weights = weights.rescaled(|kind| factor_nudge(kind, records));

    Ok(CalibrationReport { metrics, weights })
}

/// Per-factor multiplier from the success rate of interventions attributed
/// to that factor. No recorded outcomes leaves the weight untouched.
fn factor_nudge(kind: FactorKind, records: &[OutcomeRecord]) -> f64 {
    let mut attempted = 0u32;
    let mut successful = 0u32;
    for record in records {
        if record.intervention.source_factors()[0] == kind {
            attempted += 1;
            if record.success {
                successful += 1;
            }
        }
    }

    if attempted == 0 {
        return 1.0;
    }
    NUDGE_FLOOR + NUDGE_SPAN * rate(successful, attempted)
}
