use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::profile::PatientId;

/// A single adherence observation expressed as a percentage (higher = better
/// adherence), stamped with when it was observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdherenceSample {
    pub percent: f64,
    pub observed_at: DateTime<Utc>,
}

/// A categorical observation (mood or financial status). Categories are
/// free-form strings matched against a fixed lookup table; unknown categories
/// normalize to the midpoint severity rather than erroring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryReport {
    pub category: String,
    pub observed_at: DateTime<Utc>,
}

/// Patient-reported side-effect severity on the clinical 1-5 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideEffectReport {
    pub severity: u8,
    pub observed_at: DateTime<Utc>,
}

/// Partial per-patient signal batch as delivered to `POST /api/v1/signals`.
/// Absent fields leave the corresponding factor untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalBatch {
    pub patient_id: PatientId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medication: Option<AdherenceSample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment: Option<AdherenceSample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub communication: Option<AdherenceSample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<CategoryReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub financial: Option<CategoryReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side_effect: Option<SideEffectReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missed_appointments: Option<u32>,
}

impl SignalBatch {
    pub fn empty(patient_id: PatientId) -> Self {
        Self {
            patient_id,
            medication: None,
            appointment: None,
            communication: None,
            mood: None,
            financial: None,
            side_effect: None,
            missed_appointments: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.medication.is_none()
            && self.appointment.is_none()
            && self.communication.is_none()
            && self.mood.is_none()
            && self.financial.is_none()
            && self.side_effect.is_none()
            && self.missed_appointments.is_none()
    }

    /// Reject the whole batch if any value is malformed. Ingestion is
    /// all-or-nothing: a rejected batch leaves every stored factor at its
    /// previous value, so partial data can never artificially lower risk.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }

        let adherence = [
            ("medication", &self.medication),
            ("appointment", &self.appointment),
            ("communication", &self.communication),
        ];
        for (metric, sample) in adherence {
            if let Some(sample) = sample {
                if !sample.percent.is_finite()
                    || sample.percent < 0.0
                    || sample.percent > 100.0
                {
                    return Err(ValidationError::PercentOutOfRange {
                        metric,
                        value: sample.percent,
                    });
                }
                if sample.observed_at > now {
                    return Err(ValidationError::FutureObservation { metric });
                }
            }
        }

        let categorical = [("mood", &self.mood), ("financial", &self.financial)];
        for (metric, report) in categorical {
            if let Some(report) = report {
                if report.observed_at > now {
                    return Err(ValidationError::FutureObservation { metric });
                }
            }
        }

        if let Some(report) = &self.side_effect {
            if !(1..=5).contains(&report.severity) {
                return Err(ValidationError::SideEffectSeverity(report.severity));
            }
            if report.observed_at > now {
                return Err(ValidationError::FutureObservation {
                    metric: "side_effect",
                });
            }
        }

        Ok(())
    }
}

/// Malformed or out-of-range signal input. Returned to the caller unchanged;
/// the caller must fix the input, retrying is pointless.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("signal batch contains no observations")]
    EmptyBatch,
    #[error("{metric} adherence {value} is outside 0-100")]
    PercentOutOfRange { metric: &'static str, value: f64 },
    #[error("side-effect severity {0} is outside the 1-5 scale")]
    SideEffectSeverity(u8),
    #[error("{metric} observation is timestamped in the future")]
    FutureObservation { metric: &'static str },
    #[error("achieved reduction {0} is outside 0-100")]
    ReductionOutOfRange(u8),
}
