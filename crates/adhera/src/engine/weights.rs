use serde::{Deserialize, Serialize};

use super::profile::FactorKind;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Versioned scoring weights. Composite scores are a weighted sum of the six
/// factor severities, so the weights must sum to 1.0. Calibration produces a
/// new version; it never mutates an existing one in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightSet {
    pub version: u32,
    pub medication: f64,
    pub appointment: f64,
    pub communication: f64,
    pub financial: f64,
    pub emotional: f64,
    pub side_effect: f64,
}

impl WeightSet {
    /// Deployment defaults derived from domain priority.
    pub fn defaults() -> Self {
        Self {
            version: 1,
            medication: 0.25,
            appointment: 0.20,
            communication: 0.10,
            financial: 0.20,
            emotional: 0.15,
            side_effect: 0.10,
        }
    }

    pub fn weight(&self, kind: FactorKind) -> f64 {
        match kind {
            FactorKind::Medication => self.medication,
            FactorKind::Appointment => self.appointment,
            FactorKind::Communication => self.communication,
            FactorKind::Financial => self.financial,
            FactorKind::Emotional => self.emotional,
            FactorKind::SideEffect => self.side_effect,
        }
    }

    pub fn validate(&self) -> Result<(), WeightError> {
        for kind in FactorKind::ALL {
            if self.weight(kind) < 0.0 {
                return Err(WeightError::Negative(kind.label()));
            }
        }

        let sum: f64 = FactorKind::ALL.iter().map(|kind| self.weight(*kind)).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(WeightError::BadSum(sum));
        }

        Ok(())
    }

    /// Build the next weight version by applying per-factor multipliers and
    /// renormalizing so the set sums to 1.0 again.
    pub(crate) fn rescaled(&self, multiplier: impl Fn(FactorKind) -> f64) -> Self {
        let scaled: Vec<(FactorKind, f64)> = FactorKind::ALL
            .into_iter()
            .map(|kind| (kind, self.weight(kind) * multiplier(kind)))
            .collect();
        let total: f64 = scaled.iter().map(|(_, weight)| weight).sum();

        let mut next = self.clone();
        next.version = self.version + 1;
        for (kind, weight) in scaled {
            let normalized = weight / total;
            match kind {
                FactorKind::Medication => next.medication = normalized,
                FactorKind::Appointment => next.appointment = normalized,
                FactorKind::Communication => next.communication = normalized,
                FactorKind::Financial => next.financial = normalized,
                FactorKind::Emotional => next.emotional = normalized,
                FactorKind::SideEffect => next.side_effect = normalized,
            }
        }
        next
    }
}

/// Error raised for a weight set that cannot drive scoring.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum WeightError {
    #[error("factor weights sum to {0:.4}, expected 1.0")]
    BadSum(f64),
    #[error("factor weight for {0} is negative")]
    Negative(&'static str),
}
