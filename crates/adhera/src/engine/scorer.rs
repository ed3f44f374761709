use chrono::{DateTime, Utc};

use super::profile::{
    FactorKind, FactorSet, PatientId, PatientRiskProfile, RiskTier, ScorePoint,
};
use super::weights::WeightSet;

/// Stateless scorer combining normalized factor severities into one
/// composite 0-100 score under a versioned weight set.
pub struct RiskScorer {
    weights: WeightSet,
}

impl RiskScorer {
    pub fn new(weights: WeightSet) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &WeightSet {
        &self.weights
    }

    fn contribution(&self, factors: &FactorSet, kind: FactorKind) -> f64 {
        self.weights.weight(kind) * factors.get(kind).severity as f64
    }

    /// Weighted sum of the six severities, rounded to an integer score.
    pub fn composite(&self, factors: &FactorSet) -> u8 {
        let total: f64 = FactorKind::ALL
            .iter()
            .map(|kind| self.contribution(factors, *kind))
            .sum();
        total.round().clamp(0.0, 100.0) as u8
    }

    /// The single factor with the highest weighted contribution. Ties resolve
    /// by the fixed declaration order of `FactorKind::ALL`, so attribution is
    /// reproducible across runs.
    pub fn primary_factor(&self, factors: &FactorSet) -> FactorKind {
        let mut winner = FactorKind::ALL[0];
        let mut best = self.contribution(factors, winner);
        for kind in FactorKind::ALL.into_iter().skip(1) {
            let contribution = self.contribution(factors, kind);
            if contribution > best {
                best = contribution;
                winner = kind;
            }
        }
        winner
    }

    /// Produce the recomputed profile for a patient, appending the new score
    /// to the bounded trailing history.
    pub fn score(
        &self,
        patient_id: PatientId,
        factors: FactorSet,
        previous: Option<&PatientRiskProfile>,
        now: DateTime<Utc>,
        history_limit: usize,
    ) -> PatientRiskProfile {
        let composite_score = self.composite(&factors);
        let tier = RiskTier::from_score(composite_score);
        let primary_factor = self.primary_factor(&factors);

        let mut history = previous.map(|p| p.history.clone()).unwrap_or_default();
        history.push(ScorePoint {
            score: composite_score,
            recorded_at: now,
        });
        if history.len() > history_limit {
            let excess = history.len() - history_limit;
            history.drain(..excess);
        }

        PatientRiskProfile {
            patient_id,
            composite_score,
            tier,
            primary_factor,
            factors,
            weights_version: self.weights.version,
            recomputed_at: now,
            history,
        }
    }
}
