use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for patients tracked by the engine. Identity itself is
/// owned by the external auth collaborator; the engine only keys on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatientId(pub String);

/// The six contributing risk factors, declared in attribution-priority order:
/// when two factors tie on weighted contribution, the earlier variant wins.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    Medication,
    Financial,
    Appointment,
    Emotional,
    SideEffect,
    Communication,
}

impl FactorKind {
    pub const ALL: [FactorKind; 6] = [
        FactorKind::Medication,
        FactorKind::Financial,
        FactorKind::Appointment,
        FactorKind::Emotional,
        FactorKind::SideEffect,
        FactorKind::Communication,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            FactorKind::Medication => "medication",
            FactorKind::Financial => "financial",
            FactorKind::Appointment => "appointment",
            FactorKind::Emotional => "emotional",
            FactorKind::SideEffect => "side_effect",
            FactorKind::Communication => "communication",
        }
    }
}

/// Midpoint severity assigned when a factor has never been observed, so an
/// unreported dimension reads as unknown risk rather than no risk.
pub const UNKNOWN_SEVERITY: u8 = 50;

/// Normalized contribution of a single factor to the composite score.
///
/// `raw_severity` is the 0-100 severity before staleness discounting;
/// `severity` is the value the scorer consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorScore {
    pub kind: FactorKind,
    pub raw_severity: u8,
    pub severity: u8,
    pub observed_at: Option<DateTime<Utc>>,
    pub staleness_days: i64,
}

impl FactorScore {
    pub fn unknown(kind: FactorKind) -> Self {
        Self {
            kind,
            raw_severity: UNKNOWN_SEVERITY,
            severity: UNKNOWN_SEVERITY,
            observed_at: None,
            staleness_days: 0,
        }
    }
}

/// Per-patient set of normalized factor scores. Always holds all six kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorSet {
    scores: BTreeMap<FactorKind, FactorScore>,
}

impl FactorSet {
    /// A set in which every factor is at the unknown midpoint.
    pub fn unknown() -> Self {
        let scores = FactorKind::ALL
            .into_iter()
            .map(|kind| (kind, FactorScore::unknown(kind)))
            .collect();
        Self { scores }
    }

    pub fn get(&self, kind: FactorKind) -> &FactorScore {
        self.scores
            .get(&kind)
            .expect("factor set holds all six kinds")
    }

    pub fn set(&mut self, score: FactorScore) {
        self.scores.insert(score.kind, score);
    }

    pub fn iter(&self) -> impl Iterator<Item = &FactorScore> {
        FactorKind::ALL.iter().map(|kind| self.get(*kind))
    }
}

/// Coarse risk bucket derived from the composite score through fixed,
/// monotonic cut points.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Moderate,
    High,
    Critical,
}

impl RiskTier {
    pub const fn from_score(score: u8) -> Self {
        match score {
            0..=39 => RiskTier::Low,
            40..=59 => RiskTier::Moderate,
            60..=79 => RiskTier::High,
            _ => RiskTier::Critical,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            RiskTier::Low => "low",
            RiskTier::Moderate => "moderate",
            RiskTier::High => "high",
            RiskTier::Critical => "critical",
        }
    }
}

/// One historical composite recomputation, kept for trend projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorePoint {
    pub score: u8,
    pub recorded_at: DateTime<Utc>,
}

/// Current dropout-risk assessment for one patient.
///
/// Mutated only by the risk scorer; superseded rather than deleted. The
/// weight-set version used to compute the score travels with the profile so
/// a later calibration never silently reinterprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRiskProfile {
    pub patient_id: PatientId,
    pub composite_score: u8,
    pub tier: RiskTier,
    pub primary_factor: FactorKind,
    pub factors: FactorSet,
    pub weights_version: u32,
    pub recomputed_at: DateTime<Utc>,
    pub history: Vec<ScorePoint>,
}
