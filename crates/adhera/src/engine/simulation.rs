use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::outcomes::domain::InterventionOutcome;
use super::profile::PatientRiskProfile;
use super::recommend::domain::InterventionType;
use super::recommend::engine::{predicted_effect, ranking_key};
use super::settings::EngineSettings;
use super::weights::WeightSet;

/// Trailing score deltas consulted for the no-intervention baseline.
const TREND_WINDOW: usize = 3;

pub const BASELINE_LABEL: &str = "No Intervention";

/// One what-if projection. Ephemeral: derived from a profile snapshot plus
/// intervention-effect parameters, never persisted, never mutating state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationScenario {
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intervention: Option<InterventionType>,
    pub current_risk: u8,
    pub projected_risk: u8,
    /// Negative for a worsening no-intervention baseline.
    pub risk_reduction: i16,
    pub confidence: u8,
    pub time_to_effect_days: u32,
}

/// Full simulation result: the baseline plus one scenario per requested
/// intervention, with the best non-baseline scenario called out for the
/// recommendation banner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub scenarios: Vec<SimulationScenario>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best: Option<InterventionType>,
}

/// Mean per-recomputation drift over the trailing score history. Positive
/// means risk is rising.
fn trailing_trend(profile: &PatientRiskProfile) -> f64 {
    let history = &profile.history;
    if history.len() < 2 {
        return 0.0;
    }

    let deltas: Vec<f64> = history
        .windows(2)
        .map(|pair| pair[1].score as f64 - pair[0].score as f64)
        .collect();
    let window = deltas.len().min(TREND_WINDOW);
    let recent = &deltas[deltas.len() - window..];
    recent.iter().sum::<f64>() / recent.len() as f64
}

fn baseline_scenario(profile: &PatientRiskProfile) -> SimulationScenario {
    let trend = trailing_trend(profile);
    let drift = trend.round() as i16;
    let (risk_reduction, projected) = if drift > 0 {
        let projected = (profile.composite_score as i16 + drift).clamp(0, 100) as u8;
        (-drift, projected)
    } else {
        (0, profile.composite_score)
    };

    SimulationScenario {
        label: BASELINE_LABEL.to_string(),
        intervention: None,
        current_risk: profile.composite_score,
        projected_risk: projected,
        risk_reduction,
        confidence: 100,
        time_to_effect_days: 0,
    }
}

/// Project the effect of the requested interventions on a profile snapshot.
/// Pure function of its inputs: identical snapshot and parameters yield
/// bit-identical scenarios, baseline included.
pub fn simulate(
    profile: &PatientRiskProfile,
    interventions: &[InterventionType],
    weights: &WeightSet,
    aggregates: &BTreeMap<InterventionType, InterventionOutcome>,
    settings: &EngineSettings,
) -> SimulationReport {
    let mut requested: Vec<InterventionType> = Vec::new();
    for intervention in interventions {
        if !requested.contains(intervention) {
            requested.push(*intervention);
        }
    }

    let mut projected: Vec<SimulationScenario> = requested
        .into_iter()
        .map(|intervention| {
            let candidate = predicted_effect(
                intervention,
                profile,
                weights,
                aggregates,
                settings.min_outcome_samples,
            );
            let reduction = candidate.predicted_reduction as i16;
            SimulationScenario {
                label: intervention.display_name().to_string(),
                intervention: Some(intervention),
                current_risk: profile.composite_score,
                projected_risk: (profile.composite_score as i16 - reduction).max(0) as u8,
                risk_reduction: reduction,
                confidence: candidate.confidence,
                time_to_effect_days: candidate.time_to_effect_days,
            }
        })
        .collect();

    projected.sort_by_key(|scenario| {
        ranking_key(
            scenario.risk_reduction,
            scenario.confidence,
            scenario.time_to_effect_days,
            scenario
                .intervention
                .expect("non-baseline scenarios carry an intervention"),
        )
    });

    let best = projected
        .first()
        .and_then(|scenario| scenario.intervention);

    let mut scenarios = Vec::with_capacity(projected.len() + 1);
    scenarios.push(baseline_scenario(profile));
    scenarios.extend(projected);

    SimulationReport { scenarios, best }
}
