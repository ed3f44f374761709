use std::cmp::Reverse;
use std::collections::BTreeMap;

use super::domain::InterventionType;
use crate::engine::alerts::AlertPriority;
use crate::engine::outcomes::domain::InterventionOutcome;
use crate::engine::profile::{FactorKind, PatientRiskProfile};
use crate::engine::settings::EngineSettings;
use crate::engine::weights::WeightSet;

const EFFECTIVENESS_FLOOR: f64 = 0.1;
const EFFECTIVENESS_CEILING: f64 = 0.9;

/// An unpersisted candidate produced by the generation pass. The service
/// turns accepted candidates into stored `Recommendation`s.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub intervention: InterventionType,
    pub source_factor: FactorKind,
    pub predicted_reduction: u8,
    pub confidence: u8,
    pub priority: AlertPriority,
    pub time_to_effect_days: u32,
}

/// Ranking key shared with the simulation engine: predicted reduction
/// descending, confidence descending, time-to-effect ascending, catalog
/// order as the deterministic last resort.
pub(crate) fn ranking_key(
    reduction: i16,
    confidence: u8,
    time_to_effect_days: u32,
    intervention: InterventionType,
) -> (Reverse<i16>, Reverse<u8>, u32, u8) {
    (
        Reverse(reduction),
        Reverse(confidence),
        time_to_effect_days,
        intervention.rank_index(),
    )
}

/// Effectiveness coefficient after outcome feedback: once an intervention
/// type has enough recorded attempts, its observed success rate scales the
/// base coefficient (a 50% success rate leaves it unchanged).
pub(crate) fn calibrated_effectiveness(
    intervention: InterventionType,
    aggregates: &BTreeMap<InterventionType, InterventionOutcome>,
    min_samples: u32,
) -> f64 {
    let base = intervention.effectiveness();
    match aggregates.get(&intervention) {
        Some(aggregate) if aggregate.attempted >= min_samples => {
            (base * (0.5 + aggregate.success_rate()))
                .clamp(EFFECTIVENESS_FLOOR, EFFECTIVENESS_CEILING)
        }
        _ => base,
    }
}

/// Confidence after outcome feedback: blends the catalog confidence with the
/// observed success rate once enough attempts exist.
pub(crate) fn calibrated_confidence(
    intervention: InterventionType,
    aggregates: &BTreeMap<InterventionType, InterventionOutcome>,
    min_samples: u32,
) -> u8 {
    let base = intervention.base_confidence();
    match aggregates.get(&intervention) {
        Some(aggregate) if aggregate.attempted >= min_samples => {
            let blended = (base as f64 + aggregate.success_rate() * 100.0) / 2.0;
            blended.round().clamp(0.0, 100.0) as u8
        }
        _ => base,
    }
}

/// Predicted absolute reduction of the composite score for one intervention
/// against one profile: the best weighted-severity payoff across the
/// intervention's source factors, scaled by its calibrated effectiveness.
pub(crate) fn predicted_effect(
    intervention: InterventionType,
    profile: &PatientRiskProfile,
    weights: &WeightSet,
    aggregates: &BTreeMap<InterventionType, InterventionOutcome>,
    min_samples: u32,
) -> Candidate {
    let effectiveness = calibrated_effectiveness(intervention, aggregates, min_samples);

    let mut source_factor = intervention.source_factors()[0];
    let mut best = 0.0_f64;
    for factor in intervention.source_factors() {
        let payoff =
            weights.weight(*factor) * profile.factors.get(*factor).severity as f64;
        if payoff > best {
            best = payoff;
            source_factor = *factor;
        }
    }

    let predicted_reduction = (best * effectiveness).round().clamp(0.0, 100.0) as u8;
    Candidate {
        intervention,
        source_factor,
        predicted_reduction,
        confidence: calibrated_confidence(intervention, aggregates, min_samples),
        priority: AlertPriority::from_severity(profile.factors.get(source_factor).severity),
        time_to_effect_days: intervention.time_to_effect_days(),
    }
}

/// Generate ranked candidates for a profile: the primary factor's menu plus
/// the menu of every factor at or above the secondary severity threshold,
/// deduplicated by intervention type.
pub fn candidates(
    profile: &PatientRiskProfile,
    weights: &WeightSet,
    aggregates: &BTreeMap<InterventionType, InterventionOutcome>,
    settings: &EngineSettings,
) -> Vec<Candidate> {
    let mut pool: Vec<InterventionType> = Vec::new();
    let mut push_menu = |factor: FactorKind| {
        for intervention in InterventionType::menu_for(factor) {
            if !pool.contains(intervention) {
                pool.push(*intervention);
            }
        }
    };

    push_menu(profile.primary_factor);
    for kind in FactorKind::ALL {
        if kind != profile.primary_factor
            && profile.factors.get(kind).severity >= settings.secondary_menu_severity
        {
            push_menu(kind);
        }
    }

    let mut ranked: Vec<Candidate> = pool
        .into_iter()
        .map(|intervention| {
            predicted_effect(
                intervention,
                profile,
                weights,
                aggregates,
                settings.min_outcome_samples,
            )
        })
        .collect();

    ranked.sort_by_key(|candidate| {
        ranking_key(
            candidate.predicted_reduction as i16,
            candidate.confidence,
            candidate.time_to_effect_days,
            candidate.intervention,
        )
    });
    ranked
}
