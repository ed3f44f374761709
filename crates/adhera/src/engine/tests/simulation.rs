use std::collections::BTreeMap;

use super::common::*;
use crate::engine::profile::ScorePoint;
use crate::engine::recommend::domain::InterventionType;
use crate::engine::simulation::{simulate, BASELINE_LABEL};
use crate::engine::weights::WeightSet;

#[test]
fn baseline_is_flat_when_risk_is_not_worsening() {
    let profile = profile_with("p-1", all_factors(50, 50, 50, 50, 50, 50));
    let report = simulate(
        &profile,
        &[InterventionType::NurseFollowUp],
        &WeightSet::defaults(),
        &BTreeMap::new(),
        &settings(),
    );

    let baseline = &report.scenarios[0];
    assert_eq!(baseline.label, BASELINE_LABEL);
    assert_eq!(baseline.intervention, None);
    assert_eq!(baseline.risk_reduction, 0);
    assert_eq!(baseline.projected_risk, profile.composite_score);
}

#[test]
fn baseline_goes_negative_on_a_worsening_trend() {
    let mut profile = profile_with("p-1", all_factors(50, 50, 50, 50, 50, 50));
    profile.composite_score = 48;
    profile.history = vec![
        ScorePoint {
            score: 40,
            recorded_at: days_ago(3),
        },
        ScorePoint {
            score: 44,
            recorded_at: days_ago(2),
        },
        ScorePoint {
            score: 48,
            recorded_at: days_ago(1),
        },
    ];

    let report = simulate(
        &profile,
        &[],
        &WeightSet::defaults(),
        &BTreeMap::new(),
        &settings(),
    );

    let baseline = &report.scenarios[0];
    assert_eq!(baseline.risk_reduction, -4);
    assert_eq!(baseline.projected_risk, 52);
    assert_eq!(report.best, None);
}

#[test]
fn projection_arithmetic_holds_and_stays_in_range() {
    let profile = profile_with("p-low", all_factors(40, 0, 0, 0, 0, 0));
    let report = simulate(
        &profile,
        &[InterventionType::DosageAdjustment],
        &WeightSet::defaults(),
        &BTreeMap::new(),
        &settings(),
    );

    let scenario = &report.scenarios[1];
    assert_eq!(
        scenario.projected_risk as i16,
        scenario.current_risk as i16 - scenario.risk_reduction
    );
    assert!(scenario.projected_risk <= 100);
}

#[test]
fn best_scenario_is_the_top_ranked_non_baseline() {
    let profile = profile_with("p-1", all_factors(90, 20, 20, 85, 10, 10));
    let report = simulate(
        &profile,
        &[
            InterventionType::NurseFollowUp,
            InterventionType::FinancialCounseling,
            InterventionType::DosageAdjustment,
        ],
        &WeightSet::defaults(),
        &BTreeMap::new(),
        &settings(),
    );

    // dosage: 22.5 * 0.55 = 12; financial counseling: 17 * 0.60 = 10;
    // nurse follow-up: 22.5 * 0.45 = 10 but slower than counseling? No:
    // follow-up is 3 days vs counseling 10, equal reduction 10, follow-up
    // confidence 80 beats counseling 75.
    assert_eq!(report.best, Some(InterventionType::DosageAdjustment));
    let ranked: Vec<_> = report.scenarios[1..]
        .iter()
        .map(|scenario| scenario.intervention)
        .collect();
    assert_eq!(
        ranked,
        vec![
            Some(InterventionType::DosageAdjustment),
            Some(InterventionType::NurseFollowUp),
            Some(InterventionType::FinancialCounseling),
        ]
    );
}

#[test]
fn repeated_simulation_is_bit_identical() {
    let mut profile = profile_with("p-1", all_factors(80, 60, 40, 70, 55, 45));
    profile.history = vec![
        ScorePoint {
            score: 55,
            recorded_at: days_ago(5),
        },
        ScorePoint {
            score: 61,
            recorded_at: days_ago(2),
        },
    ];
    let requested = [
        InterventionType::DosageAdjustment,
        InterventionType::FinancialCounseling,
        InterventionType::MentalHealthReferral,
    ];

    let first = simulate(
        &profile,
        &requested,
        &WeightSet::defaults(),
        &BTreeMap::new(),
        &settings(),
    );
    for _ in 0..5 {
        let again = simulate(
            &profile,
            &requested,
            &WeightSet::defaults(),
            &BTreeMap::new(),
            &settings(),
        );
        assert_eq!(again, first);
    }
}

#[test]
fn duplicate_requests_simulate_once() {
    let profile = profile_with("p-1", all_factors(70, 30, 30, 30, 30, 30));
    let report = simulate(
        &profile,
        &[
            InterventionType::NurseFollowUp,
            InterventionType::NurseFollowUp,
        ],
        &WeightSet::defaults(),
        &BTreeMap::new(),
        &settings(),
    );

    // baseline + one scenario
    assert_eq!(report.scenarios.len(), 2);
}

#[test]
fn simulation_through_the_service_does_not_mutate_state() {
    let (service, _repository, _feed) = build_service();
    service
        .ingest(high_risk_batch("p-sim"), now())
        .expect("ingest");

    let before = service.risk(&patient("p-sim")).expect("profile");
    let report = service
        .simulate(
            &patient("p-sim"),
            &[
                InterventionType::DosageAdjustment,
                InterventionType::FinancialCounseling,
            ],
        )
        .expect("simulate");
    assert!(report.scenarios.len() == 3);

    let after = service.risk(&patient("p-sim")).expect("profile");
    assert_eq!(after, before, "simulation must not touch stored state");
}
