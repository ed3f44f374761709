use super::common::*;
use crate::engine::outcomes::domain::{GroundTruthLabel, OutcomeRecord};
use crate::engine::outcomes::tracker::{aggregate, calibrate, CalibrationError};
use crate::engine::recommend::domain::{InterventionType, RecommendationId};
use crate::engine::service::{EngineServiceError, OutcomeRequest};
use crate::engine::signals::ValidationError;
use crate::engine::weights::WeightSet;

fn record(
    id: &str,
    intervention: InterventionType,
    success: bool,
    reduction: u8,
    response_days: u32,
) -> OutcomeRecord {
    OutcomeRecord {
        recommendation_id: RecommendationId(id.to_string()),
        patient_id: patient("p-1"),
        intervention,
        success,
        achieved_reduction: reduction,
        response_days,
        recorded_at: now(),
    }
}

#[test]
fn aggregate_groups_by_intervention_type() {
    let records = vec![
        record("r-1", InterventionType::NurseFollowUp, true, 10, 3),
        record("r-2", InterventionType::NurseFollowUp, false, 0, 9),
        record("r-3", InterventionType::NurseFollowUp, true, 14, 4),
        record("r-4", InterventionType::FinancialCounseling, true, 20, 12),
    ];

    let aggregates = aggregate(&records);
    assert_eq!(aggregates.len(), 2);

    let follow_up = aggregates
        .iter()
        .find(|a| a.intervention == InterventionType::NurseFollowUp)
        .expect("follow-up aggregate");
    assert_eq!(follow_up.attempted, 3);
    assert_eq!(follow_up.successful, 2);
    // Average reduction counts successful attempts only: (10 + 14) / 2.
    assert!((follow_up.average_reduction - 12.0).abs() < 1e-9);
    assert!((follow_up.average_response_days - (3.0 + 9.0 + 4.0) / 3.0).abs() < 1e-9);

    let counseling = aggregates
        .iter()
        .find(|a| a.intervention == InterventionType::FinancialCounseling)
        .expect("counseling aggregate");
    assert_eq!(counseling.attempted, 1);
    assert!((counseling.success_rate() - 1.0).abs() < 1e-9);
}

#[test]
fn aggregation_is_idempotent_over_the_same_records() {
    let records = vec![
        record("r-1", InterventionType::PaymentPlan, true, 9, 6),
        record("r-2", InterventionType::PaymentPlan, true, 11, 2),
    ];

    let first = aggregate(&records);
    let second = aggregate(&records);
    assert_eq!(first, second);
    assert_eq!(first[0].attempted, 2, "no double counting");
}

#[test]
fn calibration_computes_the_confusion_matrix() {
    // Two true positives, one false positive, two true negatives, one false
    // negative.
    let profiles = vec![
        profile_with("p-tp1", all_factors(90, 70, 60, 80, 70, 60)),
        profile_with("p-tp2", all_factors(90, 80, 70, 90, 80, 70)),
        profile_with("p-fp", all_factors(90, 70, 60, 80, 70, 60)),
        profile_with("p-tn1", all_factors(10, 10, 10, 10, 10, 10)),
        profile_with("p-tn2", all_factors(20, 10, 10, 10, 10, 10)),
        profile_with("p-fn", all_factors(30, 30, 30, 30, 30, 30)),
    ];
    let labels = vec![
        GroundTruthLabel {
            patient_id: patient("p-tp1"),
            dropped_out: true,
        },
        GroundTruthLabel {
            patient_id: patient("p-tp2"),
            dropped_out: true,
        },
        GroundTruthLabel {
            patient_id: patient("p-fp"),
            dropped_out: false,
        },
        GroundTruthLabel {
            patient_id: patient("p-tn1"),
            dropped_out: false,
        },
        GroundTruthLabel {
            patient_id: patient("p-tn2"),
            dropped_out: false,
        },
        GroundTruthLabel {
            patient_id: patient("p-fn"),
            dropped_out: true,
        },
    ];

    let report = calibrate(&profiles, &labels, &[], &WeightSet::defaults(), now())
        .expect("calibration succeeds");
    let metrics = report.metrics;

    assert_eq!(metrics.total_predictions, 6);
    assert!((metrics.accuracy - 4.0 / 6.0).abs() < 1e-9);
    assert!((metrics.sensitivity - 2.0 / 3.0).abs() < 1e-9);
    assert!((metrics.specificity - 2.0 / 3.0).abs() < 1e-9);
    assert!((metrics.false_positive_rate - 1.0 / 3.0).abs() < 1e-9);
    assert!((metrics.false_negative_rate - 1.0 / 3.0).abs() < 1e-9);
    assert_eq!(metrics.calibrated_at, Some(now()));
}

#[test]
fn calibration_nudges_weights_from_factor_success_rates() {
    let profiles = vec![profile_with("p-1", all_factors(90, 70, 60, 80, 70, 60))];
    let labels = vec![GroundTruthLabel {
        patient_id: patient("p-1"),
        dropped_out: true,
    }];
    // Financial interventions all succeeded; medication interventions all
    // failed. Financial weight should gain relative ground.
    let records = vec![
        record("r-1", InterventionType::FinancialCounseling, true, 15, 6),
        record("r-2", InterventionType::PaymentPlan, true, 10, 4),
        record("r-3", InterventionType::DosageAdjustment, false, 0, 9),
    ];

    let base = WeightSet::defaults();
    let report =
        calibrate(&profiles, &labels, &records, &base, now()).expect("calibration succeeds");

    assert_eq!(report.weights.version, base.version + 1);
    report.weights.validate().expect("weights renormalized");
    assert!(report.weights.financial > base.financial);
    assert!(report.weights.medication < base.medication);
}

#[test]
fn calibration_rejects_bad_ground_truth() {
    let profiles = vec![profile_with("p-1", all_factors(50, 50, 50, 50, 50, 50))];

    assert_eq!(
        calibrate(&profiles, &[], &[], &WeightSet::defaults(), now()),
        Err(CalibrationError::EmptyGroundTruth)
    );

    let unknown = vec![GroundTruthLabel {
        patient_id: patient("p-ghost"),
        dropped_out: true,
    }];
    assert_eq!(
        calibrate(&profiles, &unknown, &[], &WeightSet::defaults(), now()),
        Err(CalibrationError::UnknownPatient("p-ghost".to_string()))
    );

    let duplicated = vec![
        GroundTruthLabel {
            patient_id: patient("p-1"),
            dropped_out: true,
        },
        GroundTruthLabel {
            patient_id: patient("p-1"),
            dropped_out: false,
        },
    ];
    assert_eq!(
        calibrate(&profiles, &duplicated, &[], &WeightSet::defaults(), now()),
        Err(CalibrationError::DuplicateLabel("p-1".to_string()))
    );
}

#[test]
fn outcome_requires_an_accepted_recommendation() {
    let (service, _repository, _feed) = build_service();
    service
        .ingest(high_risk_batch("p-out"), now())
        .expect("ingest");

    let recs = service
        .recommendations(&patient("p-out"))
        .expect("recommendations");
    let pending = &recs[0];

    match service.record_outcome(
        OutcomeRequest {
            recommendation_id: pending.id.clone(),
            success: true,
            achieved_reduction: 10,
            response_days: 4,
        },
        now(),
    ) {
        Err(EngineServiceError::RecommendationTransition(_)) => {}
        other => panic!("expected transition rejection, got {other:?}"),
    }
}

#[test]
fn duplicate_outcomes_for_one_recommendation_are_rejected() {
    let (service, _repository, _feed) = build_service();
    service
        .ingest(high_risk_batch("p-dup"), now())
        .expect("ingest");

    let recs = service
        .recommendations(&patient("p-dup"))
        .expect("recommendations");
    let target = recs[0].clone();
    service.accept_recommendation(&target.id).expect("accept");

    let request = OutcomeRequest {
        recommendation_id: target.id.clone(),
        success: true,
        achieved_reduction: 12,
        response_days: 6,
    };
    service
        .record_outcome(request.clone(), now())
        .expect("first outcome");

    match service.record_outcome(request, now()) {
        Err(EngineServiceError::RecommendationTransition(_)) => {}
        other => panic!("expected duplicate rejection, got {other:?}"),
    }

    // Aggregation still reflects the outcome exactly once.
    let summary = service.outcome_summary().expect("summary");
    let aggregate = summary
        .iter()
        .find(|a| a.intervention == target.intervention)
        .expect("aggregate present");
    assert_eq!(aggregate.attempted, 1);
}

#[test]
fn out_of_range_reduction_is_a_validation_error() {
    let (service, _repository, _feed) = build_service();
    service
        .ingest(high_risk_batch("p-range"), now())
        .expect("ingest");

    let recs = service
        .recommendations(&patient("p-range"))
        .expect("recommendations");
    let target = recs[0].clone();
    service.accept_recommendation(&target.id).expect("accept");

    match service.record_outcome(
        OutcomeRequest {
            recommendation_id: target.id,
            success: true,
            achieved_reduction: 120,
            response_days: 2,
        },
        now(),
    ) {
        Err(EngineServiceError::Validation(ValidationError::ReductionOutOfRange(120))) => {}
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn failed_calibration_leaves_last_known_metrics_and_weights() {
    let (service, _repository, _feed) = build_service();
    service
        .ingest(high_risk_batch("p-cal"), now())
        .expect("ingest");

    let labels = vec![GroundTruthLabel {
        patient_id: patient("p-cal"),
        dropped_out: true,
    }];
    let first = service.calibrate(&labels, now()).expect("first calibration");
    assert_eq!(first.total_predictions, 1);

    let bad = vec![GroundTruthLabel {
        patient_id: patient("p-ghost"),
        dropped_out: false,
    }];
    service
        .calibrate(&bad, now())
        .expect_err("unknown patient must fail");

    let current = service.model_metrics().expect("metrics");
    assert_eq!(current, first, "failed run must not clobber metrics");
}

#[test]
fn calibrated_weights_version_flows_into_new_profiles() {
    let (service, _repository, _feed) = build_service();
    service
        .ingest(high_risk_batch("p-flow"), now())
        .expect("ingest");
    let before = service.risk(&patient("p-flow")).expect("profile");
    assert_eq!(before.weights_version, 1);

    let labels = vec![GroundTruthLabel {
        patient_id: patient("p-flow"),
        dropped_out: true,
    }];
    service.calibrate(&labels, now()).expect("calibration");

    let after = service
        .ingest(low_risk_batch("p-flow"), now() + chrono::Duration::days(1))
        .expect("re-ingest");
    assert_eq!(after.weights_version, 2);
    // The superseded profile kept the version it was computed with.
    assert_eq!(before.weights_version, 1);
}
