use crate::infra::{default_engine_settings, InMemoryAlertFeed, InMemoryEngineRepository};
use adhera::engine::{
    AdherenceSample, CategoryReport, GroundTruthLabel, InterventionType, OutcomeRequest,
    PatientId, PatientRiskProfile, RiskEngineService, SideEffectReport, SignalBatch,
};
use adhera::error::AppError;
use chrono::{Duration, Utc};
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Patient identifier used for the synthetic scenario
    #[arg(long, default_value = "demo-patient")]
    pub(crate) patient_id: String,
    /// Skip the intervention/outcome/calibration portion of the demo
    #[arg(long)]
    pub(crate) skip_interventions: bool,
}

type DemoService = RiskEngineService<InMemoryEngineRepository, InMemoryAlertFeed>;

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        patient_id,
        skip_interventions,
    } = args;

    let repository = Arc::new(InMemoryEngineRepository::default());
    let feed = Arc::new(InMemoryAlertFeed::default());
    let service: DemoService =
        RiskEngineService::new(repository, feed.clone(), default_engine_settings());
    let patient = PatientId(patient_id);

    println!("Adherence risk engine demo");
    println!("Patient: {}", patient.0);

    // Three weekly signal batches showing a steady decline.
    let start = Utc::now() - Duration::days(14);
    let weeks = [
        (start, 85.0, 90.0, "stable", "stable", 1u8),
        (start + Duration::days(7), 60.0, 70.0, "anxious", "tight", 2),
        (
            start + Duration::days(14),
            25.0,
            40.0,
            "depressed",
            "behind_on_payments",
            4,
        ),
    ];

    let mut profile = None;
    for (at, medication, appointment, mood, financial, side_effect) in weeks {
        let batch = SignalBatch {
            patient_id: patient.clone(),
            medication: Some(AdherenceSample {
                percent: medication,
                observed_at: at,
            }),
            appointment: Some(AdherenceSample {
                percent: appointment,
                observed_at: at,
            }),
            communication: Some(AdherenceSample {
                percent: appointment,
                observed_at: at,
            }),
            mood: Some(CategoryReport {
                category: mood.to_string(),
                observed_at: at,
            }),
            financial: Some(CategoryReport {
                category: financial.to_string(),
                observed_at: at,
            }),
            side_effect: Some(SideEffectReport {
                severity: side_effect,
                observed_at: at,
            }),
            missed_appointments: None,
        };

        match service.ingest(batch, at) {
            Ok(scored) => {
                println!(
                    "- {} | score {} | tier {} | primary {}",
                    at.date_naive(),
                    scored.composite_score,
                    scored.tier.label(),
                    scored.primary_factor.label()
                );
                profile = Some(scored);
            }
            Err(err) => {
                println!("  Ingestion rejected: {err}");
                return Ok(());
            }
        }
    }

    let profile: PatientRiskProfile = match profile {
        Some(profile) => profile,
        None => return Ok(()),
    };

    println!("\nFactor breakdown");
    for factor in profile.factors.iter() {
        println!(
            "- {}: severity {} (raw {}, {} days old)",
            factor.kind.label(),
            factor.severity,
            factor.raw_severity,
            factor.staleness_days
        );
    }

    let alerts = match service.alerts(&patient, Default::default()) {
        Ok(alerts) => alerts,
        Err(err) => {
            println!("  Alerts unavailable: {err}");
            return Ok(());
        }
    };
    if alerts.is_empty() {
        println!("\nAlerts: none");
    } else {
        println!("\nAlerts");
        for alert in &alerts {
            println!(
                "- [{}] {} ({}): {}",
                alert.priority.label(),
                alert.alert_type.label(),
                alert.state.label(),
                alert.message
            );
        }
    }

    let recommendations = match service.recommendations(&patient) {
        Ok(recommendations) => recommendations,
        Err(err) => {
            println!("  Recommendations unavailable: {err}");
            return Ok(());
        }
    };
    println!("\nRanked recommendations");
    for rec in &recommendations {
        println!(
            "- {} | -{} pts | {}% confidence | {} days to effect",
            rec.intervention.display_name(),
            rec.predicted_reduction,
            rec.confidence,
            rec.time_to_effect_days
        );
    }

    let interventions: Vec<InterventionType> = recommendations
        .iter()
        .take(3)
        .map(|rec| rec.intervention)
        .collect();
    match service.simulate(&patient, &interventions) {
        Ok(report) => {
            println!("\nWhat-if scenarios");
            for scenario in &report.scenarios {
                println!(
                    "- {}: {} -> {} ({} pts, {}% confidence)",
                    scenario.label,
                    scenario.current_risk,
                    scenario.projected_risk,
                    scenario.risk_reduction,
                    scenario.confidence
                );
            }
            if let Some(best) = report.best {
                println!("Recommended next step: {}", best.display_name());
            }
        }
        Err(err) => println!("  Simulation unavailable: {err}"),
    }

    if skip_interventions {
        return Ok(());
    }

    let Some(top) = recommendations.first() else {
        return Ok(());
    };
    if service.accept_recommendation(&top.id).is_err() {
        return Ok(());
    }
    println!("\nAccepted {}", top.intervention.display_name());

    let resolved_at = Utc::now() + Duration::days(14);
    if let Err(err) = service.record_outcome(
        OutcomeRequest {
            recommendation_id: top.id.clone(),
            success: true,
            achieved_reduction: top.predicted_reduction,
            response_days: 6,
        },
        resolved_at,
    ) {
        println!("  Outcome recording failed: {err}");
        return Ok(());
    }
    println!(
        "Recorded successful outcome (-{} pts after 6 days)",
        top.predicted_reduction
    );

    match service.calibrate(
        &[GroundTruthLabel {
            patient_id: patient.clone(),
            dropped_out: false,
        }],
        resolved_at,
    ) {
        Ok(metrics) => {
            println!("\nCalibration");
            println!(
                "- accuracy {:.2} | sensitivity {:.2} | specificity {:.2}",
                metrics.accuracy, metrics.sensitivity, metrics.specificity
            );
            println!(
                "- false positives {:.2} | false negatives {:.2} over {} predictions",
                metrics.false_positive_rate,
                metrics.false_negative_rate,
                metrics.total_predictions
            );
        }
        Err(err) => println!("  Calibration unavailable: {err}"),
    }

    let events = feed.events();
    println!("\nNotifier feed received {} event(s)", events.len());

    Ok(())
}
