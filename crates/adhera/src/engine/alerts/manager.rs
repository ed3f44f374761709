use super::domain::{Alert, AlertId, AlertPriority, AlertType};
use crate::engine::profile::{FactorKind, PatientRiskProfile, RiskTier};
use crate::engine::settings::EngineSettings;
use crate::engine::signals::SignalBatch;

/// Outcome of evaluating the alert rules after a recomputation. The service
/// applies directives against the repository; the evaluator itself stays
/// pure so rule behavior is reproducible in isolation.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertDirective {
    Raise {
        alert_type: AlertType,
        priority: AlertPriority,
        message: String,
        action_required: bool,
    },
    Escalate {
        id: AlertId,
        priority: AlertPriority,
        message: String,
    },
}

struct Trigger {
    alert_type: AlertType,
    priority: AlertPriority,
    message: String,
    action_required: bool,
}

/// Evaluate the generation rules for one patient against the freshly scored
/// profile. `existing` must be re-read under the patient lock immediately
/// before this call so a just-dismissed alert is never resurrected.
pub fn evaluate_alerts(
    previous: Option<&PatientRiskProfile>,
    current: &PatientRiskProfile,
    batch: &SignalBatch,
    existing: &[Alert],
    settings: &EngineSettings,
) -> Vec<AlertDirective> {
    let mut triggers = Vec::new();

    let previous_tier = previous.map(|p| p.tier).unwrap_or(RiskTier::Low);
    if current.tier > previous_tier {
        triggers.push(Trigger {
            alert_type: AlertType::RiskIncrease,
            priority: AlertPriority::from_severity(current.composite_score),
            message: format!(
                "composite risk rose from {} to {} (score {})",
                previous_tier.label(),
                current.tier.label(),
                current.composite_score
            ),
            action_required: current.tier >= RiskTier::High,
        });
    }

    let appointment = current.factors.get(FactorKind::Appointment);
    let missed_limit_exceeded = batch
        .missed_appointments
        .map(|count| count > settings.missed_appointment_limit)
        .unwrap_or(false);
    if appointment.severity >= settings.appointment_alert_severity || missed_limit_exceeded {
        let mut priority = AlertPriority::from_severity(appointment.severity);
        if missed_limit_exceeded {
            priority = priority.max(AlertPriority::High);
        }
        let message = match batch.missed_appointments {
            Some(count) if missed_limit_exceeded => format!(
                "{count} missed appointments exceed the limit of {}",
                settings.missed_appointment_limit
            ),
            _ => format!(
                "appointment adherence severity at {}",
                appointment.severity
            ),
        };
        triggers.push(Trigger {
            alert_type: AlertType::MissedAppointments,
            priority,
            message,
            action_required: true,
        });
    }

    if let Some(report) = &batch.side_effect {
        if report.severity >= settings.side_effect_alert_report {
            triggers.push(Trigger {
                alert_type: AlertType::SevereSideEffect,
                priority: AlertPriority::from_severity(
                    current.factors.get(FactorKind::SideEffect).severity,
                ),
                message: format!("side-effect report at severity {} of 5", report.severity),
                action_required: true,
            });
        }
    }

    let emotional = current.factors.get(FactorKind::Emotional);
    if emotional.severity >= settings.emotional_alert_severity {
        triggers.push(Trigger {
            alert_type: AlertType::EmotionalDistress,
            priority: AlertPriority::from_severity(emotional.severity),
            message: format!("emotional severity at {}", emotional.severity),
            action_required: true,
        });
    }

    let financial = current.factors.get(FactorKind::Financial);
    if financial.severity >= settings.financial_alert_severity {
        triggers.push(Trigger {
            alert_type: AlertType::FinancialInstability,
            priority: AlertPriority::from_severity(financial.severity),
            message: format!("financial severity at {}", financial.severity),
            action_required: true,
        });
    }

    if let Some(previous) = previous {
        let improved = previous.composite_score.saturating_sub(current.composite_score);
        if current.tier < previous.tier && improved >= settings.milestone_improvement {
            triggers.push(Trigger {
                alert_type: AlertType::TreatmentMilestone,
                priority: AlertPriority::Low,
                message: format!(
                    "composite risk improved from {} to {} ({} points)",
                    previous.tier.label(),
                    current.tier.label(),
                    improved
                ),
                action_required: false,
            });
        }
    }

    let all_stale = current.factors.iter().all(|factor| {
        factor.observed_at.is_some() && factor.staleness_days >= settings.stale_alert_age_days
    });
    if all_stale {
        triggers.push(Trigger {
            alert_type: AlertType::System,
            priority: AlertPriority::Moderate,
            message: format!(
                "all signals older than {} days; risk is running on floored data",
                settings.stale_alert_age_days
            ),
            action_required: false,
        });
    }

    triggers
        .into_iter()
        .filter_map(|trigger| resolve(trigger, existing))
        .collect()
}

/// Deduplicate against active alerts: a re-trigger escalates the existing
/// alert of that type, and only when the new priority is strictly higher.
fn resolve(trigger: Trigger, existing: &[Alert]) -> Option<AlertDirective> {
    let active = existing
        .iter()
        .find(|alert| alert.alert_type == trigger.alert_type && !alert.state.is_terminal());

    match active {
        Some(alert) if trigger.priority > alert.priority => Some(AlertDirective::Escalate {
            id: alert.id.clone(),
            priority: trigger.priority,
            message: trigger.message,
        }),
        Some(_) => None,
        None => Some(AlertDirective::Raise {
            alert_type: trigger.alert_type,
            priority: trigger.priority,
            message: trigger.message,
            action_required: trigger.action_required,
        }),
    }
}
