use chrono::{DateTime, Utc};

use super::profile::{FactorKind, FactorScore, FactorSet, UNKNOWN_SEVERITY};
use super::signals::{SignalBatch, ValidationError};

const FULL_WEIGHT_AGE_DAYS: i64 = 7;
const FLOOR_AGE_DAYS: i64 = 30;
const DECAY_FLOOR: f64 = 0.5;

/// Staleness multiplier for adherence-derived severities: full weight for a
/// week, linear down to the floor at thirty days, floored after that. Stale
/// data still counts, just less.
pub(crate) fn staleness_decay(age_days: i64) -> f64 {
    if age_days <= FULL_WEIGHT_AGE_DAYS {
        1.0
    } else if age_days >= FLOOR_AGE_DAYS {
        DECAY_FLOOR
    } else {
        let span = (FLOOR_AGE_DAYS - FULL_WEIGHT_AGE_DAYS) as f64;
        1.0 - (1.0 - DECAY_FLOOR) * ((age_days - FULL_WEIGHT_AGE_DAYS) as f64 / span)
    }
}

/// Fixed mood-category severity table. Unknown categories read as the
/// midpoint so an unrecognized entry never zeroes out emotional risk.
fn mood_severity(category: &str) -> u8 {
    match category.trim().to_ascii_lowercase().as_str() {
        "stable" => 10,
        "hopeful" => 15,
        "tired" => 40,
        "anxious" => 55,
        "overwhelmed" => 70,
        "depressed" => 85,
        "hopeless" => 95,
        _ => UNKNOWN_SEVERITY,
    }
}

/// Fixed financial-status severity table, same midpoint rule.
fn financial_severity(category: &str) -> u8 {
    match category.trim().to_ascii_lowercase().as_str() {
        "stable" => 5,
        "tight" => 40,
        "assistance_requested" => 55,
        "behind_on_payments" => 65,
        "insurance_lapsed" => 75,
        "crisis" => 90,
        _ => UNKNOWN_SEVERITY,
    }
}

/// Side-effect scale 1-5 mapped onto the 0-100 severity axis. Callers
/// validate the range before reaching this table.
pub(crate) fn side_effect_severity(report: u8) -> u8 {
    match report {
        1 => 15,
        2 => 35,
        3 => 55,
        4 => 80,
        _ => 100,
    }
}

fn age_days(observed_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - observed_at).num_days().max(0)
}

fn adherence_factor(
    kind: FactorKind,
    percent: f64,
    observed_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> FactorScore {
    let raw_severity = (100.0 - percent).round().clamp(0.0, 100.0) as u8;
    let age = age_days(observed_at, now);
    let severity = (raw_severity as f64 * staleness_decay(age)).round() as u8;
    FactorScore {
        kind,
        raw_severity,
        severity,
        observed_at: Some(observed_at),
        staleness_days: age,
    }
}

fn categorical_factor(
    kind: FactorKind,
    raw_severity: u8,
    observed_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> FactorScore {
    FactorScore {
        kind,
        raw_severity,
        severity: raw_severity,
        observed_at: Some(observed_at),
        staleness_days: age_days(observed_at, now),
    }
}

/// Refresh a carried-over factor against the current clock: adherence
/// severities re-decay as their observation ages, categorical severities keep
/// their value but track staleness.
fn refreshed(previous: &FactorScore, now: DateTime<Utc>) -> FactorScore {
    match previous.observed_at {
        Some(observed_at) => {
            let age = age_days(observed_at, now);
            let severity = match previous.kind {
                FactorKind::Medication | FactorKind::Appointment | FactorKind::Communication => {
                    (previous.raw_severity as f64 * staleness_decay(age)).round() as u8
                }
                _ => previous.raw_severity,
            };
            FactorScore {
                kind: previous.kind,
                raw_severity: previous.raw_severity,
                severity,
                observed_at: Some(observed_at),
                staleness_days: age,
            }
        }
        None => previous.clone(),
    }
}

/// Normalize a validated signal batch against the previously stored factor
/// set. Factors absent from the batch are carried over and re-aged.
pub fn normalize(
    batch: &SignalBatch,
    previous: &FactorSet,
    now: DateTime<Utc>,
) -> Result<FactorSet, ValidationError> {
    batch.validate(now)?;

    let mut factors = FactorSet::unknown();
    for kind in FactorKind::ALL {
        factors.set(refreshed(previous.get(kind), now));
    }

    if let Some(sample) = &batch.medication {
        factors.set(adherence_factor(
            FactorKind::Medication,
            sample.percent,
            sample.observed_at,
            now,
        ));
    }
    if let Some(sample) = &batch.appointment {
        factors.set(adherence_factor(
            FactorKind::Appointment,
            sample.percent,
            sample.observed_at,
            now,
        ));
    }
    if let Some(sample) = &batch.communication {
        factors.set(adherence_factor(
            FactorKind::Communication,
            sample.percent,
            sample.observed_at,
            now,
        ));
    }
    if let Some(report) = &batch.mood {
        factors.set(categorical_factor(
            FactorKind::Emotional,
            mood_severity(&report.category),
            report.observed_at,
            now,
        ));
    }
    if let Some(report) = &batch.financial {
        factors.set(categorical_factor(
            FactorKind::Financial,
            financial_severity(&report.category),
            report.observed_at,
            now,
        ));
    }
    if let Some(report) = &batch.side_effect {
        factors.set(categorical_factor(
            FactorKind::SideEffect,
            side_effect_severity(report.severity),
            report.observed_at,
            now,
        ));
    }

    Ok(factors)
}
