use std::time::Duration;

use super::weights::WeightSet;

/// Engine tuning assembled by the deploying binary and passed in explicitly.
/// Tier cut points are fixed by contract and intentionally not configurable.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Weight set used until the first calibration stores a newer version.
    pub weights: WeightSet,
    /// Appointment factor severity at or above which a missed-appointments
    /// alert is raised.
    pub appointment_alert_severity: u8,
    /// Emotional factor severity at or above which a distress alert is raised.
    pub emotional_alert_severity: u8,
    /// Financial factor severity at or above which an instability alert is
    /// raised.
    pub financial_alert_severity: u8,
    /// Raw 1-5 side-effect report at or above which a severe-side-effect
    /// alert is raised.
    pub side_effect_alert_report: u8,
    /// Missed-appointment count above which the business rule fires.
    pub missed_appointment_limit: u32,
    /// Composite improvement (points, across a tier boundary) that earns a
    /// treatment-milestone alert.
    pub milestone_improvement: u8,
    /// Age in days past which every factor counts as fully stale for the
    /// housekeeping alert.
    pub stale_alert_age_days: i64,
    /// Factor severity at or above which that factor's intervention menu
    /// joins the candidate pool alongside the primary factor's menu.
    pub secondary_menu_severity: u8,
    /// Recorded attempts required before outcome aggregates start adjusting
    /// intervention effectiveness and confidence.
    pub min_outcome_samples: u32,
    /// Bounded wait for the per-patient lock before surfacing contention.
    pub lock_wait: Duration,
    /// Trailing composite scores retained per profile for trend projection.
    pub history_limit: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            weights: WeightSet::defaults(),
            appointment_alert_severity: 80,
            emotional_alert_severity: 80,
            financial_alert_severity: 75,
            side_effect_alert_report: 4,
            missed_appointment_limit: 3,
            milestone_improvement: 15,
            stale_alert_age_days: 30,
            secondary_menu_severity: 60,
            min_outcome_samples: 3,
            lock_wait: Duration::from_millis(250),
            history_limit: 12,
        }
    }
}
