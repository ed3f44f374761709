use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::engine::alerts::{Alert, AlertId};
use crate::engine::outcomes::domain::{ModelMetrics, OutcomeRecord};
use crate::engine::profile::{
    FactorKind, FactorScore, FactorSet, PatientId, PatientRiskProfile,
};
use crate::engine::recommend::domain::{Recommendation, RecommendationId};
use crate::engine::repository::{
    AlertFeed, AlertNotification, EngineRepository, FeedError, RepositoryError,
};
use crate::engine::scorer::RiskScorer;
use crate::engine::service::RiskEngineService;
use crate::engine::settings::EngineSettings;
use crate::engine::signals::{
    AdherenceSample, CategoryReport, SideEffectReport, SignalBatch,
};
use crate::engine::weights::WeightSet;

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn days_ago(days: i64) -> DateTime<Utc> {
    now() - chrono::Duration::days(days)
}

pub(super) fn settings() -> EngineSettings {
    EngineSettings {
        lock_wait: Duration::from_millis(50),
        ..EngineSettings::default()
    }
}

pub(super) fn patient(id: &str) -> PatientId {
    PatientId(id.to_string())
}

pub(super) fn adherence(percent: f64, observed_at: DateTime<Utc>) -> AdherenceSample {
    AdherenceSample {
        percent,
        observed_at,
    }
}

pub(super) fn category(value: &str, observed_at: DateTime<Utc>) -> CategoryReport {
    CategoryReport {
        category: value.to_string(),
        observed_at,
    }
}

pub(super) fn side_effect(severity: u8, observed_at: DateTime<Utc>) -> SideEffectReport {
    SideEffectReport {
        severity,
        observed_at,
    }
}

/// Fresh batch normalizing to severities 90/80/70/90/85/80 (medication,
/// appointment, communication, financial, emotional, side-effect):
/// composite 84, tier critical.
pub(super) fn high_risk_batch(id: &str) -> SignalBatch {
    SignalBatch {
        patient_id: patient(id),
        medication: Some(adherence(10.0, now())),
        appointment: Some(adherence(20.0, now())),
        communication: Some(adherence(30.0, now())),
        mood: Some(category("depressed", now())),
        financial: Some(category("crisis", now())),
        side_effect: Some(side_effect(4, now())),
        missed_appointments: None,
    }
}

/// Fresh batch normalizing to severities 5/5/10/5/10/15: composite 7, low.
pub(super) fn low_risk_batch(id: &str) -> SignalBatch {
    SignalBatch {
        patient_id: patient(id),
        medication: Some(adherence(95.0, now())),
        appointment: Some(adherence(95.0, now())),
        communication: Some(adherence(90.0, now())),
        mood: Some(category("stable", now())),
        financial: Some(category("stable", now())),
        side_effect: Some(side_effect(1, now())),
        missed_appointments: None,
    }
}

/// Factor set with explicit severities, everything else untouched at the
/// unknown midpoint.
pub(super) fn factor_set(severities: &[(FactorKind, u8)]) -> FactorSet {
    let mut factors = FactorSet::unknown();
    for (kind, severity) in severities {
        factors.set(FactorScore {
            kind: *kind,
            raw_severity: *severity,
            severity: *severity,
            observed_at: Some(now()),
            staleness_days: 0,
        });
    }
    factors
}

pub(super) fn all_factors(
    medication: u8,
    appointment: u8,
    communication: u8,
    financial: u8,
    emotional: u8,
    side_effect: u8,
) -> FactorSet {
    factor_set(&[
        (FactorKind::Medication, medication),
        (FactorKind::Appointment, appointment),
        (FactorKind::Communication, communication),
        (FactorKind::Financial, financial),
        (FactorKind::Emotional, emotional),
        (FactorKind::SideEffect, side_effect),
    ])
}

pub(super) fn profile_with(id: &str, factors: FactorSet) -> PatientRiskProfile {
    let scorer = RiskScorer::new(WeightSet::defaults());
    scorer.score(patient(id), factors, None, now(), 12)
}

pub(super) fn build_service() -> (
    RiskEngineService<MemoryRepository, MemoryFeed>,
    Arc<MemoryRepository>,
    Arc<MemoryFeed>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let feed = Arc::new(MemoryFeed::default());
    let service = RiskEngineService::new(repository.clone(), feed.clone(), settings());
    (service, repository, feed)
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    profiles: Arc<Mutex<HashMap<PatientId, PatientRiskProfile>>>,
    alerts: Arc<Mutex<HashMap<AlertId, Alert>>>,
    recommendations: Arc<Mutex<HashMap<RecommendationId, Recommendation>>>,
    outcomes: Arc<Mutex<Vec<OutcomeRecord>>>,
    weights: Arc<Mutex<Option<WeightSet>>>,
    metrics: Arc<Mutex<Option<ModelMetrics>>>,
}

impl EngineRepository for MemoryRepository {
    fn upsert_profile(&self, profile: PatientRiskProfile) -> Result<(), RepositoryError> {
        let mut guard = self.profiles.lock().expect("profile mutex poisoned");
        guard.insert(profile.patient_id.clone(), profile);
        Ok(())
    }

    fn fetch_profile(
        &self,
        id: &PatientId,
    ) -> Result<Option<PatientRiskProfile>, RepositoryError> {
        let guard = self.profiles.lock().expect("profile mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn profiles(&self) -> Result<Vec<PatientRiskProfile>, RepositoryError> {
        let guard = self.profiles.lock().expect("profile mutex poisoned");
        let mut profiles: Vec<_> = guard.values().cloned().collect();
        profiles.sort_by(|a, b| a.patient_id.cmp(&b.patient_id));
        Ok(profiles)
    }

    fn insert_alert(&self, alert: Alert) -> Result<(), RepositoryError> {
        let mut guard = self.alerts.lock().expect("alert mutex poisoned");
        if guard.contains_key(&alert.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(alert.id.clone(), alert);
        Ok(())
    }

    fn update_alert(&self, alert: Alert) -> Result<(), RepositoryError> {
        let mut guard = self.alerts.lock().expect("alert mutex poisoned");
        if !guard.contains_key(&alert.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(alert.id.clone(), alert);
        Ok(())
    }

    fn fetch_alert(&self, id: &AlertId) -> Result<Option<Alert>, RepositoryError> {
        let guard = self.alerts.lock().expect("alert mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn alerts_for(&self, patient: &PatientId) -> Result<Vec<Alert>, RepositoryError> {
        let guard = self.alerts.lock().expect("alert mutex poisoned");
        let mut alerts: Vec<_> = guard
            .values()
            .filter(|alert| &alert.patient_id == patient)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(alerts)
    }

    fn insert_recommendation(&self, rec: Recommendation) -> Result<(), RepositoryError> {
        let mut guard = self
            .recommendations
            .lock()
            .expect("recommendation mutex poisoned");
        if guard.contains_key(&rec.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(rec.id.clone(), rec);
        Ok(())
    }

    fn update_recommendation(&self, rec: Recommendation) -> Result<(), RepositoryError> {
        let mut guard = self
            .recommendations
            .lock()
            .expect("recommendation mutex poisoned");
        if !guard.contains_key(&rec.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(rec.id.clone(), rec);
        Ok(())
    }

    fn fetch_recommendation(
        &self,
        id: &RecommendationId,
    ) -> Result<Option<Recommendation>, RepositoryError> {
        let guard = self
            .recommendations
            .lock()
            .expect("recommendation mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn recommendations_for(
        &self,
        patient: &PatientId,
    ) -> Result<Vec<Recommendation>, RepositoryError> {
        let guard = self
            .recommendations
            .lock()
            .expect("recommendation mutex poisoned");
        let mut recs: Vec<_> = guard
            .values()
            .filter(|rec| &rec.patient_id == patient)
            .cloned()
            .collect();
        recs.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(recs)
    }

    fn append_outcome(&self, outcome: OutcomeRecord) -> Result<(), RepositoryError> {
        let mut guard = self.outcomes.lock().expect("outcome mutex poisoned");
        guard.push(outcome);
        Ok(())
    }

    fn outcomes(&self) -> Result<Vec<OutcomeRecord>, RepositoryError> {
        let guard = self.outcomes.lock().expect("outcome mutex poisoned");
        Ok(guard.clone())
    }

    fn current_weights(&self) -> Result<Option<WeightSet>, RepositoryError> {
        let guard = self.weights.lock().expect("weights mutex poisoned");
        Ok(guard.clone())
    }

    fn store_weights(&self, weights: WeightSet) -> Result<(), RepositoryError> {
        let mut guard = self.weights.lock().expect("weights mutex poisoned");
        *guard = Some(weights);
        Ok(())
    }

    fn model_metrics(&self) -> Result<Option<ModelMetrics>, RepositoryError> {
        let guard = self.metrics.lock().expect("metrics mutex poisoned");
        Ok(guard.clone())
    }

    fn store_metrics(&self, metrics: ModelMetrics) -> Result<(), RepositoryError> {
        let mut guard = self.metrics.lock().expect("metrics mutex poisoned");
        *guard = Some(metrics);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryFeed {
    events: Arc<Mutex<Vec<AlertNotification>>>,
}

impl MemoryFeed {
    pub(super) fn events(&self) -> Vec<AlertNotification> {
        self.events.lock().expect("feed mutex poisoned").clone()
    }
}

impl AlertFeed for MemoryFeed {
    fn publish(&self, notification: AlertNotification) -> Result<(), FeedError> {
        self.events
            .lock()
            .expect("feed mutex poisoned")
            .push(notification);
        Ok(())
    }
}
