use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use adhera::engine::{
    Alert, AlertFeed, AlertId, AlertNotification, EngineRepository, EngineSettings, FeedError,
    ModelMetrics, OutcomeRecord, PatientId, PatientRiskProfile, Recommendation,
    RecommendationId, RepositoryError, WeightSet,
};
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-memory engine repository backing the service until a real store is
/// wired in. One mutex per collection keeps each write all-or-nothing.
#[derive(Default, Clone)]
pub(crate) struct InMemoryEngineRepository {
    profiles: Arc<Mutex<HashMap<PatientId, PatientRiskProfile>>>,
    alerts: Arc<Mutex<HashMap<AlertId, Alert>>>,
    recommendations: Arc<Mutex<HashMap<RecommendationId, Recommendation>>>,
    outcomes: Arc<Mutex<Vec<OutcomeRecord>>>,
    weights: Arc<Mutex<Option<WeightSet>>>,
    metrics: Arc<Mutex<Option<ModelMetrics>>>,
}

impl EngineRepository for InMemoryEngineRepository {
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

/// Collects alert notifications for a poller; production swaps the real
/// notifier transport in behind the same trait.
#[derive(Default, Clone)]
pub(crate) struct InMemoryAlertFeed {
    events: Arc<Mutex<Vec<AlertNotification>>>,
}

impl InMemoryAlertFeed {
    pub(crate) fn events(&self) -> Vec<AlertNotification> {
        self.events.lock().expect("feed mutex poisoned").clone()
    }
}

impl AlertFeed for InMemoryAlertFeed {
    fn publish(&self, notification: AlertNotification) -> Result<(), FeedError> {
        self.events
            .lock()
            .expect("feed mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(crate) fn default_engine_settings() -> EngineSettings {
    EngineSettings::default()
}
