use serde::{Deserialize, Serialize};

use super::alerts::{Alert, AlertId, AlertPriority, AlertType};
use super::outcomes::domain::{ModelMetrics, OutcomeRecord};
use super::profile::{PatientId, PatientRiskProfile};
use super::recommend::domain::{Recommendation, RecommendationId};
use super::weights::WeightSet;

/// Storage abstraction so the engine can be exercised against in-memory
/// adapters in tests and against real persistence in deployment. Each method
/// is a single all-or-nothing write or a consistent read.
pub trait EngineRepository: Send + Sync {
    fn upsert_profile(&self, profile: PatientRiskProfile) -> Result<(), RepositoryError>;
    fn fetch_profile(&self, id: &PatientId) -> Result<Option<PatientRiskProfile>, RepositoryError>;
    fn profiles(&self) -> Result<Vec<PatientRiskProfile>, RepositoryError>;

    fn insert_alert(&self, alert: Alert) -> Result<(), RepositoryError>;
    fn update_alert(&self, alert: Alert) -> Result<(), RepositoryError>;
    fn fetch_alert(&self, id: &AlertId) -> Result<Option<Alert>, RepositoryError>;
    fn alerts_for(&self, patient: &PatientId) -> Result<Vec<Alert>, RepositoryError>;

    fn insert_recommendation(&self, rec: Recommendation) -> Result<(), RepositoryError>;
    fn update_recommendation(&self, rec: Recommendation) -> Result<(), RepositoryError>;
    fn fetch_recommendation(
        &self,
        id: &RecommendationId,
    ) -> Result<Option<Recommendation>, RepositoryError>;
    fn recommendations_for(
        &self,
        patient: &PatientId,
    ) -> Result<Vec<Recommendation>, RepositoryError>;

    fn append_outcome(&self, outcome: OutcomeRecord) -> Result<(), RepositoryError>;
    fn outcomes(&self) -> Result<Vec<OutcomeRecord>, RepositoryError>;

    fn current_weights(&self) -> Result<Option<WeightSet>, RepositoryError>;
    fn store_weights(&self, weights: WeightSet) -> Result<(), RepositoryError>;
    fn model_metrics(&self) -> Result<Option<ModelMetrics>, RepositoryError>;
    fn store_metrics(&self, metrics: ModelMetrics) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outbound port toward the external notifier. The engine only emits records;
/// delivery (email/SMS/push) happens elsewhere.
pub trait AlertFeed: Send + Sync {
    fn publish(&self, notification: AlertNotification) -> Result<(), FeedError>;
}

/// Whether the notification concerns a fresh alert or an escalation of an
/// already-active one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedEvent {
    Raised,
    Escalated,
}

/// Payload handed to the notifier whenever the alert manager acts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertNotification {
    pub event: FeedEvent,
    pub alert_id: AlertId,
    pub patient_id: PatientId,
    pub alert_type: AlertType,
    pub priority: AlertPriority,
    pub message: String,
}

impl AlertNotification {
    pub(crate) fn from_alert(event: FeedEvent, alert: &Alert) -> Self {
        Self {
            event,
            alert_id: alert.id.clone(),
            patient_id: alert.patient_id.clone(),
            alert_type: alert.alert_type,
            priority: alert.priority,
            message: alert.message.clone(),
        }
    }
}

/// Alert dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("alert feed unavailable: {0}")]
    Transport(String),
}
