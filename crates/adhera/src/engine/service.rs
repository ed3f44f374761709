use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use super::alerts::{
    evaluate_alerts, Alert, AlertDirective, AlertId, AlertPriority, AlertState,
    AlertTransitionError,
};
use super::locks::{ContentionError, PatientLocks};
use super::normalizer::normalize;
use super::outcomes::domain::{
    GroundTruthLabel, InterventionOutcome, ModelMetrics, OutcomeRecord,
};
use super::outcomes::tracker::{aggregate, aggregate_by_type, calibrate, CalibrationError};
use super::profile::{FactorSet, PatientId, PatientRiskProfile, RiskTier};
use super::recommend::domain::{
    InterventionType, Recommendation, RecommendationId, RecommendationStatus,
    RecommendationTransitionError,
};
use super::recommend::engine::{candidates, ranking_key};
use super::repository::{
    AlertFeed, AlertNotification, EngineRepository, FeedEvent, RepositoryError,
};
use super::scorer::RiskScorer;
use super::settings::EngineSettings;
use super::signals::{SignalBatch, ValidationError};
use super::simulation::{simulate, SimulationReport};
use super::weights::WeightSet;

static ALERT_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static RECOMMENDATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_alert_id() -> AlertId {
    let id = ALERT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    AlertId(format!("alert-{id:06}"))
}

fn next_recommendation_id() -> RecommendationId {
    let id = RECOMMENDATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RecommendationId(format!("rec-{id:06}"))
}

/// Read-side filter for the alert list endpoint.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct AlertQuery {
    #[serde(default)]
    pub status: Option<AlertState>,
    #[serde(default)]
    pub priority: Option<AlertPriority>,
}

/// Staff-reported resolution of an accepted recommendation.
#[derive(Debug, Clone, Deserialize)]
pub struct OutcomeRequest {
    pub recommendation_id: RecommendationId,
    pub success: bool,
    pub achieved_reduction: u8,
    pub response_days: u32,
}

/// Service facade composing the normalizer, scorer, alert manager,
/// recommendation engine, simulation engine, and outcome tracker over one
/// repository. All writes touching a patient serialize behind that patient's
/// lock; different patients proceed in parallel.
pub struct RiskEngineService<R, F> {
    repository: Arc<R>,
    feed: Arc<F>,
    locks: PatientLocks,
    settings: EngineSettings,
}

impl<R, F> RiskEngineService<R, F>
where
    R: EngineRepository + 'static,
    F: AlertFeed + 'static,
{
    pub fn new(repository: Arc<R>, feed: Arc<F>, settings: EngineSettings) -> Self {
        let locks = PatientLocks::new(settings.lock_wait);
        Self {
            repository,
            feed,
            locks,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn active_weights(&self) -> Result<WeightSet, EngineServiceError> {
        Ok(self
            .repository
            .current_weights()?
            .unwrap_or_else(|| self.settings.weights.clone()))
    }

    /// Ingest a partial signal batch and synchronously recompute the
    /// patient's risk state. Returns the updated profile. A validation
    /// failure leaves the stored profile untouched.
    pub fn ingest(
        &self,
        batch: SignalBatch,
        now: DateTime<Utc>,
    ) -> Result<PatientRiskProfile, EngineServiceError> {
        batch.validate(now)?;

        let _guard = self.locks.acquire(&batch.patient_id)?;

        let previous = self.repository.fetch_profile(&batch.patient_id)?;
        let previous_factors = previous
            .as_ref()
            .map(|profile| profile.factors.clone())
            .unwrap_or_else(FactorSet::unknown);
        let factors = normalize(&batch, &previous_factors, now)?;

        let scorer = RiskScorer::new(self.active_weights()?);
        let profile = scorer.score(
            batch.patient_id.clone(),
            factors,
            previous.as_ref(),
            now,
            self.settings.history_limit,
        );
        self.repository.upsert_profile(profile.clone())?;
        info!(
            patient = %profile.patient_id.0,
            score = profile.composite_score,
            tier = profile.tier.label(),
            primary = profile.primary_factor.label(),
            "risk recomputed"
        );

        // Alert state is re-read here, after the profile write and still
        // under the patient lock, so a just-dismissed alert never comes back.
        let existing = self.repository.alerts_for(&batch.patient_id)?;
        let directives =
            evaluate_alerts(previous.as_ref(), &profile, &batch, &existing, &self.settings);
        for directive in directives {
            self.apply_alert_directive(&batch.patient_id, directive, now)?;
        }

        Ok(profile)
    }

    fn apply_alert_directive(
        &self,
        patient_id: &PatientId,
        directive: AlertDirective,
        now: DateTime<Utc>,
    ) -> Result<(), EngineServiceError> {
        match directive {
            AlertDirective::Raise {
                alert_type,
                priority,
                message,
                action_required,
            } => {
                let alert = Alert::raise(
                    next_alert_id(),
                    patient_id.clone(),
                    alert_type,
                    priority,
                    message,
                    action_required,
                    now,
                );
                self.repository.insert_alert(alert.clone())?;
                info!(
                    patient = %patient_id.0,
                    alert = %alert.id.0,
                    kind = alert.alert_type.label(),
                    priority = alert.priority.label(),
                    "alert raised"
                );
                self.publish(AlertNotification::from_alert(FeedEvent::Raised, &alert));
            }
            AlertDirective::Escalate {
                id,
                priority,
                message,
            } => {
                let mut alert = self
                    .repository
                    .fetch_alert(&id)?
                    .ok_or(RepositoryError::NotFound)?;
                alert.escalate(priority, message);
                self.repository.update_alert(alert.clone())?;
                info!(
                    patient = %patient_id.0,
                    alert = %alert.id.0,
                    priority = alert.priority.label(),
                    "alert escalated"
                );
                self.publish(AlertNotification::from_alert(FeedEvent::Escalated, &alert));
            }
        }
        Ok(())
    }

    /// The feed is a best-effort outbound port: alerts are already committed,
    /// and the notifier can poll them, so a transport failure is logged
    /// rather than failing the ingestion.
    fn publish(&self, notification: AlertNotification) {
        if let Err(err) = self.feed.publish(notification) {
            warn!(error = %err, "alert feed publish failed");
        }
    }

    /// Current risk profile for one patient.
    pub fn risk(&self, patient_id: &PatientId) -> Result<PatientRiskProfile, EngineServiceError> {
        self.repository
            .fetch_profile(patient_id)?
            .ok_or(EngineServiceError::Repository(RepositoryError::NotFound))
    }

    /// Roster projection: every profile, optionally filtered by tier, ordered
    /// by composite score descending.
    pub fn roster(
        &self,
        tier: Option<RiskTier>,
    ) -> Result<Vec<PatientRiskProfile>, EngineServiceError> {
        let mut profiles = self.repository.profiles()?;
        if let Some(tier) = tier {
            profiles.retain(|profile| profile.tier == tier);
        }
        profiles.sort_by(|a, b| {
            b.composite_score
                .cmp(&a.composite_score)
                .then_with(|| a.patient_id.cmp(&b.patient_id))
        });
        Ok(profiles)
    }

    /// Filtered alert list for one patient, newest first.
    pub fn alerts(
        &self,
        patient_id: &PatientId,
        query: AlertQuery,
    ) -> Result<Vec<Alert>, EngineServiceError> {
        let mut alerts = self.repository.alerts_for(patient_id)?;
        if let Some(status) = query.status {
            alerts.retain(|alert| alert.state == status);
        }
        if let Some(priority) = query.priority {
            alerts.retain(|alert| alert.priority == priority);
        }
        alerts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.0.cmp(&b.id.0))
        });
        Ok(alerts)
    }

    fn with_alert(
        &self,
        alert_id: &AlertId,
        apply: impl FnOnce(&mut Alert) -> Result<(), AlertTransitionError>,
    ) -> Result<Alert, EngineServiceError> {
        let alert = self
            .repository
            .fetch_alert(alert_id)?
            .ok_or(RepositoryError::NotFound)?;

        let _guard = self.locks.acquire(&alert.patient_id)?;

        // Re-fetch under the lock; a concurrent recomputation may have
        // escalated the alert in the meantime.
        let mut alert = self
            .repository
            .fetch_alert(alert_id)?
            .ok_or(RepositoryError::NotFound)?;
        apply(&mut alert)?;
        self.repository.update_alert(alert.clone())?;
        Ok(alert)
    }

    pub fn mark_alert_read(&self, alert_id: &AlertId) -> Result<Alert, EngineServiceError> {
        self.with_alert(alert_id, |alert| alert.mark_read())
    }

    pub fn action_alert(
        &self,
        alert_id: &AlertId,
        description: &str,
    ) -> Result<Alert, EngineServiceError> {
        self.with_alert(alert_id, |alert| alert.record_action(description))
    }

    pub fn dismiss_alert(&self, alert_id: &AlertId) -> Result<Alert, EngineServiceError> {
        self.with_alert(alert_id, |alert| alert.dismiss())
    }

    /// Current recommendations for one patient. Fresh candidates from the
    /// current risk-factor profile are materialized on read, under the
    /// patient lock; an intervention type already pending, accepted and
    /// unresolved, or ignored is not re-issued.
    pub fn recommendations(
        &self,
        patient_id: &PatientId,
    ) -> Result<Vec<Recommendation>, EngineServiceError> {
        let _guard = self.locks.acquire(patient_id)?;

        let profile = self
            .repository
            .fetch_profile(patient_id)?
            .ok_or(RepositoryError::NotFound)?;
        let aggregates = aggregate_by_type(&self.repository.outcomes()?);
        let weights = self.active_weights()?;

        let mut existing = self.repository.recommendations_for(patient_id)?;
        let blocked: Vec<InterventionType> = existing
            .iter()
            .filter(|rec| {
                !(rec.status == RecommendationStatus::Accepted && rec.outcome_recorded)
            })
            .map(|rec| rec.intervention)
            .collect();

        for candidate in candidates(&profile, &weights, &aggregates, &self.settings) {
            if blocked.contains(&candidate.intervention) {
                continue;
            }
            let recommendation = Recommendation {
                id: next_recommendation_id(),
                patient_id: patient_id.clone(),
                intervention: candidate.intervention,
                source_factor: candidate.source_factor,
                predicted_reduction: candidate.predicted_reduction,
                confidence: candidate.confidence,
                priority: candidate.priority,
                time_to_effect_days: candidate.time_to_effect_days,
                status: RecommendationStatus::Pending,
                ignore_reason: None,
                undo_used: false,
                outcome_recorded: false,
                created_at: profile.recomputed_at,
            };
            self.repository.insert_recommendation(recommendation.clone())?;
            existing.push(recommendation);
        }

        existing.sort_by_key(|rec| {
            let status_rank = match rec.status {
                RecommendationStatus::Pending => 0u8,
                RecommendationStatus::Accepted => 1,
                RecommendationStatus::Ignored => 2,
            };
            (
                status_rank,
                ranking_key(
                    rec.predicted_reduction as i16,
                    rec.confidence,
                    rec.time_to_effect_days,
                    rec.intervention,
                ),
            )
        });
        Ok(existing)
    }

    fn with_recommendation(
        &self,
        id: &RecommendationId,
        apply: impl FnOnce(&mut Recommendation) -> Result<(), RecommendationTransitionError>,
    ) -> Result<Recommendation, EngineServiceError> {
        let rec = self
            .repository
            .fetch_recommendation(id)?
            .ok_or(RepositoryError::NotFound)?;

        let _guard = self.locks.acquire(&rec.patient_id)?;

        let mut rec = self
            .repository
            .fetch_recommendation(id)?
            .ok_or(RepositoryError::NotFound)?;
        apply(&mut rec)?;
        self.repository.update_recommendation(rec.clone())?;
        Ok(rec)
    }

    pub fn accept_recommendation(
        &self,
        id: &RecommendationId,
    ) -> Result<Recommendation, EngineServiceError> {
        self.with_recommendation(id, |rec| rec.accept())
    }

    pub fn ignore_recommendation(
        &self,
        id: &RecommendationId,
        reason: Option<String>,
    ) -> Result<Recommendation, EngineServiceError> {
        self.with_recommendation(id, |rec| rec.ignore(reason))
    }

    pub fn undo_recommendation(
        &self,
        id: &RecommendationId,
    ) -> Result<Recommendation, EngineServiceError> {
        self.with_recommendation(id, |rec| rec.undo())
    }

    /// What-if projection over the patient's current profile snapshot.
    /// Read-only; requires no lock beyond the consistent snapshot reads.
    pub fn simulate(
        &self,
        patient_id: &PatientId,
        interventions: &[InterventionType],
    ) -> Result<SimulationReport, EngineServiceError> {
        let profile = self
            .repository
            .fetch_profile(patient_id)?
            .ok_or(RepositoryError::NotFound)?;
        let aggregates = aggregate_by_type(&self.repository.outcomes()?);
        let weights = self.active_weights()?;
        Ok(simulate(
            &profile,
            interventions,
            &weights,
            &aggregates,
            &self.settings,
        ))
    }

    /// Record the resolution of an accepted intervention.
    pub fn record_outcome(
        &self,
        request: OutcomeRequest,
        now: DateTime<Utc>,
    ) -> Result<OutcomeRecord, EngineServiceError> {
        if request.achieved_reduction > 100 {
            return Err(EngineServiceError::Validation(
                ValidationError::ReductionOutOfRange(request.achieved_reduction),
            ));
        }

        let rec = self
            .repository
            .fetch_recommendation(&request.recommendation_id)?
            .ok_or(RepositoryError::NotFound)?;

        let _guard = self.locks.acquire(&rec.patient_id)?;

        let mut rec = self
            .repository
            .fetch_recommendation(&request.recommendation_id)?
            .ok_or(RepositoryError::NotFound)?;
        rec.ensure_resolvable()?;
        rec.outcome_recorded = true;
        self.repository.update_recommendation(rec.clone())?;

        let record = OutcomeRecord {
            recommendation_id: rec.id.clone(),
            patient_id: rec.patient_id.clone(),
            intervention: rec.intervention,
            success: request.success,
            achieved_reduction: request.achieved_reduction,
            response_days: request.response_days,
            recorded_at: now,
        };
        self.repository.append_outcome(record.clone())?;
        info!(
            patient = %record.patient_id.0,
            intervention = record.intervention.label(),
            success = record.success,
            "intervention outcome recorded"
        );
        Ok(record)
    }

    /// Per-intervention aggregates over every recorded outcome.
    pub fn outcome_summary(&self) -> Result<Vec<InterventionOutcome>, EngineServiceError> {
        Ok(aggregate(&self.repository.outcomes()?))
    }

    /// Explicit batch calibration step. On success the new metrics and the
    /// next weight version are committed; on failure both keep their
    /// last-known-good values.
    pub fn calibrate(
        &self,
        labels: &[GroundTruthLabel],
        now: DateTime<Utc>,
    ) -> Result<ModelMetrics, EngineServiceError> {
        let profiles = self.repository.profiles()?;
        let records = self.repository.outcomes()?;
        let weights = self.active_weights()?;

        let report = calibrate(&profiles, labels, &records, &weights, now)?;

        self.repository.store_weights(report.weights.clone())?;
        self.repository.store_metrics(report.metrics.clone())?;
        info!(
            weights_version = report.weights.version,
            accuracy = report.metrics.accuracy,
            sensitivity = report.metrics.sensitivity,
            "model calibrated"
        );
        Ok(report.metrics)
    }

    /// Last committed model metrics, or the pre-calibration placeholder.
    pub fn model_metrics(&self) -> Result<ModelMetrics, EngineServiceError> {
        Ok(self
            .repository
            .model_metrics()?
            .unwrap_or_else(ModelMetrics::initial))
    }
}

/// Error raised by the engine service facade.
#[derive(Debug, thiserror::Error)]
pub enum EngineServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    AlertTransition(#[from] AlertTransitionError),
    #[error(transparent)]
    RecommendationTransition(#[from] RecommendationTransitionError),
    #[error(transparent)]
    Contention(#[from] ContentionError),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
