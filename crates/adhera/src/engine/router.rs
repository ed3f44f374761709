use std::io::Cursor;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::alerts::AlertId;
use super::import::{parse_batches, SkippedRow};
use super::outcomes::domain::GroundTruthLabel;
use super::profile::{PatientId, RiskTier};
use super::recommend::domain::{InterventionType, RecommendationId};
use super::repository::{AlertFeed, EngineRepository, RepositoryError};
use super::service::{AlertQuery, EngineServiceError, OutcomeRequest, RiskEngineService};
use super::signals::SignalBatch;

/// Router builder exposing the engine over HTTP.
pub fn engine_router<R, F>(service: Arc<RiskEngineService<R, F>>) -> Router
where
    R: EngineRepository + 'static,
    F: AlertFeed + 'static,
{
    Router::new()
        .route("/api/v1/signals", post(ingest_handler::<R, F>))
        .route("/api/v1/signals/import", post(import_handler::<R, F>))
        .route("/api/v1/patients", get(roster_handler::<R, F>))
        .route(
            "/api/v1/patients/:patient_id/risk",
            get(risk_handler::<R, F>),
        )
        .route(
            "/api/v1/patients/:patient_id/alerts",
            get(alerts_handler::<R, F>),
        )
        .route(
            "/api/v1/alerts/:alert_id/read",
            post(alert_read_handler::<R, F>),
        )
        .route(
            "/api/v1/alerts/:alert_id/action",
            post(alert_action_handler::<R, F>),
        )
        .route(
            "/api/v1/alerts/:alert_id/dismiss",
            post(alert_dismiss_handler::<R, F>),
        )
        .route(
            "/api/v1/patients/:patient_id/recommendations",
            get(recommendations_handler::<R, F>),
        )
        .route(
            "/api/v1/recommendations/:recommendation_id/accept",
            post(recommendation_accept_handler::<R, F>),
        )
        .route(
            "/api/v1/recommendations/:recommendation_id/ignore",
            post(recommendation_ignore_handler::<R, F>),
        )
        .route(
            "/api/v1/recommendations/:recommendation_id/undo",
            post(recommendation_undo_handler::<R, F>),
        )
        .route(
            "/api/v1/patients/:patient_id/simulate",
            post(simulate_handler::<R, F>),
        )
        .route(
            "/api/v1/outcomes",
            post(outcome_handler::<R, F>).get(outcome_summary_handler::<R, F>),
        )
        .route("/api/v1/calibrate", post(calibrate_handler::<R, F>))
        .route("/api/v1/calibration", get(calibration_handler::<R, F>))
        .with_state(service)
}

fn error_response(err: EngineServiceError) -> Response {
    let status = match &err {
        EngineServiceError::Validation(_) | EngineServiceError::Calibration(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        EngineServiceError::AlertTransition(_)
        | EngineServiceError::RecommendationTransition(_) => StatusCode::CONFLICT,
        EngineServiceError::Contention(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        EngineServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        EngineServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let retriable = matches!(err, EngineServiceError::Contention(_));
    let body = axum::Json(json!({
        "error": err.to_string(),
        "retriable": retriable,
    }));
    (status, body).into_response()
}

pub(crate) async fn ingest_handler<R, F>(
    State(service): State<Arc<RiskEngineService<R, F>>>,
    axum::Json(batch): axum::Json<SignalBatch>,
) -> Response
where
    R: EngineRepository + 'static,
    F: AlertFeed + 'static,
{
    match service.ingest(batch, Utc::now()) {
        Ok(profile) => (StatusCode::OK, axum::Json(profile)).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImportRequest {
    pub(crate) csv: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ImportResponse {
    pub(crate) rows: usize,
    pub(crate) ingested: usize,
    pub(crate) skipped: Vec<SkippedRow>,
    pub(crate) rejected: Vec<RejectedBatch>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RejectedBatch {
    pub(crate) patient_id: String,
    pub(crate) error: String,
}

pub(crate) async fn import_handler<R, F>(
    State(service): State<Arc<RiskEngineService<R, F>>>,
    axum::Json(request): axum::Json<ImportRequest>,
) -> Response
where
    R: EngineRepository + 'static,
    F: AlertFeed + 'static,
{
    let now = Utc::now();
    let parsed = match parse_batches(Cursor::new(request.csv.into_bytes()), now) {
        Ok(parsed) => parsed,
        Err(err) => {
            let body = axum::Json(json!({ "error": err.to_string() }));
            return (StatusCode::UNPROCESSABLE_ENTITY, body).into_response();
        }
    };

    let mut ingested = 0usize;
    let mut rejected = Vec::new();
    for batch in parsed.batches {
        let patient_id = batch.patient_id.0.clone();
        match service.ingest(batch, now) {
            Ok(_) => ingested += 1,
            Err(err) => rejected.push(RejectedBatch {
                patient_id,
                error: err.to_string(),
            }),
        }
    }

    let response = ImportResponse {
        rows: parsed.rows,
        ingested,
        skipped: parsed.skipped,
        rejected,
    };
    (StatusCode::OK, axum::Json(response)).into_response()
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RosterQuery {
    #[serde(default)]
    pub(crate) tier: Option<RiskTier>,
}

pub(crate) async fn roster_handler<R, F>(
    State(service): State<Arc<RiskEngineService<R, F>>>,
    Query(query): Query<RosterQuery>,
) -> Response
where
    R: EngineRepository + 'static,
    F: AlertFeed + 'static,
{
    match service.roster(query.tier) {
        Ok(profiles) => (StatusCode::OK, axum::Json(profiles)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn risk_handler<R, F>(
    State(service): State<Arc<RiskEngineService<R, F>>>,
    Path(patient_id): Path<String>,
) -> Response
where
    R: EngineRepository + 'static,
    F: AlertFeed + 'static,
{
    match service.risk(&PatientId(patient_id)) {
        Ok(profile) => (StatusCode::OK, axum::Json(profile)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn alerts_handler<R, F>(
    State(service): State<Arc<RiskEngineService<R, F>>>,
    Path(patient_id): Path<String>,
    Query(query): Query<AlertQuery>,
) -> Response
where
    R: EngineRepository + 'static,
    F: AlertFeed + 'static,
{
    match service.alerts(&PatientId(patient_id), query) {
        Ok(alerts) => (StatusCode::OK, axum::Json(alerts)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn alert_read_handler<R, F>(
    State(service): State<Arc<RiskEngineService<R, F>>>,
    Path(alert_id): Path<String>,
) -> Response
where
    R: EngineRepository + 'static,
    F: AlertFeed + 'static,
{
    match service.mark_alert_read(&AlertId(alert_id)) {
        Ok(alert) => (StatusCode::OK, axum::Json(alert)).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActionRequest {
    pub(crate) description: String,
}

pub(crate) async fn alert_action_handler<R, F>(
    State(service): State<Arc<RiskEngineService<R, F>>>,
    Path(alert_id): Path<String>,
    axum::Json(request): axum::Json<ActionRequest>,
) -> Response
where
    R: EngineRepository + 'static,
    F: AlertFeed + 'static,
{
    match service.action_alert(&AlertId(alert_id), &request.description) {
        Ok(alert) => (StatusCode::OK, axum::Json(alert)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn alert_dismiss_handler<R, F>(
    State(service): State<Arc<RiskEngineService<R, F>>>,
    Path(alert_id): Path<String>,
) -> Response
where
    R: EngineRepository + 'static,
    F: AlertFeed + 'static,
{
    match service.dismiss_alert(&AlertId(alert_id)) {
        Ok(alert) => (StatusCode::OK, axum::Json(alert)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn recommendations_handler<R, F>(
    State(service): State<Arc<RiskEngineService<R, F>>>,
    Path(patient_id): Path<String>,
) -> Response
where
    R: EngineRepository + 'static,
    F: AlertFeed + 'static,
{
    match service.recommendations(&PatientId(patient_id)) {
        Ok(recommendations) => (StatusCode::OK, axum::Json(recommendations)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn recommendation_accept_handler<R, F>(
    State(service): State<Arc<RiskEngineService<R, F>>>,
    Path(recommendation_id): Path<String>,
) -> Response
where
    R: EngineRepository + 'static,
    F: AlertFeed + 'static,
{
    match service.accept_recommendation(&RecommendationId(recommendation_id)) {
        Ok(rec) => (StatusCode::OK, axum::Json(rec)).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct IgnoreRequest {
    #[serde(default)]
    pub(crate) reason: Option<String>,
}

pub(crate) async fn recommendation_ignore_handler<R, F>(
    State(service): State<Arc<RiskEngineService<R, F>>>,
    Path(recommendation_id): Path<String>,
    axum::Json(request): axum::Json<IgnoreRequest>,
) -> Response
where
    R: EngineRepository + 'static,
    F: AlertFeed + 'static,
{
    match service.ignore_recommendation(&RecommendationId(recommendation_id), request.reason) {
        Ok(rec) => (StatusCode::OK, axum::Json(rec)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn recommendation_undo_handler<R, F>(
    State(service): State<Arc<RiskEngineService<R, F>>>,
    Path(recommendation_id): Path<String>,
) -> Response
where
    R: EngineRepository + 'static,
    F: AlertFeed + 'static,
{
    match service.undo_recommendation(&RecommendationId(recommendation_id)) {
        Ok(rec) => (StatusCode::OK, axum::Json(rec)).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SimulateRequest {
    pub(crate) interventions: Vec<InterventionType>,
}

pub(crate) async fn simulate_handler<R, F>(
    State(service): State<Arc<RiskEngineService<R, F>>>,
    Path(patient_id): Path<String>,
    axum::Json(request): axum::Json<SimulateRequest>,
) -> Response
where
    R: EngineRepository + 'static,
    F: AlertFeed + 'static,
{
    match service.simulate(&PatientId(patient_id), &request.interventions) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn outcome_handler<R, F>(
    State(service): State<Arc<RiskEngineService<R, F>>>,
    axum::Json(request): axum::Json<OutcomeRequest>,
) -> Response
where
    R: EngineRepository + 'static,
    F: AlertFeed + 'static,
{
    match service.record_outcome(request, Utc::now()) {
        Ok(record) => (StatusCode::CREATED, axum::Json(record)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn outcome_summary_handler<R, F>(
    State(service): State<Arc<RiskEngineService<R, F>>>,
) -> Response
where
    R: EngineRepository + 'static,
    F: AlertFeed + 'static,
{
    match service.outcome_summary() {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CalibrateRequest {
    pub(crate) labels: Vec<GroundTruthLabel>,
}

pub(crate) async fn calibrate_handler<R, F>(
    State(service): State<Arc<RiskEngineService<R, F>>>,
    axum::Json(request): axum::Json<CalibrateRequest>,
) -> Response
where
    R: EngineRepository + 'static,
    F: AlertFeed + 'static,
{
    match service.calibrate(&request.labels, Utc::now()) {
        Ok(metrics) => (StatusCode::OK, axum::Json(metrics)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn calibration_handler<R, F>(
    State(service): State<Arc<RiskEngineService<R, F>>>,
) -> Response
where
    R: EngineRepository + 'static,
    F: AlertFeed + 'static,
{
    match service.model_metrics() {
        Ok(metrics) => (StatusCode::OK, axum::Json(metrics)).into_response(),
        Err(err) => error_response(err),
    }
}
