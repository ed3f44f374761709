//! Dropout risk scoring, alerting, intervention recommendation, what-if
//! simulation, and outcome calibration for treatment-adherence programs.

pub mod alerts;
pub mod import;
pub mod locks;
pub mod normalizer;
pub mod outcomes;
pub mod profile;
pub mod recommend;
pub mod repository;
pub mod router;
pub mod scorer;
pub mod service;
pub mod settings;
pub mod signals;
pub mod simulation;
pub mod weights;

#[cfg(test)]
mod tests;

pub use alerts::{
    Alert, AlertId, AlertPriority, AlertState, AlertTransitionError, AlertType,
};
pub use locks::{ContentionError, PatientLocks};
pub use outcomes::{
    GroundTruthLabel, InterventionOutcome, ModelMetrics, OutcomeRecord,
};
pub use profile::{
    FactorKind, FactorScore, FactorSet, PatientId, PatientRiskProfile, RiskTier, ScorePoint,
};
pub use recommend::{
    InterventionType, Recommendation, RecommendationId, RecommendationStatus,
    RecommendationTransitionError,
};
pub use repository::{
    AlertFeed, AlertNotification, EngineRepository, FeedError, FeedEvent, RepositoryError,
};
pub use router::engine_router;
pub use scorer::RiskScorer;
pub use service::{AlertQuery, EngineServiceError, OutcomeRequest, RiskEngineService};
pub use settings::EngineSettings;
pub use signals::{
    AdherenceSample, CategoryReport, SideEffectReport, SignalBatch, ValidationError,
};
pub use simulation::{SimulationReport, SimulationScenario};
pub use weights::{WeightError, WeightSet};
