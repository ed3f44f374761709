pub mod domain;
pub mod tracker;

pub use domain::{GroundTruthLabel, InterventionOutcome, ModelMetrics, OutcomeRecord};
pub use tracker::{aggregate, aggregate_by_type, calibrate, CalibrationError, CalibrationReport};
