pub mod domain;
pub mod engine;

pub use domain::{
    InterventionType, Recommendation, RecommendationId, RecommendationStatus,
    RecommendationTransitionError,
};
pub use engine::{candidates, Candidate};
