pub mod domain;
pub mod manager;

pub use domain::{
    Alert, AlertId, AlertPriority, AlertState, AlertTransitionError, AlertType,
};
pub use manager::{evaluate_alerts, AlertDirective};
