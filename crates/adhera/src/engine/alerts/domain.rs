use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::profile::PatientId;

/// Identifier wrapper for raised alerts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertId(pub String);

/// What triggered the alert. One active alert per (patient, type) at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    RiskIncrease,
    MissedAppointments,
    SevereSideEffect,
    EmotionalDistress,
    FinancialInstability,
    TreatmentMilestone,
    System,
}

impl AlertType {
    pub const fn label(self) -> &'static str {
        match self {
            AlertType::RiskIncrease => "risk_increase",
            AlertType::MissedAppointments => "missed_appointments",
            AlertType::SevereSideEffect => "severe_side_effect",
            AlertType::EmotionalDistress => "emotional_distress",
            AlertType::FinancialInstability => "financial_instability",
            AlertType::TreatmentMilestone => "treatment_milestone",
            AlertType::System => "system",
        }
    }
}

/// Alert urgency, derived from the triggering severity through the same cut
/// points as risk tiers, independently per alert type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AlertPriority {
    Low,
    Moderate,
    High,
    Critical,
}

impl AlertPriority {
    pub const fn from_severity(severity: u8) -> Self {
        match severity {
            0..=39 => AlertPriority::Low,
            40..=59 => AlertPriority::Moderate,
            60..=79 => AlertPriority::High,
            _ => AlertPriority::Critical,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            AlertPriority::Low => "low",
            AlertPriority::Moderate => "moderate",
            AlertPriority::High => "high",
            AlertPriority::Critical => "critical",
        }
    }
}

/// Lifecycle state. Transitions only move forward; re-opening is modeled as
/// raising a new alert, never resetting an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertState {
    Open,
    Read,
    Actioned,
    Dismissed,
}

impl AlertState {
    pub const fn label(self) -> &'static str {
        match self {
            AlertState::Open => "open",
            AlertState::Read => "read",
            AlertState::Actioned => "actioned",
            AlertState::Dismissed => "dismissed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, AlertState::Actioned | AlertState::Dismissed)
    }
}

/// A raised alert, retained indefinitely for audit once terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub patient_id: PatientId,
    pub alert_type: AlertType,
    pub priority: AlertPriority,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
    pub action_required: bool,
    pub action_taken: Option<String>,
    pub state: AlertState,
}

impl Alert {
    pub fn raise(
        id: AlertId,
        patient_id: PatientId,
        alert_type: AlertType,
        priority: AlertPriority,
        message: String,
        action_required: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            patient_id,
            alert_type,
            priority,
            message,
            created_at,
            read: false,
            action_required,
            action_taken: None,
            state: AlertState::Open,
        }
    }

    /// Staff marks the alert as read. No side effect beyond the flag.
    pub fn mark_read(&mut self) -> Result<(), AlertTransitionError> {
        match self.state {
            AlertState::Open => {
                self.read = true;
                self.state = AlertState::Read;
                Ok(())
            }
            other => Err(AlertTransitionError::IllegalMove {
                from: other.label(),
                to: AlertState::Read.label(),
            }),
        }
    }

    /// Staff records the action taken. Requires a non-empty description and
    /// implicitly marks the alert read.
    pub fn record_action(&mut self, description: &str) -> Result<(), AlertTransitionError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(AlertTransitionError::EmptyAction);
        }
        match self.state {
            AlertState::Open | AlertState::Read => {
                self.read = true;
                self.action_taken = Some(description.to_string());
                self.state = AlertState::Actioned;
                Ok(())
            }
            other => Err(AlertTransitionError::IllegalMove {
                from: other.label(),
                to: AlertState::Actioned.label(),
            }),
        }
    }

    /// Staff-initiated removal. The alert stays stored for audit but leaves
    /// all active counts.
    pub fn dismiss(&mut self) -> Result<(), AlertTransitionError> {
        match self.state {
            AlertState::Open | AlertState::Read => {
                self.state = AlertState::Dismissed;
                Ok(())
            }
            other => Err(AlertTransitionError::IllegalMove {
                from: other.label(),
                to: AlertState::Dismissed.label(),
            }),
        }
    }

    /// A re-trigger of an active alert escalates in place instead of raising
    /// a duplicate. Priority only ever rises.
    pub(crate) fn escalate(&mut self, priority: AlertPriority, message: String) {
        if priority > self.priority {
            self.priority = priority;
            self.message = message;
        }
    }
}

/// Illegal move through the alert state graph.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AlertTransitionError {
    #[error("cannot move alert from {from} to {to}")]
    IllegalMove { from: &'static str, to: &'static str },
    #[error("action description must not be empty")]
    EmptyAction,
}
