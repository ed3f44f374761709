use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::alerts::AlertPriority;
use crate::engine::profile::{FactorKind, PatientId};

/// Identifier wrapper for issued recommendations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecommendationId(pub String);

/// The intervention taxonomy. Free-text content around an intervention
/// (education articles, message templates) is produced by external
/// collaborators; the engine only reasons over the taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterventionType {
    NurseFollowUp,
    DosageAdjustment,
    RegimenReview,
    AppointmentReminders,
    TransportationAssistance,
    OutreachCall,
    EducationSession,
    FinancialCounseling,
    PaymentPlan,
    MentalHealthReferral,
    PeerSupportGroup,
}

impl InterventionType {
    pub const fn label(self) -> &'static str {
        match self {
            InterventionType::NurseFollowUp => "nurse_follow_up",
            InterventionType::DosageAdjustment => "dosage_adjustment",
            InterventionType::RegimenReview => "regimen_review",
            InterventionType::AppointmentReminders => "appointment_reminders",
            InterventionType::TransportationAssistance => "transportation_assistance",
            InterventionType::OutreachCall => "outreach_call",
            InterventionType::EducationSession => "education_session",
            InterventionType::FinancialCounseling => "financial_counseling",
            InterventionType::PaymentPlan => "payment_plan",
            InterventionType::MentalHealthReferral => "mental_health_referral",
            InterventionType::PeerSupportGroup => "peer_support_group",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            InterventionType::NurseFollowUp => "Nurse follow-up",
            InterventionType::DosageAdjustment => "Dosage adjustment",
            InterventionType::RegimenReview => "Regimen review",
            InterventionType::AppointmentReminders => "Appointment reminders",
            InterventionType::TransportationAssistance => "Transportation assistance",
            InterventionType::OutreachCall => "Outreach call",
            InterventionType::EducationSession => "Education session",
            InterventionType::FinancialCounseling => "Financial counseling",
            InterventionType::PaymentPlan => "Payment plan",
            InterventionType::MentalHealthReferral => "Mental health referral",
            InterventionType::PeerSupportGroup => "Peer support group",
        }
    }

    /// Uncalibrated effectiveness coefficient applied to the source factor's
    /// weighted severity.
    pub(crate) const fn effectiveness(self) -> f64 {
        match self {
            InterventionType::NurseFollowUp => 0.45,
            InterventionType::DosageAdjustment => 0.55,
            InterventionType::RegimenReview => 0.50,
            InterventionType::AppointmentReminders => 0.35,
            InterventionType::TransportationAssistance => 0.40,
            InterventionType::OutreachCall => 0.40,
            InterventionType::EducationSession => 0.30,
            InterventionType::FinancialCounseling => 0.60,
            InterventionType::PaymentPlan => 0.50,
            InterventionType::MentalHealthReferral => 0.55,
            InterventionType::PeerSupportGroup => 0.35,
        }
    }

    pub(crate) const fn base_confidence(self) -> u8 {
        match self {
            InterventionType::NurseFollowUp => 80,
            InterventionType::DosageAdjustment => 70,
            InterventionType::RegimenReview => 75,
            InterventionType::AppointmentReminders => 75,
            InterventionType::TransportationAssistance => 65,
            InterventionType::OutreachCall => 70,
            InterventionType::EducationSession => 60,
            InterventionType::FinancialCounseling => 75,
            InterventionType::PaymentPlan => 70,
            InterventionType::MentalHealthReferral => 70,
            InterventionType::PeerSupportGroup => 60,
        }
    }

    /// Expected days until the intervention starts moving the score.
    pub const fn time_to_effect_days(self) -> u32 {
        match self {
            InterventionType::NurseFollowUp => 3,
            InterventionType::DosageAdjustment => 7,
            InterventionType::RegimenReview => 7,
            InterventionType::AppointmentReminders => 2,
            InterventionType::TransportationAssistance => 5,
            InterventionType::OutreachCall => 2,
            InterventionType::EducationSession => 10,
            InterventionType::FinancialCounseling => 10,
            InterventionType::PaymentPlan => 5,
            InterventionType::MentalHealthReferral => 14,
            InterventionType::PeerSupportGroup => 10,
        }
    }

    /// Factors this intervention addresses, primary first. Calibration
    /// attributes an outcome to the primary factor.
    pub(crate) const fn source_factors(self) -> &'static [FactorKind] {
        match self {
            InterventionType::NurseFollowUp => {
                &[FactorKind::Medication, FactorKind::SideEffect]
            }
            InterventionType::DosageAdjustment => &[FactorKind::Medication],
            InterventionType::RegimenReview => &[FactorKind::SideEffect],
            InterventionType::AppointmentReminders => &[FactorKind::Appointment],
            InterventionType::TransportationAssistance => &[FactorKind::Appointment],
            InterventionType::OutreachCall => &[FactorKind::Communication],
            InterventionType::EducationSession => &[FactorKind::Communication],
            InterventionType::FinancialCounseling => &[FactorKind::Financial],
            InterventionType::PaymentPlan => &[FactorKind::Financial],
            InterventionType::MentalHealthReferral => &[FactorKind::Emotional],
            InterventionType::PeerSupportGroup => &[FactorKind::Emotional],
        }
    }

    /// Fixed factor-to-menu mapping used for candidate generation.
    pub(crate) const fn menu_for(factor: FactorKind) -> &'static [InterventionType] {
        match factor {
            FactorKind::Medication => &[
                InterventionType::DosageAdjustment,
                InterventionType::NurseFollowUp,
            ],
            FactorKind::Financial => &[
                InterventionType::FinancialCounseling,
                InterventionType::PaymentPlan,
            ],
            FactorKind::Appointment => &[
                InterventionType::AppointmentReminders,
                InterventionType::TransportationAssistance,
            ],
            FactorKind::Emotional => &[
                InterventionType::MentalHealthReferral,
                InterventionType::PeerSupportGroup,
            ],
            FactorKind::SideEffect => &[
                InterventionType::RegimenReview,
                InterventionType::NurseFollowUp,
            ],
            FactorKind::Communication => &[
                InterventionType::OutreachCall,
                InterventionType::EducationSession,
            ],
        }
    }

    /// Stable discriminant used as the final ranking tie-break so two equal
    /// projections still order identically on every run.
    pub(crate) const fn rank_index(self) -> u8 {
        match self {
            InterventionType::NurseFollowUp => 0,
            InterventionType::DosageAdjustment => 1,
            InterventionType::RegimenReview => 2,
            InterventionType::AppointmentReminders => 3,
            InterventionType::TransportationAssistance => 4,
            InterventionType::OutreachCall => 5,
            InterventionType::EducationSession => 6,
            InterventionType::FinancialCounseling => 7,
            InterventionType::PaymentPlan => 8,
            InterventionType::MentalHealthReferral => 9,
            InterventionType::PeerSupportGroup => 10,
        }
    }
}

/// Staff decision state. `pending -> accepted | ignored`, with exactly one
/// undo back to pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    Pending,
    Accepted,
    Ignored,
}

impl RecommendationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RecommendationStatus::Pending => "pending",
            RecommendationStatus::Accepted => "accepted",
            RecommendationStatus::Ignored => "ignored",
        }
    }
}

/// A candidate intervention issued for one patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: RecommendationId,
    pub patient_id: PatientId,
    pub intervention: InterventionType,
    pub source_factor: FactorKind,
    pub predicted_reduction: u8,
    pub confidence: u8,
    pub priority: AlertPriority,
    pub time_to_effect_days: u32,
    pub status: RecommendationStatus,
    pub ignore_reason: Option<String>,
    pub undo_used: bool,
    pub outcome_recorded: bool,
    pub created_at: DateTime<Utc>,
}

impl Recommendation {
    pub fn accept(&mut self) -> Result<(), RecommendationTransitionError> {
        match self.status {
            RecommendationStatus::Pending => {
                self.status = RecommendationStatus::Accepted;
                Ok(())
            }
            other => Err(RecommendationTransitionError::NotPending {
                status: other.label(),
            }),
        }
    }

    pub fn ignore(&mut self, reason: Option<String>) -> Result<(), RecommendationTransitionError> {
        match self.status {
            RecommendationStatus::Pending => {
                self.status = RecommendationStatus::Ignored;
                self.ignore_reason = reason.filter(|text| !text.trim().is_empty());
                Ok(())
            }
            other => Err(RecommendationTransitionError::NotPending {
                status: other.label(),
            }),
        }
    }

    /// Restore to pending and clear the ignore reason. Allowed exactly once;
    /// further undos are rejected so outcome statistics cannot be corrupted
    /// by state thrashing.
    pub fn undo(&mut self) -> Result<(), RecommendationTransitionError> {
        match self.status {
            RecommendationStatus::Pending => Err(RecommendationTransitionError::NothingToUndo),
            _ if self.undo_used => Err(RecommendationTransitionError::UndoExhausted),
            _ if self.outcome_recorded => {
                Err(RecommendationTransitionError::OutcomeAlreadyRecorded)
            }
            _ => {
                self.status = RecommendationStatus::Pending;
                self.ignore_reason = None;
                self.undo_used = true;
                Ok(())
            }
        }
    }

    /// Guard consulted before an outcome is recorded against this
    /// recommendation.
    pub(crate) fn ensure_resolvable(&self) -> Result<(), RecommendationTransitionError> {
        if self.status != RecommendationStatus::Accepted {
            return Err(RecommendationTransitionError::NotAccepted {
                status: self.status.label(),
            });
        }
        if self.outcome_recorded {
            return Err(RecommendationTransitionError::OutcomeAlreadyRecorded);
        }
        Ok(())
    }
}

/// Illegal move through the recommendation lifecycle.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RecommendationTransitionError {
    #[error("recommendation is {status}; expected pending")]
    NotPending { status: &'static str },
    #[error("recommendation is already pending; nothing to undo")]
    NothingToUndo,
    #[error("undo has already been used for this recommendation")]
    UndoExhausted,
    #[error("recommendation is {status}; outcomes require an accepted recommendation")]
    NotAccepted { status: &'static str },
    #[error("an outcome has already been recorded for this recommendation")]
    OutcomeAlreadyRecorded,
}
