// libs/booking-cell/src/models.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use shared_database::CollectionKind;
use shared_models::{
    AppError, Appointment, AppointmentSource, AppointmentStatus, InsurancePlan, Service,
    SlotTemplate, TeamMember, TeamMemberInsurancePlan, TeamMemberService,
};

// ==============================================================================
// BOOKING STEPS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingStep {
    TeamMember,
    Insurance,
    Service,
    Date,
    Time,
    ClientInfo,
    Confirmation,
}

impl BookingStep {
    /// The one canonical ordering; every navigation decision derives from it.
    pub const ORDER: [BookingStep; 7] = [
        BookingStep::TeamMember,
        BookingStep::Insurance,
        BookingStep::Service,
        BookingStep::Date,
        BookingStep::Time,
        BookingStep::ClientInfo,
        BookingStep::Confirmation,
    ];

    pub fn index(self) -> usize {
        Self::ORDER
            .iter()
            .position(|step| *step == self)
            .unwrap_or_default()
    }

    pub fn at(index: usize) -> Option<BookingStep> {
        Self::ORDER.get(index).copied()
    }

    pub fn first() -> BookingStep {
        Self::ORDER[0]
    }

    pub fn last() -> BookingStep {
        Self::ORDER[Self::ORDER.len() - 1]
    }

    pub fn next(self) -> Option<BookingStep> {
        Self::at(self.index() + 1)
    }

    pub fn previous(self) -> Option<BookingStep> {
        self.index().checked_sub(1).and_then(Self::at)
    }

    /// Steps whose selection depends on the one before it. Client info is independent.
    pub fn is_in_dependency_chain(self) -> bool {
        self.index() <= BookingStep::Time.index()
    }
}

impl fmt::Display for BookingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStep::TeamMember => write!(f, "team-member"),
            BookingStep::Insurance => write!(f, "insurance"),
            BookingStep::Service => write!(f, "service"),
            BookingStep::Date => write!(f, "date"),
            BookingStep::Time => write!(f, "time"),
            BookingStep::ClientInfo => write!(f, "client-info"),
            BookingStep::Confirmation => write!(f, "confirmation"),
        }
    }
}

// ==============================================================================
// SELECTION STATE
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsuranceChoice {
    NoInsurance,
    Plan(Uuid),
}

impl InsuranceChoice {
    pub fn plan_id(&self) -> Option<Uuid> {
        match self {
            InsuranceChoice::NoInsurance => None,
            InsuranceChoice::Plan(id) => Some(*id),
        }
    }
}

impl From<Option<Uuid>> for InsuranceChoice {
    fn from(plan_id: Option<Uuid>) -> Self {
        plan_id.map_or(InsuranceChoice::NoInsurance, InsuranceChoice::Plan)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

/// Everything chosen so far in one booking session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSelection {
    pub team_member_id: Option<Uuid>,
    pub insurance: Option<InsuranceChoice>,
    pub service_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub client_name: Option<String>,
    pub client_email: Option<String>,
    pub client_phone: Option<String>,
    pub notes: Option<String>,
}

impl BookingSelection {
    pub fn insurance_plan_id(&self) -> Option<Uuid> {
        self.insurance.and_then(|choice| choice.plan_id())
    }

    /// Clears the fields owned by `step`.
    pub(crate) fn clear_step(&mut self, step: BookingStep) {
        match step {
            BookingStep::TeamMember => self.team_member_id = None,
            BookingStep::Insurance => self.insurance = None,
            BookingStep::Service => self.service_id = None,
            BookingStep::Date => self.date = None,
            BookingStep::Time => {
                self.start_time = None;
                self.end_time = None;
            }
            BookingStep::ClientInfo => {
                self.client_name = None;
                self.client_email = None;
                self.client_phone = None;
                self.notes = None;
            }
            BookingStep::Confirmation => {}
        }
    }
}

/// A single write into the selection; the step it belongs to decides what gets cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionUpdate {
    TeamMember(Uuid),
    Insurance(InsuranceChoice),
    Service(Uuid),
    Date(NaiveDate),
    Time { start_time: String, end_time: String },
    ClientInfo(ClientInfo),
}

impl SelectionUpdate {
    pub fn step(&self) -> BookingStep {
        match self {
            SelectionUpdate::TeamMember(_) => BookingStep::TeamMember,
            SelectionUpdate::Insurance(_) => BookingStep::Insurance,
            SelectionUpdate::Service(_) => BookingStep::Service,
            SelectionUpdate::Date(_) => BookingStep::Date,
            SelectionUpdate::Time { .. } => BookingStep::Time,
            SelectionUpdate::ClientInfo(_) => BookingStep::ClientInfo,
        }
    }
}

// ==============================================================================
// ORCHESTRATION
// ==============================================================================

/// Public booking page vs. staff booking a walk-in from the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingMode {
    #[default]
    Client,
    Admin,
}

impl BookingMode {
    pub fn source(&self) -> AppointmentSource {
        match self {
            BookingMode::Client => AppointmentSource::Client,
            BookingMode::Admin => AppointmentSource::Manual,
        }
    }
}

/// Snapshot of the read collections for one professional.
#[derive(Debug, Clone, Default)]
pub struct BookingData {
    pub team_members: Vec<TeamMember>,
    pub services: Vec<Service>,
    pub team_member_services: Vec<TeamMemberService>,
    pub insurance_plans: Vec<InsurancePlan>,
    pub team_member_insurance_plans: Vec<TeamMemberInsurancePlan>,
    pub slot_templates: Vec<SlotTemplate>,
    pub appointments: Vec<Appointment>,
}

// ==============================================================================
// HTTP REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub team_member_id: Uuid,
    pub insurance_plan_id: Option<Uuid>,
    pub service_id: Uuid,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub mode: BookingMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingConfirmation {
    pub appointment_id: Uuid,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub team_member_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvalidateCacheRequest {
    pub collection: Option<CollectionKind>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookingError {
    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error("Monthly appointment limit of the free plan has been reached")]
    FreeTierLimitReached,

    #[error("Insurance plan has reached its appointment limit")]
    InsuranceLimitReached { plan_id: Uuid },

    #[error("Team member does not accept this insurance plan")]
    InsuranceNotAccepted { plan_id: Uuid, team_member_id: Uuid },

    #[error("This time slot is no longer available, please choose another")]
    SlotUnavailable,

    #[error("Cannot change appointment status from {from} to {to}")]
    InvalidStatusTransition { from: AppointmentStatus, to: AppointmentStatus },

    #[error("Appointment not found")]
    NotFound,

    #[error("Could not load {0}")]
    DataUnavailable(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Operation aborted")]
    Aborted,

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl BookingError {
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BookingError::MissingField { .. }
                | BookingError::InvalidEmail(_)
                | BookingError::InvalidTime(_)
        )
    }

    pub fn is_quota(&self) -> bool {
        matches!(
            self,
            BookingError::FreeTierLimitReached
                | BookingError::InsuranceLimitReached { .. }
                | BookingError::InsuranceNotAccepted { .. }
        )
    }

    /// Text shown next to the form. Infrastructure failures collapse into a generic message.
    pub fn user_message(&self) -> String {
        match self {
            BookingError::DatabaseError(_)
            | BookingError::ExternalServiceError(_)
            | BookingError::Unexpected(_) => {
                "Something went wrong while booking, please try again".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<BookingError> for AppError {
    fn from(error: BookingError) -> Self {
        match error {
            e if e.is_validation() => AppError::ValidationError(e.to_string()),
            e if e.is_quota() => AppError::Forbidden(e.to_string()),
            BookingError::SlotUnavailable => AppError::Conflict(BookingError::SlotUnavailable.to_string()),
            e @ BookingError::InvalidStatusTransition { .. } => AppError::BadRequest(e.to_string()),
            BookingError::NotFound => AppError::NotFound("Appointment not found".to_string()),
            BookingError::DataUnavailable(what) => AppError::ServiceUnavailable(format!("Could not load {}", what)),
            BookingError::DatabaseError(msg) => AppError::Database(msg),
            BookingError::ExternalServiceError(msg) => AppError::ExternalService(msg),
            e => AppError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_table_round_trip() {
        for (index, step) in BookingStep::ORDER.iter().enumerate() {
            assert_eq!(step.index(), index);
            assert_eq!(BookingStep::at(index), Some(*step));
        }
        assert_eq!(BookingStep::at(BookingStep::ORDER.len()), None);
    }

    #[test]
    fn test_step_neighbours() {
        assert_eq!(BookingStep::TeamMember.previous(), None);
        assert_eq!(BookingStep::TeamMember.next(), Some(BookingStep::Insurance));
        assert_eq!(BookingStep::Insurance.next(), Some(BookingStep::Service));
        assert_eq!(BookingStep::Confirmation.next(), None);
        assert_eq!(BookingStep::first(), BookingStep::TeamMember);
        assert_eq!(BookingStep::last(), BookingStep::Confirmation);
    }

    #[test]
    fn test_step_names() {
        assert_eq!(BookingStep::ClientInfo.to_string(), "client-info");
        assert_eq!(serde_json::to_value(BookingStep::TeamMember).unwrap(), "team-member");
    }

    #[test]
    fn test_error_mapping() {
        assert!(matches!(
            AppError::from(BookingError::MissingField { field: "client_email" }),
            AppError::ValidationError(_)
        ));
        assert!(matches!(AppError::from(BookingError::FreeTierLimitReached), AppError::Forbidden(_)));
        assert!(matches!(AppError::from(BookingError::SlotUnavailable), AppError::Conflict(_)));
        assert!(matches!(
            AppError::from(BookingError::DataUnavailable("slot templates".into())),
            AppError::ServiceUnavailable(_)
        ));
        assert!(matches!(AppError::from(BookingError::Unexpected("x".into())), AppError::Internal(_)));
    }

    #[test]
    fn test_user_message_hides_infrastructure_detail() {
        let message = BookingError::DatabaseError("connection reset by peer".into()).user_message();
        assert!(!message.contains("connection reset"));
        assert_eq!(
            BookingError::MissingField { field: "client_name" }.user_message(),
            "client_name is required"
        );
    }
}
