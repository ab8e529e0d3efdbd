// libs/shared/models/src/booking.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// SCHEDULE TEMPLATES
// ==============================================================================

/// Recurring weekly availability window for one team member.
///
/// Times are `"HH:MM"` (a trailing `":SS"` from Postgres `time` columns is tolerated).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotTemplate {
    pub id: Uuid,
    pub professional_id: Uuid,
    pub team_member_id: Uuid,
    /// 0 = Sunday ... 6 = Saturday
    pub day_of_week: u8,
    pub start_time: String,
    pub end_time: String,
    #[serde(alias = "appointment_duration")]
    pub appointment_duration_minutes: u32,
    #[serde(default)]
    pub lunch_break_start: Option<String>,
    #[serde(default)]
    pub lunch_break_end: Option<String>,
    #[serde(alias = "is_available", default = "default_true")]
    pub available: bool,
}

fn default_true() -> bool {
    true
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    #[serde(alias = "cancelled")]
    Canceled,
    NoShow,
}

impl AppointmentStatus {
    /// Only `scheduled` appointments occupy a slot.
    pub fn blocks_slot(&self) -> bool {
        matches!(self, AppointmentStatus::Scheduled)
    }

    pub fn valid_transitions(&self) -> &'static [AppointmentStatus] {
        match self {
            AppointmentStatus::Scheduled => &[
                AppointmentStatus::Completed,
                AppointmentStatus::Canceled,
                AppointmentStatus::NoShow,
            ],
            // Terminal states
            AppointmentStatus::Completed
            | AppointmentStatus::Canceled
            | AppointmentStatus::NoShow => &[],
        }
    }

    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Canceled => write!(f, "canceled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

/// Who created the appointment: the public booking page or staff at the desk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentSource {
    Client,
    Manual,
}

impl fmt::Display for AppointmentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentSource::Client => write!(f, "client"),
            AppointmentSource::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub professional_id: Uuid,
    #[serde(default)]
    pub team_member_id: Option<Uuid>,
    pub client_name: String,
    pub client_email: String,
    #[serde(default)]
    pub client_phone: Option<String>,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub status: AppointmentStatus,
    pub source: AppointmentSource,
    #[serde(default)]
    pub service_id: Option<Uuid>,
    #[serde(default)]
    pub insurance_plan_id: Option<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
}

/// Row sent to storage on confirmation; `id` is assigned by the database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewAppointment {
    pub professional_id: Uuid,
    pub team_member_id: Option<Uuid>,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: Option<String>,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub status: AppointmentStatus,
    pub source: AppointmentSource,
    pub service_id: Option<Uuid>,
    pub insurance_plan_id: Option<Uuid>,
    pub notes: Option<String>,
    pub price: Option<f64>,
}

impl NewAppointment {
    pub fn into_appointment(self, id: Uuid) -> Appointment {
        Appointment {
            id,
            professional_id: self.professional_id,
            team_member_id: self.team_member_id,
            client_name: self.client_name,
            client_email: self.client_email,
            client_phone: self.client_phone,
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            status: self.status,
            source: self.source,
            service_id: self.service_id,
            insurance_plan_id: self.insurance_plan_id,
            notes: self.notes,
            price: self.price,
        }
    }
}

// ==============================================================================
// CATALOG: TEAM, SERVICES, INSURANCE
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamMember {
    pub id: Uuid,
    pub professional_id: Uuid,
    pub name: String,
    #[serde(alias = "is_active", default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub id: Uuid,
    pub professional_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(alias = "is_active", default = "default_true")]
    pub active: bool,
}

/// Assignment of a service to the team member who performs it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamMemberService {
    pub team_member_id: Uuid,
    pub service_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InsurancePlan {
    pub id: Uuid,
    pub professional_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub limit_per_plan: Option<i32>,
    #[serde(default)]
    pub current_appointments: i32,
}

impl InsurancePlan {
    /// `None` limit means unlimited.
    pub fn has_capacity(&self) -> bool {
        self.limit_per_plan
            .map_or(true, |limit| self.current_appointments < limit)
    }
}

/// Per-team-member sub-quota layered on top of the plan-wide quota.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TeamMemberInsurancePlan {
    pub id: Uuid,
    pub team_member_id: Uuid,
    pub insurance_plan_id: Uuid,
    #[serde(default)]
    pub limit_per_member: Option<i32>,
    #[serde(default)]
    pub current_appointments: i32,
}

impl TeamMemberInsurancePlan {
    pub fn has_capacity(&self) -> bool {
        self.limit_per_member
            .map_or(true, |limit| self.current_appointments < limit)
    }
}

// ==============================================================================
// SUBSCRIPTION
// ==============================================================================

/// Response of the subscription-check function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionStatus {
    #[serde(alias = "is_premium")]
    pub is_premium: bool,
    #[serde(alias = "monthly_appointments", default)]
    pub monthly_appointments: u32,
    #[serde(alias = "is_within_free_limit", default)]
    pub is_within_free_limit: bool,
    #[serde(alias = "free_limit", default)]
    pub free_limit: Option<u32>,
}

impl SubscriptionStatus {
    /// Premium plans are unlimited; free plans compare the monthly count to the threshold.
    pub fn allows_booking(&self) -> bool {
        if self.is_premium {
            return true;
        }
        match self.free_limit {
            Some(limit) => self.monthly_appointments < limit,
            None => self.is_within_free_limit,
        }
    }
}
