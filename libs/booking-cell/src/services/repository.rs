// libs/booking-cell/src/services/repository.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{
    supabase::return_representation, CollectionKind, ReadCache, RequestPriority, RequestQueue,
    SupabaseClient, SupabaseError,
};
use shared_models::{
    Appointment, AppointmentStatus, InsurancePlan, NewAppointment, Service, SlotTemplate,
    TeamMember, TeamMemberInsurancePlan, TeamMemberService,
};

use crate::models::BookingError;

/// Narrow storage boundary of the booking core.
///
/// List operations are scoped by professional and may be served from a short-lived cache.
/// Single-row lookups used for quota and conflict decisions always hit storage.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn list_team_members(&self, professional_id: Uuid) -> Result<Vec<TeamMember>, BookingError>;

    async fn list_services(&self, professional_id: Uuid) -> Result<Vec<Service>, BookingError>;

    async fn list_team_member_services(&self, professional_id: Uuid) -> Result<Vec<TeamMemberService>, BookingError>;

    async fn list_insurance_plans(&self, professional_id: Uuid) -> Result<Vec<InsurancePlan>, BookingError>;

    async fn list_team_member_insurance_plans(&self, professional_id: Uuid) -> Result<Vec<TeamMemberInsurancePlan>, BookingError>;

    async fn list_slot_templates(&self, professional_id: Uuid) -> Result<Vec<SlotTemplate>, BookingError>;

    /// Scheduled appointments on or after `from`.
    async fn list_upcoming_appointments(&self, professional_id: Uuid, from: NaiveDate) -> Result<Vec<Appointment>, BookingError>;

    async fn get_insurance_plan(&self, plan_id: Uuid) -> Result<Option<InsurancePlan>, BookingError>;

    async fn get_team_member_insurance_plan(
        &self,
        team_member_id: Uuid,
        plan_id: Uuid,
    ) -> Result<Option<TeamMemberInsurancePlan>, BookingError>;

    /// Uncached read of scheduled appointments for one team member and day.
    async fn find_scheduled_appointments(
        &self,
        professional_id: Uuid,
        team_member_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, BookingError>;

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, BookingError>;

    /// Fails with `SlotUnavailable` when storage rejects a second scheduled row for the same slot.
    async fn insert_appointment(&self, appointment: NewAppointment) -> Result<Uuid, BookingError>;

    async fn update_appointment_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, BookingError>;

    async fn invalidate(&self, professional_id: Uuid, kind: Option<CollectionKind>);
}

// ==============================================================================
// SUPABASE IMPLEMENTATION
// ==============================================================================

pub struct SupabaseBookingRepository {
    supabase: Arc<SupabaseClient>,
    cache: Arc<ReadCache>,
    queue: RequestQueue,
    auth_token: Option<String>,
}

const CACHE_CAPACITY: usize = 256;

impl SupabaseBookingRepository {
    pub fn new(
        supabase: Arc<SupabaseClient>,
        cache: Arc<ReadCache>,
        queue: RequestQueue,
        auth_token: Option<String>,
    ) -> Self {
        Self {
            supabase,
            cache,
            queue,
            auth_token,
        }
    }

    /// Builds the client, cache and queue from configuration. Uses the service role key when present.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            Arc::new(SupabaseClient::new(config)),
            Arc::new(ReadCache::new(config.booking.cache_ttl(), CACHE_CAPACITY)),
            RequestQueue::from_settings(&config.booking),
            config.supabase_service_role_key.clone(),
        )
    }

    pub fn cache(&self) -> &Arc<ReadCache> {
        &self.cache
    }

    fn token(&self) -> Option<&str> {
        self.auth_token.as_deref()
    }

    fn priority(kind: CollectionKind) -> RequestPriority {
        match kind {
            CollectionKind::TeamMembers | CollectionKind::Services => RequestPriority::Essential,
            _ => RequestPriority::Deferred,
        }
    }

    fn collection_path(kind: CollectionKind, professional_id: Uuid) -> String {
        match kind {
            CollectionKind::TeamMembers => format!(
                "/rest/v1/team_members?professional_id=eq.{}&active=eq.true&order=name.asc",
                professional_id
            ),
            CollectionKind::Services => format!(
                "/rest/v1/services?professional_id=eq.{}&active=eq.true&order=name.asc",
                professional_id
            ),
            CollectionKind::TeamMemberServices => format!(
                "/rest/v1/team_member_services?select=team_member_id,service_id,team_members!inner(professional_id)&team_members.professional_id=eq.{}",
                professional_id
            ),
            CollectionKind::InsurancePlans => format!(
                "/rest/v1/insurance_plans?professional_id=eq.{}&order=name.asc",
                professional_id
            ),
            CollectionKind::TeamMemberInsurancePlans => format!(
                "/rest/v1/team_member_insurance_plans?select=*,team_members!inner(professional_id)&team_members.professional_id=eq.{}",
                professional_id
            ),
            CollectionKind::SlotTemplates => format!(
                "/rest/v1/time_slots?professional_id=eq.{}&order=day_of_week.asc,start_time.asc",
                professional_id
            ),
            CollectionKind::Appointments => format!(
                "/rest/v1/appointments?professional_id=eq.{}&status=eq.scheduled&order=date.asc,start_time.asc",
                professional_id
            ),
        }
    }

    /// Cache first, then one retried fetch through the request queue.
    async fn fetch_collection<T: DeserializeOwned + Send>(
        &self,
        professional_id: Uuid,
        kind: CollectionKind,
        path: String,
    ) -> Result<Vec<T>, BookingError> {
        let rows = match self.cache.get(professional_id, kind).await {
            Some(rows) => {
                debug!("Cache hit for {} of professional {}", kind, professional_id);
                rows
            }
            None => {
                let label = format!("list {}", kind);
                let supabase = &self.supabase;
                let path = path.as_str();
                let token = self.token();

                let rows: Vec<Value> = self
                    .queue
                    .run(Self::priority(kind), &label, move || {
                        supabase.request(Method::GET, path, token, None)
                    })
                    .await
                    .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

                self.cache.insert(professional_id, kind, rows.clone()).await;
                rows
            }
        };

        parse_rows(rows, kind)
    }

    /// Single uncached read, retried but not queued.
    async fn fetch_rows<T: DeserializeOwned + Send>(&self, label: &str, path: String) -> Result<Vec<T>, BookingError> {
        let supabase = &self.supabase;
        let path = path.as_str();
        let token = self.token();

        let rows: Vec<Value> = self
            .queue
            .run(RequestPriority::Essential, label, move || {
                supabase.request(Method::GET, path, token, None)
            })
            .await
            .map_err(|e| BookingError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| BookingError::DatabaseError(format!("Failed to parse {}: {}", label, e)))
            })
            .collect()
    }
}

fn parse_rows<T: DeserializeOwned>(rows: Vec<Value>, kind: CollectionKind) -> Result<Vec<T>, BookingError> {
    let total = rows.len();
    let parsed: Vec<T> = rows
        .into_iter()
        .filter_map(|row| match serde_json::from_value(row) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Skipping malformed {} row: {}", kind, e);
                None
            }
        })
        .collect();

    if parsed.is_empty() && total > 0 {
        return Err(BookingError::DatabaseError(format!("Failed to parse {}", kind)));
    }
    Ok(parsed)
}

fn map_write_error(e: anyhow::Error) -> BookingError {
    match shared_database::error::classify(&e) {
        Some(SupabaseError::Conflict(_)) => BookingError::SlotUnavailable,
        Some(SupabaseError::NotFound(_)) => BookingError::NotFound,
        _ => BookingError::DatabaseError(e.to_string()),
    }
}

#[async_trait]
impl BookingRepository for SupabaseBookingRepository {
    async fn list_team_members(&self, professional_id: Uuid) -> Result<Vec<TeamMember>, BookingError> {
        let kind = CollectionKind::TeamMembers;
        self.fetch_collection(professional_id, kind, Self::collection_path(kind, professional_id)).await
    }

    async fn list_services(&self, professional_id: Uuid) -> Result<Vec<Service>, BookingError> {
        let kind = CollectionKind::Services;
        self.fetch_collection(professional_id, kind, Self::collection_path(kind, professional_id)).await
    }

    async fn list_team_member_services(&self, professional_id: Uuid) -> Result<Vec<TeamMemberService>, BookingError> {
        let kind = CollectionKind::TeamMemberServices;
        self.fetch_collection(professional_id, kind, Self::collection_path(kind, professional_id)).await
    }

    async fn list_insurance_plans(&self, professional_id: Uuid) -> Result<Vec<InsurancePlan>, BookingError> {
        let kind = CollectionKind::InsurancePlans;
        self.fetch_collection(professional_id, kind, Self::collection_path(kind, professional_id)).await
    }

    async fn list_team_member_insurance_plans(&self, professional_id: Uuid) -> Result<Vec<TeamMemberInsurancePlan>, BookingError> {
        let kind = CollectionKind::TeamMemberInsurancePlans;
        self.fetch_collection(professional_id, kind, Self::collection_path(kind, professional_id)).await
    }

    async fn list_slot_templates(&self, professional_id: Uuid) -> Result<Vec<SlotTemplate>, BookingError> {
        let kind = CollectionKind::SlotTemplates;
        self.fetch_collection(professional_id, kind, Self::collection_path(kind, professional_id)).await
    }

    async fn list_upcoming_appointments(&self, professional_id: Uuid, from: NaiveDate) -> Result<Vec<Appointment>, BookingError> {
        let kind = CollectionKind::Appointments;
        let path = format!("{}&date=gte.{}", Self::collection_path(kind, professional_id), from);

        let appointments: Vec<Appointment> = self.fetch_collection(professional_id, kind, path).await?;

        // Cached rows may predate a change of day.
        Ok(appointments.into_iter().filter(|a| a.date >= from).collect())
    }

    async fn get_insurance_plan(&self, plan_id: Uuid) -> Result<Option<InsurancePlan>, BookingError> {
        let path = format!("/rest/v1/insurance_plans?id=eq.{}", plan_id);
        let plans: Vec<InsurancePlan> = self.fetch_rows("insurance plan", path).await?;
        Ok(plans.into_iter().next())
    }

    async fn get_team_member_insurance_plan(
        &self,
        team_member_id: Uuid,
        plan_id: Uuid,
    ) -> Result<Option<TeamMemberInsurancePlan>, BookingError> {
        let path = format!(
            "/rest/v1/team_member_insurance_plans?team_member_id=eq.{}&insurance_plan_id=eq.{}",
            team_member_id, plan_id
        );
        let associations: Vec<TeamMemberInsurancePlan> =
            self.fetch_rows("team member insurance plan", path).await?;
        Ok(associations.into_iter().next())
    }

    async fn find_scheduled_appointments(
        &self,
        professional_id: Uuid,
        team_member_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, BookingError> {
        let path = format!(
            "/rest/v1/appointments?professional_id=eq.{}&team_member_id=eq.{}&date=eq.{}&status=eq.scheduled&order=start_time.asc",
            professional_id, team_member_id, date
        );
        self.fetch_rows("scheduled appointments", path).await
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let appointments: Vec<Appointment> = self.fetch_rows("appointment", path).await?;
        appointments.into_iter().next().ok_or(BookingError::NotFound)
    }

    async fn insert_appointment(&self, appointment: NewAppointment) -> Result<Uuid, BookingError> {
        let professional_id = appointment.professional_id;
        let body = serde_json::to_value(&appointment)
            .map_err(|e| BookingError::Unexpected(format!("Failed to encode appointment: {}", e)))?;

        // Writes are never retried: a lost response must not produce a second row.
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                self.token(),
                Some(body),
                Some(return_representation()),
            )
            .await
            .map_err(map_write_error)?;

        let created: Appointment = result
            .into_iter()
            .next()
            .ok_or_else(|| BookingError::DatabaseError("Failed to create appointment".to_string()))
            .and_then(|row| {
                serde_json::from_value(row).map_err(|e| {
                    BookingError::DatabaseError(format!("Failed to parse created appointment: {}", e))
                })
            })?;

        self.cache
            .invalidate(professional_id, Some(CollectionKind::Appointments))
            .await;

        info!("Appointment {} created for professional {}", created.id, professional_id);
        Ok(created.id)
    }

    async fn update_appointment_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, BookingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                self.token(),
                Some(json!({ "status": status })),
                Some(return_representation()),
            )
            .await
            .map_err(map_write_error)?;

        let updated: Appointment = match result.into_iter().next() {
            Some(row) => serde_json::from_value(row).map_err(|e| {
                BookingError::DatabaseError(format!("Failed to parse updated appointment: {}", e))
            })?,
            None => return Err(BookingError::NotFound),
        };

        self.cache
            .invalidate(updated.professional_id, Some(CollectionKind::Appointments))
            .await;

        info!("Appointment {} is now {}", appointment_id, status);
        Ok(updated)
    }

    async fn invalidate(&self, professional_id: Uuid, kind: Option<CollectionKind>) {
        self.cache.invalidate(professional_id, kind).await;
    }
}
