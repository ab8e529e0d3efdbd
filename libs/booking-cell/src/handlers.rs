// libs/booking-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::SupabaseClient;
use shared_models::error::AppError;

use crate::models::{
    BookingConfirmation, BookingError, BookingMode, BookingRequest, ClientInfo, InvalidateCacheRequest,
    SelectionUpdate, SlotsQuery, StatusUpdateRequest,
};
use crate::services::{
    BookingOrchestrator, BookingRepository, Clock, SubscriptionProvider, SupabaseBookingRepository,
    SupabaseSubscriptionProvider, SystemClock,
};

// ==============================================================================
// STATE
// ==============================================================================

/// Shared collaborators; every request builds its own orchestrator on top of them.
pub struct BookingCellState {
    pub settings: shared_config::BookingSettings,
    pub repository: Arc<dyn BookingRepository>,
    pub subscriptions: Arc<dyn SubscriptionProvider>,
    pub clock: Arc<dyn Clock>,
}

impl BookingCellState {
    pub fn new(
        settings: shared_config::BookingSettings,
        repository: Arc<dyn BookingRepository>,
        subscriptions: Arc<dyn SubscriptionProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings,
            repository,
            subscriptions,
            clock,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let subscriptions = SupabaseSubscriptionProvider::new(
            Arc::new(SupabaseClient::new(config)),
            config.supabase_service_role_key.clone(),
        );

        Self::new(
            config.booking.clone(),
            Arc::new(SupabaseBookingRepository::from_config(config)),
            Arc::new(subscriptions),
            Arc::new(SystemClock),
        )
    }

    fn orchestrator(&self, professional_id: Uuid, mode: BookingMode) -> BookingOrchestrator {
        BookingOrchestrator::with_clock(
            professional_id,
            mode,
            Arc::clone(&self.repository),
            Arc::clone(&self.subscriptions),
            self.settings.clone(),
            Arc::clone(&self.clock),
        )
    }

    /// Orchestrator with fresh data and the team member already selected.
    async fn loaded_for(&self, professional_id: Uuid, team_member_id: Uuid, mode: BookingMode) -> BookingOrchestrator {
        let mut orchestrator = self.orchestrator(professional_id, mode);
        orchestrator.refresh_data().await;
        orchestrator.select(SelectionUpdate::TeamMember(team_member_id)).await;
        orchestrator
    }
}

// ==============================================================================
// AVAILABILITY HANDLERS
// ==============================================================================

pub async fn get_available_dates(
    State(state): State<Arc<BookingCellState>>,
    Path((professional_id, team_member_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    let orchestrator = state.loaded_for(professional_id, team_member_id, BookingMode::Client).await;
    let dates = orchestrator.available_dates().await;

    Ok(Json(json!({
        "team_member_id": team_member_id,
        "dates": dates,
        "total": dates.len(),
        "warning": orchestrator.error().await
    })))
}

pub async fn get_available_slots(
    State(state): State<Arc<BookingCellState>>,
    Path((professional_id, team_member_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let mut orchestrator = state.loaded_for(professional_id, team_member_id, BookingMode::Client).await;
    orchestrator.select(SelectionUpdate::Date(query.date)).await;
    let slots = orchestrator.available_slots().await;

    Ok(Json(json!({
        "team_member_id": team_member_id,
        "date": query.date,
        "slots": slots,
        "total": slots.len(),
        "warning": orchestrator.error().await
    })))
}

pub async fn get_team_member_services(
    State(state): State<Arc<BookingCellState>>,
    Path((professional_id, team_member_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    let orchestrator = state.loaded_for(professional_id, team_member_id, BookingMode::Client).await;
    let services = orchestrator.available_services_for_team_member(team_member_id);

    Ok(Json(json!({
        "team_member_id": team_member_id,
        "services": services,
        "total": services.len()
    })))
}

pub async fn get_team_member_insurance_plans(
    State(state): State<Arc<BookingCellState>>,
    Path((professional_id, team_member_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Value>, AppError> {
    let orchestrator = state.loaded_for(professional_id, team_member_id, BookingMode::Client).await;
    let plans = orchestrator.available_insurance_plans_for_team_member(team_member_id);

    Ok(Json(json!({
        "team_member_id": team_member_id,
        "insurance_plans": plans,
        "total": plans.len()
    })))
}

// ==============================================================================
// BOOKING HANDLERS
// ==============================================================================

/// Walks the step machine with the submitted selection and completes the booking.
#[axum::debug_handler]
pub async fn create_booking(
    State(state): State<Arc<BookingCellState>>,
    Path(professional_id): Path<Uuid>,
    Json(request): Json<BookingRequest>,
) -> Result<(StatusCode, Json<BookingConfirmation>), AppError> {
    let mut orchestrator = state
        .loaded_for(professional_id, request.team_member_id, request.mode)
        .await;

    orchestrator
        .select(SelectionUpdate::Insurance(request.insurance_plan_id.into()))
        .await;
    orchestrator.select(SelectionUpdate::Service(request.service_id)).await;
    orchestrator.select(SelectionUpdate::Date(request.date)).await;
    orchestrator
        .select(SelectionUpdate::Time {
            start_time: request.start_time.clone(),
            end_time: request.end_time.clone(),
        })
        .await;
    orchestrator
        .select(SelectionUpdate::ClientInfo(ClientInfo {
            name: request.client_name.clone(),
            email: request.client_email.clone(),
            phone: request.client_phone.clone(),
            notes: request.notes.clone(),
        }))
        .await;

    // Public pages may only book what they were shown; staff can book walk-ins outside the templates.
    if request.mode == BookingMode::Client {
        let offered = orchestrator
            .available_slots()
            .await
            .iter()
            .any(|slot| slot.start_time == request.start_time && slot.end_time == request.end_time);
        if !offered {
            debug!("Slot {}-{} on {} is not offered", request.start_time, request.end_time, request.date);
            return Err(BookingError::SlotUnavailable.into());
        }
    }

    let appointment_id = orchestrator.complete_booking().await?;

    Ok((
        StatusCode::CREATED,
        Json(BookingConfirmation {
            appointment_id,
            date: request.date,
            start_time: request.start_time,
            end_time: request.end_time,
            team_member_id: request.team_member_id,
        }),
    ))
}

pub async fn update_appointment_status(
    State(state): State<Arc<BookingCellState>>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<Value>, AppError> {
    let current = state.repository.get_appointment(appointment_id).await?;

    let mut orchestrator = state.orchestrator(current.professional_id, BookingMode::Admin);
    let updated = orchestrator
        .update_appointment_status(appointment_id, request.status)
        .await?;

    Ok(Json(json!({
        "appointment": updated,
        "previous_status": current.status
    })))
}

pub async fn invalidate_cache(
    State(state): State<Arc<BookingCellState>>,
    Path(professional_id): Path<Uuid>,
    Json(request): Json<InvalidateCacheRequest>,
) -> Result<Json<Value>, AppError> {
    let collection = request.collection;
    state.repository.invalidate(professional_id, collection).await;

    info!("Cache invalidated for professional {} ({:?})", professional_id, collection);
    Ok(Json(json!({
        "professional_id": professional_id,
        "invalidated": collection.map_or_else(|| "all".to_string(), |c| c.to_string())
    })))
}
