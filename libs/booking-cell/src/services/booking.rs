// libs/booking-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::NaiveDate;
use futures::future::{AbortRegistration, Abortable};
use regex::Regex;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use scheduling_cell::{do_overlap, time_to_minutes, AvailabilityCalculator, AvailableSlot};
use shared_config::BookingSettings;
use shared_database::CollectionKind;
use shared_models::{
    Appointment, AppointmentStatus, InsurancePlan, NewAppointment, Service,
};

use crate::models::{BookingData, BookingError, BookingMode, BookingSelection, BookingStep, SelectionUpdate};
use crate::services::clock::{Clock, SystemClock};
use crate::services::flow::BookingFlow;
use crate::services::quota::{QuotaGuard, SubscriptionProvider};
use crate::services::repository::BookingRepository;

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$";

/// Fields that must be present before a booking can be written.
struct ValidatedBooking {
    team_member_id: Uuid,
    date: NaiveDate,
    start_time: String,
    end_time: String,
    start_minutes: u32,
    end_minutes: u32,
    client_name: String,
    client_email: String,
}

/// Dates and slots derived from the snapshot for the current selection.
#[derive(Debug, Default)]
struct Availability {
    dates: Vec<NaiveDate>,
    slots: Vec<AvailableSlot>,
}

impl Availability {
    fn clear(&mut self) {
        self.dates.clear();
        self.slots.clear();
    }
}

/// One booking session for one professional.
///
/// Owns the step machine, the read snapshot it derives availability from, and the write path.
pub struct BookingOrchestrator {
    professional_id: Uuid,
    mode: BookingMode,
    repository: Arc<dyn BookingRepository>,
    quota_guard: QuotaGuard,
    calculator: AvailabilityCalculator,
    clock: Arc<dyn Clock>,
    settings: BookingSettings,
    email_regex: Option<Regex>,
    data: BookingData,
    flow: Arc<RwLock<BookingFlow>>,
    availability: Arc<RwLock<Availability>>,
    is_loading: bool,
    pending_reset: Option<JoinHandle<()>>,
}

impl BookingOrchestrator {
    pub fn new(
        professional_id: Uuid,
        mode: BookingMode,
        repository: Arc<dyn BookingRepository>,
        subscriptions: Arc<dyn SubscriptionProvider>,
        settings: BookingSettings,
    ) -> Self {
        Self::with_clock(professional_id, mode, repository, subscriptions, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        professional_id: Uuid,
        mode: BookingMode,
        repository: Arc<dyn BookingRepository>,
        subscriptions: Arc<dyn SubscriptionProvider>,
        settings: BookingSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            professional_id,
            mode,
            quota_guard: QuotaGuard::new(Arc::clone(&repository), subscriptions),
            repository,
            calculator: AvailabilityCalculator::new(),
            clock,
            settings,
            email_regex: Regex::new(EMAIL_PATTERN).ok(),
            data: BookingData::default(),
            flow: Arc::new(RwLock::new(BookingFlow::new())),
            availability: Arc::new(RwLock::new(Availability::default())),
            is_loading: false,
            pending_reset: None,
        }
    }

    // ==============================================================================
    // READ SIDE
    // ==============================================================================

    /// Reloads every collection. Failed reads degrade to empty and surface through the flow error.
    pub async fn refresh_data(&mut self) {
        self.is_loading = true;
        let (data, failed) = self.load().await;
        self.apply_loaded(data, failed).await;
    }

    /// Like [`Self::refresh_data`], but an abort discards the in-flight result untouched.
    pub async fn refresh_data_abortable(&mut self, registration: AbortRegistration) -> Result<(), BookingError> {
        self.is_loading = true;
        let loaded = Abortable::new(self.load(), registration).await;

        match loaded {
            Ok((data, failed)) => {
                self.apply_loaded(data, failed).await;
                Ok(())
            }
            Err(_) => {
                debug!("Refresh for professional {} aborted", self.professional_id);
                self.is_loading = false;
                Err(BookingError::Aborted)
            }
        }
    }

    async fn load(&self) -> (BookingData, Vec<&'static str>) {
        let professional_id = self.professional_id;
        let repository = &self.repository;
        let today = self.clock.now().date();
        let mut failed = Vec::new();

        // Team members and services render the first step; request them before the rest.
        let (team_members, services) = futures::join!(
            repository.list_team_members(professional_id),
            repository.list_services(professional_id),
        );

        let (team_member_services, insurance_plans, team_member_insurance_plans, slot_templates, appointments) = futures::join!(
            repository.list_team_member_services(professional_id),
            repository.list_insurance_plans(professional_id),
            repository.list_team_member_insurance_plans(professional_id),
            repository.list_slot_templates(professional_id),
            repository.list_upcoming_appointments(professional_id, today),
        );

        let data = BookingData {
            team_members: or_empty(team_members, "team members", &mut failed),
            services: or_empty(services, "services", &mut failed),
            team_member_services: or_empty(team_member_services, "service assignments", &mut failed),
            insurance_plans: or_empty(insurance_plans, "insurance plans", &mut failed),
            team_member_insurance_plans: or_empty(team_member_insurance_plans, "insurance assignments", &mut failed),
            slot_templates: or_empty(slot_templates, "slot templates", &mut failed),
            appointments: or_empty(appointments, "appointments", &mut failed),
        };

        (data, failed)
    }

    async fn apply_loaded(&mut self, data: BookingData, failed: Vec<&'static str>) {
        self.data = data;
        self.is_loading = false;

        if !failed.is_empty() {
            let error = BookingError::DataUnavailable(failed.join(", "));
            self.flow.write().await.set_error(error.to_string());
        }

        self.recompute_availability().await;
    }

    async fn reload_appointments(&mut self) {
        let today = self.clock.now().date();
        self.repository
            .invalidate(self.professional_id, Some(CollectionKind::Appointments))
            .await;

        match self.repository.list_upcoming_appointments(self.professional_id, today).await {
            Ok(appointments) => self.data.appointments = appointments,
            Err(e) => warn!("Could not reload appointments for professional {}: {}", self.professional_id, e),
        }
        self.recompute_availability().await;
    }

    /// Re-derives available dates and slots from the current snapshot and selection.
    pub async fn recompute_availability(&mut self) {
        let selection = self.flow.read().await.selection().clone();

        let Some(team_member_id) = selection.team_member_id else {
            self.availability.write().await.clear();
            return;
        };

        let now = self.clock.now();
        let dates = self.calculator.compute_available_dates(
            &self.data.slot_templates,
            &self.data.appointments,
            team_member_id,
            self.settings.lookahead_days,
            now,
        );

        let slots = match selection.date {
            Some(date) => self.calculator.bookable_slots(
                &self.data.slot_templates,
                &self.data.appointments,
                team_member_id,
                date,
                now,
            ),
            None => Vec::new(),
        };

        *self.availability.write().await = Availability { dates, slots };
    }

    /// Active services the team member performs. Without any assignment rows every active service is offered.
    pub fn available_services_for_team_member(&self, team_member_id: Uuid) -> Vec<Service> {
        let assignments = &self.data.team_member_services;

        self.data
            .services
            .iter()
            .filter(|service| service.active)
            .filter(|service| {
                assignments.is_empty()
                    || assignments
                        .iter()
                        .any(|a| a.team_member_id == team_member_id && a.service_id == service.id)
            })
            .cloned()
            .collect()
    }

    /// Plans the team member accepts that still have capacity for them and plan-wide.
    pub fn available_insurance_plans_for_team_member(&self, team_member_id: Uuid) -> Vec<InsurancePlan> {
        self.data
            .insurance_plans
            .iter()
            .filter(|plan| plan.has_capacity())
            .filter(|plan| {
                self.data.team_member_insurance_plans.iter().any(|association| {
                    association.team_member_id == team_member_id
                        && association.insurance_plan_id == plan.id
                        && association.has_capacity()
                })
            })
            .cloned()
            .collect()
    }

    // ==============================================================================
    // SELECTION & NAVIGATION
    // ==============================================================================

    /// Any update may cascade-clear the team member or date, so availability is always re-derived.
    pub async fn select(&mut self, update: SelectionUpdate) {
        self.flow.write().await.set_field(update);
        self.recompute_availability().await;
    }

    pub async fn go_to_next_step(&self) -> BookingStep {
        self.flow.write().await.go_to_next_step()
    }

    pub async fn go_to_previous_step(&self) -> BookingStep {
        self.flow.write().await.go_to_previous_step()
    }

    pub async fn go_to_step(&self, step: BookingStep) -> BookingStep {
        self.flow.write().await.go_to_step(step)
    }

    pub async fn try_advance(&self) -> Result<BookingStep, BookingError> {
        self.flow.write().await.try_advance()
    }

    // ==============================================================================
    // WRITE SIDE
    // ==============================================================================

    /// Validates, checks quotas, re-checks the slot and writes the appointment.
    ///
    /// Failures are also recorded as the flow error; the step position is left unchanged.
    #[instrument(skip(self), fields(professional_id = %self.professional_id, mode = ?self.mode))]
    pub async fn complete_booking(&mut self) -> Result<Uuid, BookingError> {
        let (selection, confirmed) = {
            let flow = self.flow.read().await;
            (flow.selection().clone(), flow.is_complete().then(|| flow.appointment_id()).flatten())
        };

        if let Some(appointment_id) = confirmed {
            debug!("Booking already confirmed as {}", appointment_id);
            return Ok(appointment_id);
        }

        match self.submit(&selection).await {
            Ok(appointment_id) => {
                self.flow.write().await.mark_confirmed(appointment_id);
                self.reload_appointments().await;
                self.schedule_reset(appointment_id);

                info!("Booking {} confirmed", appointment_id);
                Ok(appointment_id)
            }
            Err(e) => {
                match &e {
                    e if e.is_validation() => debug!("Booking rejected: {}", e),
                    e if e.is_quota() => warn!("Booking blocked by quota: {}", e),
                    BookingError::SlotUnavailable => warn!("Selected slot was taken before submission"),
                    e => error!("Booking failed: {}", e),
                }

                self.flow.write().await.set_error(e.user_message());

                if e == BookingError::SlotUnavailable {
                    self.reload_appointments().await;
                }
                Err(e)
            }
        }
    }

    async fn submit(&self, selection: &BookingSelection) -> Result<Uuid, BookingError> {
        let booking = self.validate(selection)?;

        if self.mode != BookingMode::Admin && !self.quota_guard.is_within_free_limit(self.professional_id).await {
            return Err(BookingError::FreeTierLimitReached);
        }

        if let Some(plan_id) = selection.insurance_plan_id() {
            self.quota_guard
                .ensure_team_member_can_bill(booking.team_member_id, plan_id)
                .await?;
        }

        self.ensure_slot_free(&booking).await?;

        let price = selection
            .service_id
            .and_then(|id| self.data.services.iter().find(|service| service.id == id))
            .and_then(|service| service.price);

        let appointment = NewAppointment {
            professional_id: self.professional_id,
            team_member_id: Some(booking.team_member_id),
            client_name: booking.client_name,
            client_email: booking.client_email,
            client_phone: selection.client_phone.clone().filter(|p| !p.trim().is_empty()),
            date: booking.date,
            start_time: booking.start_time,
            end_time: booking.end_time,
            status: AppointmentStatus::Scheduled,
            source: self.mode.source(),
            service_id: selection.service_id,
            insurance_plan_id: selection.insurance_plan_id(),
            notes: selection.notes.clone().filter(|n| !n.trim().is_empty()),
            price,
        };

        self.repository.insert_appointment(appointment).await
    }

    fn validate(&self, selection: &BookingSelection) -> Result<ValidatedBooking, BookingError> {
        let team_member_id = selection
            .team_member_id
            .ok_or(BookingError::MissingField { field: "team_member_id" })?;
        let date = selection.date.ok_or(BookingError::MissingField { field: "date" })?;
        let start_time = required(&selection.start_time, "start_time")?;
        let end_time = required(&selection.end_time, "end_time")?;
        let client_name = required(&selection.client_name, "client_name")?;
        let client_email = required(&selection.client_email, "client_email")?;

        let email_ok = self
            .email_regex
            .as_ref()
            .map_or(false, |re| re.is_match(&client_email) && client_email.len() <= 254);
        if !email_ok {
            return Err(BookingError::InvalidEmail(client_email));
        }

        let start_minutes = time_to_minutes(&start_time).map_err(|e| BookingError::InvalidTime(e.to_string()))?;
        let end_minutes = time_to_minutes(&end_time).map_err(|e| BookingError::InvalidTime(e.to_string()))?;
        if start_minutes >= end_minutes {
            return Err(BookingError::InvalidTime(format!("{} must be before {}", start_time, end_time)));
        }

        Ok(ValidatedBooking {
            team_member_id,
            date,
            start_time,
            end_time,
            start_minutes,
            end_minutes,
            client_name,
            client_email,
        })
    }

    /// Fresh read right before the insert; storage uniqueness still has the final say.
    async fn ensure_slot_free(&self, booking: &ValidatedBooking) -> Result<(), BookingError> {
        let existing = self
            .repository
            .find_scheduled_appointments(self.professional_id, booking.team_member_id, booking.date)
            .await?;

        let taken = existing.iter().filter(|a| a.status.blocks_slot()).any(|a| {
            match (time_to_minutes(&a.start_time), time_to_minutes(&a.end_time)) {
                (Ok(start), Ok(end)) => do_overlap(booking.start_minutes, booking.end_minutes, start, end),
                _ => a.start_time == booking.start_time,
            }
        });

        if taken {
            return Err(BookingError::SlotUnavailable);
        }
        Ok(())
    }

    fn schedule_reset(&mut self, appointment_id: Uuid) {
        if let Some(previous) = self.pending_reset.take() {
            previous.abort();
        }

        let flow = Arc::clone(&self.flow);
        let availability = Arc::clone(&self.availability);
        let delay = self.settings.confirmation_reset_delay();

        self.pending_reset = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut flow = flow.write().await;
            // A new session may have started in the meantime.
            if flow.appointment_id() == Some(appointment_id) {
                flow.reset_booking();
                availability.write().await.clear();
                debug!("Booking form reset after confirmation of {}", appointment_id);
            }
        }));
    }

    pub async fn reset_booking(&mut self) {
        if let Some(pending) = self.pending_reset.take() {
            pending.abort();
        }
        self.flow.write().await.reset_booking();
        self.availability.write().await.clear();
    }

    /// Moves an appointment along its lifecycle.
    pub async fn update_appointment_status(
        &mut self,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, BookingError> {
        let current = self.repository.get_appointment(appointment_id).await?;
        if !current.status.can_transition_to(status) {
            return Err(BookingError::InvalidStatusTransition { from: current.status, to: status });
        }

        let updated = self.repository.update_appointment_status(appointment_id, status).await?;
        if updated.professional_id == self.professional_id {
            self.reload_appointments().await;
        }
        Ok(updated)
    }

    // ==============================================================================
    // ACCESSORS
    // ==============================================================================

    pub fn professional_id(&self) -> Uuid {
        self.professional_id
    }

    pub fn mode(&self) -> BookingMode {
        self.mode
    }

    pub fn data(&self) -> &BookingData {
        &self.data
    }

    pub async fn available_dates(&self) -> Vec<NaiveDate> {
        self.availability.read().await.dates.clone()
    }

    pub async fn available_slots(&self) -> Vec<AvailableSlot> {
        self.availability.read().await.slots.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Copy of the current step machine state.
    pub async fn flow(&self) -> BookingFlow {
        self.flow.read().await.clone()
    }

    pub async fn error(&self) -> Option<String> {
        self.flow.read().await.error().map(str::to_string)
    }
}

fn or_empty<T>(result: Result<Vec<T>, BookingError>, what: &'static str, failed: &mut Vec<&'static str>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        warn!("Could not load {}: {}", what, e);
        failed.push(what);
        Vec::new()
    })
}

fn required(value: &Option<String>, field: &'static str) -> Result<String, BookingError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(BookingError::MissingField { field })
}
