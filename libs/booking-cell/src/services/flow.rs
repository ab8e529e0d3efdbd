// libs/booking-cell/src/services/flow.rs
use chrono::NaiveDate;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{
    BookingError, BookingSelection, BookingStep, ClientInfo, InsuranceChoice, SelectionUpdate,
};

/// Step-by-step booking session: current step, accumulated selection and a side-channel error.
///
/// Reaching `Confirmation` with an appointment id is terminal; only `reset_booking` leaves it.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingFlow {
    current_step: BookingStep,
    selection: BookingSelection,
    error: Option<String>,
    appointment_id: Option<Uuid>,
}

impl Default for BookingFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl BookingFlow {
    pub fn new() -> Self {
        Self {
            current_step: BookingStep::first(),
            selection: BookingSelection::default(),
            error: None,
            appointment_id: None,
        }
    }

    pub fn current_step(&self) -> BookingStep {
        self.current_step
    }

    pub fn selection(&self) -> &BookingSelection {
        &self.selection
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn appointment_id(&self) -> Option<Uuid> {
        self.appointment_id
    }

    pub fn is_complete(&self) -> bool {
        self.current_step == BookingStep::Confirmation && self.appointment_id.is_some()
    }

    // ==============================================================================
    // NAVIGATION
    // ==============================================================================

    /// Moves one step forward; no-op on the last step.
    pub fn go_to_next_step(&mut self) -> BookingStep {
        if let Some(next) = self.current_step.next() {
            if !self.is_complete() {
                self.current_step = next;
            }
        }
        self.current_step
    }

    /// Moves one step back; no-op on the first step or once the booking is confirmed.
    pub fn go_to_previous_step(&mut self) -> BookingStep {
        if self.is_complete() {
            debug!("Ignoring step back on a confirmed booking");
            return self.current_step;
        }
        if let Some(previous) = self.current_step.previous() {
            self.current_step = previous;
        }
        self.current_step
    }

    pub fn go_to_step(&mut self, step: BookingStep) -> BookingStep {
        if self.is_complete() && step != BookingStep::Confirmation {
            warn!("Ignoring jump to {} on a confirmed booking", step);
            return self.current_step;
        }
        self.current_step = step;
        self.current_step
    }

    /// Advances only when the current step's required fields are filled in.
    pub fn try_advance(&mut self) -> Result<BookingStep, BookingError> {
        if let Some(field) = self.missing_field(self.current_step) {
            return Err(BookingError::MissingField { field });
        }
        Ok(self.go_to_next_step())
    }

    pub fn can_advance(&self, step: BookingStep) -> bool {
        step != BookingStep::Confirmation && self.missing_field(step).is_none()
    }

    fn missing_field(&self, step: BookingStep) -> Option<&'static str> {
        let s = &self.selection;
        match step {
            BookingStep::TeamMember if s.team_member_id.is_none() => Some("team_member_id"),
            BookingStep::Insurance if s.insurance.is_none() => Some("insurance"),
            BookingStep::Service if s.service_id.is_none() => Some("service_id"),
            BookingStep::Date if s.date.is_none() => Some("date"),
            BookingStep::Time if s.start_time.is_none() => Some("start_time"),
            BookingStep::Time if s.end_time.is_none() => Some("end_time"),
            BookingStep::ClientInfo if is_blank(&s.client_name) => Some("client_name"),
            BookingStep::ClientInfo if is_blank(&s.client_email) => Some("client_email"),
            BookingStep::Confirmation => Some("appointment_id"),
            _ => None,
        }
    }

    // ==============================================================================
    // SELECTION
    // ==============================================================================

    /// Single write path into the selection.
    ///
    /// Changing a value in the team member → insurance → service → date → time chain
    /// clears every later link. Client info is not part of the chain.
    pub fn set_field(&mut self, update: SelectionUpdate) {
        let step = update.step();
        let changed = self.apply(update);

        if changed && step.is_in_dependency_chain() {
            for dependent in BookingStep::ORDER
                .iter()
                .copied()
                .filter(|s| s.index() > step.index() && s.is_in_dependency_chain())
            {
                self.selection.clear_step(dependent);
            }
            debug!("Selection for {} changed, cleared dependent steps", step);
        }
    }

    fn apply(&mut self, update: SelectionUpdate) -> bool {
        let s = &mut self.selection;
        match update {
            SelectionUpdate::TeamMember(id) => replace(&mut s.team_member_id, id),
            SelectionUpdate::Insurance(choice) => replace(&mut s.insurance, choice),
            SelectionUpdate::Service(id) => replace(&mut s.service_id, id),
            SelectionUpdate::Date(date) => replace(&mut s.date, date),
            SelectionUpdate::Time { start_time, end_time } => {
                let start_changed = replace(&mut s.start_time, start_time);
                let end_changed = replace(&mut s.end_time, end_time);
                start_changed || end_changed
            }
            SelectionUpdate::ClientInfo(info) => {
                s.client_name = Some(info.name);
                s.client_email = Some(info.email);
                s.client_phone = info.phone;
                s.notes = info.notes;
                true
            }
        }
    }

    pub fn set_team_member(&mut self, team_member_id: Uuid) {
        self.set_field(SelectionUpdate::TeamMember(team_member_id));
    }

    pub fn set_insurance(&mut self, choice: InsuranceChoice) {
        self.set_field(SelectionUpdate::Insurance(choice));
    }

    pub fn set_service(&mut self, service_id: Uuid) {
        self.set_field(SelectionUpdate::Service(service_id));
    }

    pub fn set_date(&mut self, date: NaiveDate) {
        self.set_field(SelectionUpdate::Date(date));
    }

    pub fn set_time(&mut self, start_time: impl Into<String>, end_time: impl Into<String>) {
        self.set_field(SelectionUpdate::Time {
            start_time: start_time.into(),
            end_time: end_time.into(),
        });
    }

    pub fn set_client_info(&mut self, info: ClientInfo) {
        self.set_field(SelectionUpdate::ClientInfo(info));
    }

    // ==============================================================================
    // ERROR & TERMINAL STATE
    // ==============================================================================

    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Enters the terminal state holding the persisted appointment.
    pub fn mark_confirmed(&mut self, appointment_id: Uuid) {
        self.appointment_id = Some(appointment_id);
        self.error = None;
        self.current_step = BookingStep::Confirmation;
    }

    pub fn reset_booking(&mut self) {
        *self = Self::new();
    }
}

fn replace<T: PartialEq>(slot: &mut Option<T>, value: T) -> bool {
    if slot.as_ref() == Some(&value) {
        return false;
    }
    *slot = Some(value);
    true
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}
