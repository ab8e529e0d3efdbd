#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use booking_cell::models::BookingError;
use booking_cell::services::{BookingRepository, FixedClock, SubscriptionProvider};
use booking_cell::BookingMode;
use booking_cell::BookingOrchestrator;
use scheduling_cell::time_to_minutes;
use shared_config::BookingSettings;
use shared_database::CollectionKind;
use shared_models::{
    Appointment, AppointmentStatus, InsurancePlan, NewAppointment, Service, SlotTemplate,
    SubscriptionStatus, TeamMember, TeamMemberInsurancePlan, TeamMemberService,
};

/// Monday.
pub fn booking_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
}

/// Saturday morning before `booking_date`.
pub fn now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

/// In-memory storage with the same uniqueness rule as the database index.
#[derive(Default)]
pub struct InMemoryStore {
    pub team_members: Mutex<Vec<TeamMember>>,
    pub services: Mutex<Vec<Service>>,
    pub team_member_services: Mutex<Vec<TeamMemberService>>,
    pub insurance_plans: Mutex<Vec<InsurancePlan>>,
    pub team_member_insurance_plans: Mutex<Vec<TeamMemberInsurancePlan>>,
    pub slot_templates: Mutex<Vec<SlotTemplate>>,
    pub appointments: Mutex<Vec<Appointment>>,
    pub fail_templates: bool,
    pub invalidations: AtomicUsize,
    pub plan_lookups: AtomicUsize,
}

impl InMemoryStore {
    pub fn scheduled_on(&self, team_member_id: Uuid, date: NaiveDate) -> Vec<Appointment> {
        self.appointments
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.team_member_id == Some(team_member_id) && a.date == date)
            .filter(|a| a.status == AppointmentStatus::Scheduled)
            .cloned()
            .collect()
    }

    pub fn appointment_count(&self) -> usize {
        self.appointments.lock().unwrap().len()
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn list_team_members(&self, professional_id: Uuid) -> Result<Vec<TeamMember>, BookingError> {
        Ok(self.team_members.lock().unwrap().iter().filter(|t| t.professional_id == professional_id).cloned().collect())
    }

    async fn list_services(&self, professional_id: Uuid) -> Result<Vec<Service>, BookingError> {
        Ok(self.services.lock().unwrap().iter().filter(|s| s.professional_id == professional_id).cloned().collect())
    }

    async fn list_team_member_services(&self, _professional_id: Uuid) -> Result<Vec<TeamMemberService>, BookingError> {
        Ok(self.team_member_services.lock().unwrap().clone())
    }

    async fn list_insurance_plans(&self, professional_id: Uuid) -> Result<Vec<InsurancePlan>, BookingError> {
        Ok(self.insurance_plans.lock().unwrap().iter().filter(|p| p.professional_id == professional_id).cloned().collect())
    }

    async fn list_team_member_insurance_plans(&self, _professional_id: Uuid) -> Result<Vec<TeamMemberInsurancePlan>, BookingError> {
        Ok(self.team_member_insurance_plans.lock().unwrap().clone())
    }

    async fn list_slot_templates(&self, professional_id: Uuid) -> Result<Vec<SlotTemplate>, BookingError> {
        if self.fail_templates {
            return Err(BookingError::DatabaseError("API error (503): upstream unavailable".into()));
        }
        Ok(self.slot_templates.lock().unwrap().iter().filter(|t| t.professional_id == professional_id).cloned().collect())
    }

    async fn list_upcoming_appointments(&self, professional_id: Uuid, from: NaiveDate) -> Result<Vec<Appointment>, BookingError> {
        Ok(self
            .appointments
            .lock()
            .unwrap()
            .iter()
            .filter(|a| a.professional_id == professional_id && a.date >= from)
            .filter(|a| a.status == AppointmentStatus::Scheduled)
            .cloned()
            .collect())
    }

    async fn get_insurance_plan(&self, plan_id: Uuid) -> Result<Option<InsurancePlan>, BookingError> {
        self.plan_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.insurance_plans.lock().unwrap().iter().find(|p| p.id == plan_id).cloned())
    }

    async fn get_team_member_insurance_plan(
        &self,
        team_member_id: Uuid,
        plan_id: Uuid,
    ) -> Result<Option<TeamMemberInsurancePlan>, BookingError> {
        Ok(self
            .team_member_insurance_plans
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.team_member_id == team_member_id && a.insurance_plan_id == plan_id)
            .cloned())
    }

    async fn find_scheduled_appointments(
        &self,
        _professional_id: Uuid,
        team_member_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, BookingError> {
        Ok(self.scheduled_on(team_member_id, date))
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, BookingError> {
        self.appointments
            .lock()
            .unwrap()
            .iter()
            .find(|a| a.id == appointment_id)
            .cloned()
            .ok_or(BookingError::NotFound)
    }

    async fn insert_appointment(&self, appointment: NewAppointment) -> Result<Uuid, BookingError> {
        // Let a concurrent booking reach this point too.
        tokio::task::yield_now().await;

        let mut appointments = self.appointments.lock().unwrap();
        let start = time_to_minutes(&appointment.start_time).unwrap();
        let duplicate = appointments.iter().any(|a| {
            a.status == AppointmentStatus::Scheduled
                && a.professional_id == appointment.professional_id
                && a.team_member_id == appointment.team_member_id
                && a.date == appointment.date
                && time_to_minutes(&a.start_time).unwrap() == start
        });
        if duplicate {
            return Err(BookingError::SlotUnavailable);
        }

        if let Some(plan_id) = appointment.insurance_plan_id {
            if let Some(plan) = self.insurance_plans.lock().unwrap().iter_mut().find(|p| p.id == plan_id) {
                plan.current_appointments += 1;
            }
        }

        let id = Uuid::new_v4();
        appointments.push(appointment.into_appointment(id));
        Ok(id)
    }

    async fn update_appointment_status(
        &self,
        appointment_id: Uuid,
        status: AppointmentStatus,
    ) -> Result<Appointment, BookingError> {
        let mut appointments = self.appointments.lock().unwrap();
        let appointment = appointments
            .iter_mut()
            .find(|a| a.id == appointment_id)
            .ok_or(BookingError::NotFound)?;
        appointment.status = status;
        Ok(appointment.clone())
    }

    async fn invalidate(&self, _professional_id: Uuid, _kind: Option<CollectionKind>) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct StubSubscriptions {
    pub status: Result<SubscriptionStatus, BookingError>,
}

impl StubSubscriptions {
    pub fn free(monthly_appointments: u32) -> Self {
        Self {
            status: Ok(SubscriptionStatus {
                is_premium: false,
                monthly_appointments,
                is_within_free_limit: monthly_appointments < 30,
                free_limit: Some(30),
            }),
        }
    }

    pub fn failing() -> Self {
        Self {
            status: Err(BookingError::ExternalServiceError("function timed out".into())),
        }
    }
}

#[async_trait]
impl SubscriptionProvider for StubSubscriptions {
    async fn subscription_status(&self, _professional_id: Uuid) -> Result<SubscriptionStatus, BookingError> {
        self.status.clone()
    }
}

/// One professional with one team member working Mondays 09:00-12:00 in 60 minute slots.
pub struct Fixture {
    pub professional_id: Uuid,
    pub team_member_id: Uuid,
    pub service_id: Uuid,
    pub store: Arc<InMemoryStore>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_store(InMemoryStore::default())
    }

    pub fn with_store(store: InMemoryStore) -> Self {
        let professional_id = Uuid::new_v4();
        let team_member_id = Uuid::new_v4();
        let service_id = Uuid::new_v4();

        store.team_members.lock().unwrap().push(TeamMember {
            id: team_member_id,
            professional_id,
            name: "Dra. Helena".to_string(),
            active: true,
        });
        store.services.lock().unwrap().push(Service {
            id: service_id,
            professional_id,
            name: "Consulta".to_string(),
            duration_minutes: Some(60),
            price: Some(250.0),
            active: true,
        });
        store.slot_templates.lock().unwrap().push(SlotTemplate {
            id: Uuid::new_v4(),
            professional_id,
            team_member_id,
            day_of_week: 1,
            start_time: "09:00".to_string(),
            end_time: "12:00".to_string(),
            appointment_duration_minutes: 60,
            lunch_break_start: None,
            lunch_break_end: None,
            available: true,
        });

        Self {
            professional_id,
            team_member_id,
            service_id,
            store: Arc::new(store),
        }
    }

    /// Adds a plan the team member accepts.
    pub fn add_insurance_plan(&self, limit: Option<i32>, current: i32) -> Uuid {
        let plan_id = Uuid::new_v4();
        self.store.insurance_plans.lock().unwrap().push(InsurancePlan {
            id: plan_id,
            professional_id: self.professional_id,
            name: "Unimed".to_string(),
            limit_per_plan: limit,
            current_appointments: current,
        });
        self.store.team_member_insurance_plans.lock().unwrap().push(TeamMemberInsurancePlan {
            id: Uuid::new_v4(),
            team_member_id: self.team_member_id,
            insurance_plan_id: plan_id,
            limit_per_member: None,
            current_appointments: 0,
        });
        plan_id
    }

    pub fn settings(&self) -> BookingSettings {
        BookingSettings {
            confirmation_reset_seconds: 3,
            ..BookingSettings::default()
        }
    }

    pub fn orchestrator(&self, mode: BookingMode, subscriptions: StubSubscriptions) -> BookingOrchestrator {
        self.orchestrator_with(mode, subscriptions, self.settings())
    }

    pub fn orchestrator_with(
        &self,
        mode: BookingMode,
        subscriptions: StubSubscriptions,
        settings: BookingSettings,
    ) -> BookingOrchestrator {
        BookingOrchestrator::with_clock(
            self.professional_id,
            mode,
            self.store.clone(),
            Arc::new(subscriptions),
            settings,
            Arc::new(FixedClock(now())),
        )
    }
}
