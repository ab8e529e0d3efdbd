use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::{AppConfig, BookingSettings};

pub struct TestConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub service_role_key: Option<String>,
    pub booking: BookingSettings,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            service_role_key: None,
            booking: BookingSettings {
                retry_base_delay_ms: 1,
                ..BookingSettings::default()
            },
        }
    }
}

impl TestConfig {
    /// Points the client at a mock server.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            supabase_url: url.into(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: self.service_role_key.clone(),
            api_port: 3000,
            booking: self.booking.clone(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

/// PostgREST-shaped rows for the booking tables.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn team_member_response(id: Uuid, professional_id: Uuid, name: &str) -> Value {
        json!({
            "id": id,
            "professional_id": professional_id,
            "name": name,
            "active": true
        })
    }

    pub fn service_response(id: Uuid, professional_id: Uuid, name: &str, price: Option<f64>) -> Value {
        json!({
            "id": id,
            "professional_id": professional_id,
            "name": name,
            "duration_minutes": 60,
            "price": price,
            "active": true
        })
    }

    pub fn slot_template_response(
        professional_id: Uuid,
        team_member_id: Uuid,
        day_of_week: u8,
        start_time: &str,
        end_time: &str,
        duration_minutes: u32,
    ) -> Value {
        json!({
            "id": Uuid::new_v4(),
            "professional_id": professional_id,
            "team_member_id": team_member_id,
            "day_of_week": day_of_week,
            "start_time": format!("{}:00", start_time),
            "end_time": format!("{}:00", end_time),
            "appointment_duration": duration_minutes,
            "lunch_break_start": null,
            "lunch_break_end": null,
            "is_available": true
        })
    }

    pub fn insurance_plan_response(id: Uuid, professional_id: Uuid, limit: Option<i32>, current: i32) -> Value {
        json!({
            "id": id,
            "professional_id": professional_id,
            "name": "Unimed",
            "limit_per_plan": limit,
            "current_appointments": current
        })
    }

    pub fn appointment_response(
        id: Uuid,
        professional_id: Uuid,
        team_member_id: Uuid,
        date: NaiveDate,
        start_time: &str,
        end_time: &str,
    ) -> Value {
        json!({
            "id": id,
            "professional_id": professional_id,
            "team_member_id": team_member_id,
            "client_name": "Maria Silva",
            "client_email": "maria@example.com",
            "client_phone": null,
            "date": date,
            "start_time": start_time,
            "end_time": end_time,
            "status": "scheduled",
            "source": "client",
            "service_id": null,
            "insurance_plan_id": null,
            "notes": null,
            "price": null
        })
    }

    pub fn subscription_response(is_premium: bool, monthly_appointments: u32) -> Value {
        json!({
            "isPremium": is_premium,
            "monthlyAppointments": monthly_appointments,
            "isWithinFreeLimit": is_premium || monthly_appointments < 30,
            "freeLimit": 30
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "message": message,
            "code": code,
            "details": null,
            "hint": null
        })
    }
}
