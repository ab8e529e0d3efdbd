use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use booking_cell::models::BookingError;
use booking_cell::services::{
    BookingRepository, SubscriptionProvider, SupabaseBookingRepository, SupabaseSubscriptionProvider,
};
use shared_database::{CollectionKind, SupabaseClient};
use shared_models::{AppointmentSource, AppointmentStatus, NewAppointment};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn repository_for(server: &MockServer) -> SupabaseBookingRepository {
    SupabaseBookingRepository::from_config(&TestConfig::with_url(server.uri()).to_app_config())
}

fn new_appointment(professional_id: Uuid, team_member_id: Uuid, date: NaiveDate) -> NewAppointment {
    NewAppointment {
        professional_id,
        team_member_id: Some(team_member_id),
        client_name: "Maria Silva".to_string(),
        client_email: "maria@example.com".to_string(),
        client_phone: None,
        date,
        start_time: "09:00".to_string(),
        end_time: "10:00".to_string(),
        status: AppointmentStatus::Scheduled,
        source: AppointmentSource::Client,
        service_id: None,
        insurance_plan_id: None,
        notes: None,
        price: Some(250.0),
    }
}

#[tokio::test]
async fn test_team_members_are_cached_per_professional() {
    let server = MockServer::start().await;
    let professional_id = Uuid::new_v4();
    let team_member_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/team_members"))
        .and(query_param("professional_id", format!("eq.{}", professional_id)))
        .and(query_param("active", "eq.true"))
        .and(header("apikey", "test-anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::team_member_response(team_member_id, professional_id, "Dra. Helena")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let repository = repository_for(&server);

    let first = repository.list_team_members(professional_id).await.unwrap();
    let second = repository.list_team_members(professional_id).await.unwrap();

    assert_eq!(first.len(), 1);
    assert_eq!(first[0].id, team_member_id);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_invalidate_forces_refetch() {
    let server = MockServer::start().await;
    let professional_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::service_response(Uuid::new_v4(), professional_id, "Consulta", Some(250.0))
        ])))
        .expect(2)
        .mount(&server)
        .await;

    let repository = repository_for(&server);

    repository.list_services(professional_id).await.unwrap();
    repository.invalidate(professional_id, None).await;
    let services = repository.list_services(professional_id).await.unwrap();

    assert_eq!(services[0].price, Some(250.0));
}

#[tokio::test]
async fn test_transient_failure_is_retried() {
    let server = MockServer::start().await;
    let professional_id = Uuid::new_v4();
    let team_member_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::slot_template_response(professional_id, team_member_id, 1, "09:00", "12:00", 60)
        ])))
        .mount(&server)
        .await;

    let repository = repository_for(&server);
    let templates = repository.list_slot_templates(professional_id).await.unwrap();

    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].start_time, "09:00:00");
    assert_eq!(templates[0].appointment_duration_minutes, 60);
    assert!(templates[0].available);
}

#[tokio::test]
async fn test_permanent_failure_surfaces_after_one_attempt() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/insurance_plans"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({ "message": "permission denied" })))
        .expect(1)
        .mount(&server)
        .await;

    let repository = repository_for(&server);
    let result = repository.list_insurance_plans(Uuid::new_v4()).await;

    assert_matches!(result, Err(BookingError::DatabaseError(_)));
}

#[tokio::test]
async fn test_malformed_rows_are_skipped() {
    let server = MockServer::start().await;
    let professional_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/team_members"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::team_member_response(Uuid::new_v4(), professional_id, "Dra. Helena"),
            { "id": "not-a-uuid" }
        ])))
        .mount(&server)
        .await;

    let repository = repository_for(&server);
    let members = repository.list_team_members(professional_id).await.unwrap();

    assert_eq!(members.len(), 1);
}

#[tokio::test]
async fn test_upcoming_appointments_filter_by_date_and_status() {
    let server = MockServer::start().await;
    let professional_id = Uuid::new_v4();
    let team_member_id = Uuid::new_v4();
    let from = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("professional_id", format!("eq.{}", professional_id)))
        .and(query_param("status", "eq.scheduled"))
        .and(query_param("date", "gte.2024-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response(
                Uuid::new_v4(), professional_id, team_member_id,
                NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(), "09:00:00", "10:00:00",
            )
        ])))
        .mount(&server)
        .await;

    let repository = repository_for(&server);
    let appointments = repository.list_upcoming_appointments(professional_id, from).await.unwrap();

    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0].team_member_id, Some(team_member_id));
}

#[tokio::test]
async fn test_insert_returns_id_and_invalidates_appointments() {
    let server = MockServer::start().await;
    let professional_id = Uuid::new_v4();
    let team_member_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();
    let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(header("Prefer", "return=representation"))
        .and(body_partial_json(json!({ "status": "scheduled", "source": "client" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_response(appointment_id, professional_id, team_member_id, date, "09:00", "10:00")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let repository = repository_for(&server);

    repository.list_upcoming_appointments(professional_id, date).await.unwrap();
    let created = repository
        .insert_appointment(new_appointment(professional_id, team_member_id, date))
        .await
        .unwrap();
    repository.list_upcoming_appointments(professional_id, date).await.unwrap();

    assert_eq!(created, appointment_id);
}

#[tokio::test]
async fn test_unique_violation_maps_to_slot_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            MockSupabaseResponses::error_response(
                "duplicate key value violates unique constraint \"appointments_unique_scheduled_slot\"",
                "23505",
            ),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let repository = repository_for(&server);
    let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
    let result = repository
        .insert_appointment(new_appointment(Uuid::new_v4(), Uuid::new_v4(), date))
        .await;

    assert_eq!(result, Err(BookingError::SlotUnavailable));
}

#[tokio::test]
async fn test_missing_association_is_none() {
    let server = MockServer::start().await;
    let team_member_id = Uuid::new_v4();
    let plan_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/team_member_insurance_plans"))
        .and(query_param("team_member_id", format!("eq.{}", team_member_id)))
        .and(query_param("insurance_plan_id", format!("eq.{}", plan_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let repository = repository_for(&server);
    let association = repository
        .get_team_member_insurance_plan(team_member_id, plan_id)
        .await
        .unwrap();

    assert!(association.is_none());
}

#[tokio::test]
async fn test_status_update_patches_row() {
    let server = MockServer::start().await;
    let professional_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();
    let date = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();

    let mut row = MockSupabaseResponses::appointment_response(
        appointment_id, professional_id, Uuid::new_v4(), date, "09:00", "10:00",
    );
    row["status"] = json!("completed");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .and(body_partial_json(json!({ "status": "completed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&server)
        .await;

    let repository = repository_for(&server);
    let updated = repository
        .update_appointment_status(appointment_id, AppointmentStatus::Completed)
        .await
        .unwrap();

    assert_eq!(updated.status, AppointmentStatus::Completed);
    assert!(repository.cache().get(professional_id, CollectionKind::Appointments).await.is_none());
}

#[tokio::test]
async fn test_subscription_status_from_function() {
    let server = MockServer::start().await;
    let professional_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/functions/v1/check-subscription"))
        .and(body_partial_json(json!({ "professional_id": professional_id })))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            MockSupabaseResponses::subscription_response(false, 12),
        ))
        .mount(&server)
        .await;

    let config = TestConfig::with_url(server.uri()).to_app_config();
    let provider = SupabaseSubscriptionProvider::new(Arc::new(SupabaseClient::new(&config)), None);

    let status = provider.subscription_status(professional_id).await.unwrap();

    assert!(!status.is_premium);
    assert_eq!(status.monthly_appointments, 12);
    assert!(status.allows_booking());
}
