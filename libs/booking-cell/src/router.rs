// libs/booking-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::handlers::{self, BookingCellState};

pub fn booking_routes(state: Arc<BookingCellState>) -> Router {
    let team_member_routes = Router::new()
        .route("/available-dates", get(handlers::get_available_dates))
        .route("/available-slots", get(handlers::get_available_slots))
        .route("/services", get(handlers::get_team_member_services))
        .route("/insurance-plans", get(handlers::get_team_member_insurance_plans));

    Router::new()
        .nest("/professionals/{professional_id}/team-members/{team_member_id}", team_member_routes)
        .route("/professionals/{professional_id}/bookings", post(handlers::create_booking))
        .route("/professionals/{professional_id}/cache/invalidate", post(handlers::invalidate_cache))
        .route("/appointments/{appointment_id}/status", patch(handlers::update_appointment_status))
        .with_state(state)
}
