use std::sync::Arc;

use axum::{
    Json, Router,
    routing::get,
};
use serde_json::json;

use booking_cell::{booking_routes, BookingCellState};

pub fn create_router(state: Arc<BookingCellState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Booking API is running!" }))
        .route("/health", get(|| async { Json(json!({ "status": "ok" })) }))
        .merge(booking_routes(state))
}
