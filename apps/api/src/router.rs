use std::sync::Arc;

use axum::{routing::get, Router};

use booking_cell::router::booking_routes;
use booking_cell::BookingCellState;
use clinic_cell::router::clinic_routes;
use clinic_cell::ClinicCellState;

pub fn create_router(
    booking_state: Arc<BookingCellState>,
    clinic_state: Arc<ClinicCellState>,
) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic Booking API is running!" }))
        .nest("/bookings", booking_routes(booking_state))
        .nest("/clinics", clinic_routes(clinic_state))
}
