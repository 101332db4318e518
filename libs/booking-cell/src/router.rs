// libs/booking-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, patch, post},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, BookingCellState};

pub fn booking_routes(state: Arc<BookingCellState>) -> Router {
    let config = state.config.clone();

    // All booking operations require authentication
    let protected_routes = Router::new()
        .route("/", post(handlers::create_booking))
        .route("/search", get(handlers::search_bookings))
        .route("/stream", get(handlers::stream_bookings))
        .route("/{booking_id}", get(handlers::get_booking))
        .route("/{booking_id}", delete(handlers::delete_booking))
        .route("/{booking_id}/approve", post(handlers::approve_booking))
        .route("/{booking_id}/cancel", post(handlers::cancel_booking))
        .route("/{booking_id}/reschedule", post(handlers::reschedule_booking))
        .route("/{booking_id}/re-approve", post(handlers::re_approve_booking))
        .route("/{booking_id}/complete", post(handlers::complete_booking))
        .route("/{booking_id}/note", patch(handlers::update_booking_note))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
