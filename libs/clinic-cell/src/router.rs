// libs/clinic-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers::{self, ClinicCellState};

pub fn clinic_routes(state: Arc<ClinicCellState>) -> Router {
    let config = state.config.clone();

    let protected_routes = Router::new()
        .route("/", post(handlers::register_clinic))
        .route("/", get(handlers::list_clinics))
        .route("/{clinic_id}", get(handlers::get_clinic))
        .route("/{clinic_id}/hours", put(handlers::set_clinic_hours))
        .route("/{clinic_id}/hours", get(handlers::get_clinic_hours))
        .layer(middleware::from_fn_with_state(config, auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
