// libs/clinic-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Actor, Role};
use shared_models::error::AppError;

use crate::models::{ClinicError, RegisterClinicRequest, SetHoursRequest};
use crate::services::directory::ClinicDirectoryService;

pub struct ClinicCellState {
    pub config: Arc<AppConfig>,
    pub directory: Arc<ClinicDirectoryService>,
}

impl ClinicCellState {
    pub fn new(config: Arc<AppConfig>, directory: Arc<ClinicDirectoryService>) -> Self {
        Self { config, directory }
    }
}

fn map_clinic_error(err: ClinicError) -> AppError {
    match err {
        ClinicError::NotFound => AppError::NotFound("Clinic not found".to_string()),
        ClinicError::InvalidDay(day) => {
            AppError::BadRequest(format!("Invalid day of week: {}", day))
        }
        ClinicError::InvalidHours(msg) => AppError::BadRequest(msg),
    }
}

#[axum::debug_handler]
pub async fn register_clinic(
    State(state): State<Arc<ClinicCellState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<RegisterClinicRequest>,
) -> Result<Json<Value>, AppError> {
    if actor.role != Role::SuperAdmin {
        return Err(AppError::Forbidden(
            "Only super admins may register clinics".to_string(),
        ));
    }

    let clinic = state.directory.register(request).await;

    Ok(Json(json!({
        "success": true,
        "clinic": clinic
    })))
}

#[axum::debug_handler]
pub async fn get_clinic(
    State(state): State<Arc<ClinicCellState>>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let clinic = state
        .directory
        .get(clinic_id)
        .await
        .map_err(map_clinic_error)?;

    Ok(Json(json!({
        "success": true,
        "clinic": clinic
    })))
}

#[axum::debug_handler]
pub async fn list_clinics(
    State(state): State<Arc<ClinicCellState>>,
) -> Result<Json<Value>, AppError> {
    let clinics = state.directory.list().await;

    Ok(Json(json!({
        "success": true,
        "clinics": clinics
    })))
}

#[axum::debug_handler]
pub async fn set_clinic_hours(
    State(state): State<Arc<ClinicCellState>>,
    Path(clinic_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<SetHoursRequest>,
) -> Result<Json<Value>, AppError> {
    let allowed = match actor.role {
        Role::SuperAdmin => true,
        Role::ClinicAdmin => actor.clinic_id == Some(clinic_id),
        Role::Patient => false,
    };

    if !allowed {
        return Err(AppError::Forbidden(
            "Not authorized to manage hours for this clinic".to_string(),
        ));
    }

    let hours = state
        .directory
        .set_hours(clinic_id, request)
        .await
        .map_err(map_clinic_error)?;

    Ok(Json(json!({
        "success": true,
        "hours": hours
    })))
}

#[axum::debug_handler]
pub async fn get_clinic_hours(
    State(state): State<Arc<ClinicCellState>>,
    Path(clinic_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let hours = state
        .directory
        .weekly_hours(clinic_id)
        .await
        .map_err(map_clinic_error)?;

    Ok(Json(json!({
        "success": true,
        "hours": hours
    })))
}
