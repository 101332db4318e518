// libs/booking-cell/src/handlers.rs
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Extension, Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{self, Stream};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{Actor, Role};
use shared_models::error::AppError;

use clinic_cell::services::directory::ClinicDirectoryService;

use crate::models::{
    Booking, BookingError, BookingFilter, CreateBookingRequest, RescheduleBookingRequest,
    TransitionAction, TransitionOutcome,
};
use crate::services::authority::TransitionAuthority;
use crate::services::notifier::{BookingUpdate, ChangeNotifier};
use crate::services::resolver::ConflictResolver;
use crate::services::store::BookingStore;

// ==============================================================================
// CELL STATE
// ==============================================================================

pub struct BookingCellState {
    pub config: Arc<AppConfig>,
    pub store: Arc<BookingStore>,
    pub notifier: ChangeNotifier,
    pub authority: TransitionAuthority,
}

impl BookingCellState {
    pub fn new(config: Arc<AppConfig>, directory: Arc<ClinicDirectoryService>) -> Self {
        let store = Arc::new(BookingStore::new());
        let notifier = ChangeNotifier::new(config.notifier_channel_capacity);
        let authority = TransitionAuthority::new(
            Arc::clone(&store),
            ConflictResolver::new(directory),
            notifier.clone(),
            Duration::from_millis(config.store_timeout_ms),
        );

        Self {
            config,
            store,
            notifier,
            authority,
        }
    }
}

// ==============================================================================
// REQUEST/QUERY STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct NoteUpdateRequest {
    pub note: String,
}

#[derive(Debug, Deserialize)]
pub struct DeleteBookingParams {
    pub confirm: Option<bool>,
}

// ==============================================================================
// HELPERS
// ==============================================================================

fn map_booking_error(err: BookingError) -> AppError {
    match err {
        BookingError::NotFound => AppError::NotFound("Booking not found".to_string()),
        BookingError::ClinicNotFound => AppError::NotFound("Clinic not found".to_string()),
        BookingError::DuplicateBooking => {
            AppError::Conflict("A booking for this slot already exists".to_string())
        }
        BookingError::IllegalTransition { .. } => AppError::Conflict(err.to_string()),
        BookingError::SlotUnavailable(reason) => {
            AppError::BadRequest(format!("Slot unavailable: {}", reason))
        }
        BookingError::Stale | BookingError::VersionConflict => AppError::Conflict(
            "Booking was modified concurrently; reload and retry".to_string(),
        ),
        BookingError::Forbidden(msg) => AppError::Forbidden(msg),
        BookingError::StoreTimeout => {
            AppError::Internal("Booking store did not respond in time".to_string())
        }
    }
}

/// Clamp a requested filter to what the actor may see: patients their own
/// bookings, clinic admins their clinic, super admins anything.
fn scoped_filter(actor: &Actor, mut filter: BookingFilter) -> Result<BookingFilter, AppError> {
    match actor.role {
        Role::Patient => {
            if filter.patient_id.is_some_and(|id| id != actor.id) {
                return Err(AppError::Forbidden(
                    "Patients may only view their own bookings".to_string(),
                ));
            }
            filter.patient_id = Some(actor.id);
        }
        Role::ClinicAdmin => {
            let own_clinic = actor.clinic_id.ok_or_else(|| {
                AppError::Forbidden("Clinic admin has no clinic scope".to_string())
            })?;
            if filter.clinic_id.is_some_and(|id| id != own_clinic) {
                return Err(AppError::Forbidden(
                    "Clinic admins may only view their own clinic".to_string(),
                ));
            }
            filter.clinic_id = Some(own_clinic);
        }
        Role::SuperAdmin => {}
    }
    Ok(filter)
}

fn may_view(actor: &Actor, booking: &Booking) -> bool {
    match actor.role {
        Role::Patient => actor.id == booking.patient_id,
        Role::ClinicAdmin => actor.clinic_id == Some(booking.clinic_id),
        Role::SuperAdmin => true,
    }
}

fn transition_response(outcome: TransitionOutcome) -> Json<Value> {
    let already_applied = !outcome.was_applied();
    let booking = outcome.into_booking();
    let message = if already_applied {
        format!("Booking already {}", booking.status)
    } else {
        format!("Booking is now {}", booking.status)
    };

    Json(json!({
        "success": true,
        "booking": booking,
        "already_applied": already_applied,
        "message": message
    }))
}

// ==============================================================================
// BOOKING CRUD HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_booking(
    State(state): State<Arc<BookingCellState>>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<Json<Value>, AppError> {
    let booking = state
        .authority
        .create_booking(&actor, request)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "booking": booking,
        "message": "Booking created and awaiting approval"
    })))
}

#[axum::debug_handler]
pub async fn get_booking(
    State(state): State<Arc<BookingCellState>>,
    Path(booking_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    let booking = state
        .store
        .get(booking_id)
        .await
        .map_err(map_booking_error)?;

    if !may_view(&actor, &booking) {
        return Err(AppError::Forbidden(
            "Not authorized to view this booking".to_string(),
        ));
    }

    Ok(Json(json!({
        "success": true,
        "booking": booking
    })))
}

#[axum::debug_handler]
pub async fn search_bookings(
    State(state): State<Arc<BookingCellState>>,
    Extension(actor): Extension<Actor>,
    Query(filter): Query<BookingFilter>,
) -> Result<Json<Value>, AppError> {
    let filter = scoped_filter(&actor, filter)?;
    let bookings = state.store.list(&filter).await;
    let count = bookings.len();

    Ok(Json(json!({
        "success": true,
        "bookings": bookings,
        "count": count
    })))
}

#[axum::debug_handler]
pub async fn delete_booking(
    State(state): State<Arc<BookingCellState>>,
    Path(booking_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    Query(params): Query<DeleteBookingParams>,
) -> Result<Json<Value>, AppError> {
    if params.confirm != Some(true) {
        return Err(AppError::BadRequest(
            "Deletion must be confirmed with ?confirm=true".to_string(),
        ));
    }

    let removed = state
        .authority
        .purge(&actor, booking_id)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "booking": removed,
        "message": "Booking permanently deleted"
    })))
}

// ==============================================================================
// TRANSITION HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn approve_booking(
    State(state): State<Arc<BookingCellState>>,
    Path(booking_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    let outcome = state
        .authority
        .request_transition(booking_id, &actor, TransitionAction::Approve)
        .await
        .map_err(map_booking_error)?;

    Ok(transition_response(outcome))
}

#[axum::debug_handler]
pub async fn cancel_booking(
    State(state): State<Arc<BookingCellState>>,
    Path(booking_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    let outcome = state
        .authority
        .request_transition(booking_id, &actor, TransitionAction::Cancel)
        .await
        .map_err(map_booking_error)?;

    Ok(transition_response(outcome))
}

#[axum::debug_handler]
pub async fn reschedule_booking(
    State(state): State<Arc<BookingCellState>>,
    Path(booking_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<RescheduleBookingRequest>,
) -> Result<Json<Value>, AppError> {
    let action = TransitionAction::Reschedule {
        new_date: request.new_date,
        new_time: request.new_time,
    };

    let outcome = state
        .authority
        .request_transition(booking_id, &actor, action)
        .await
        .map_err(map_booking_error)?;

    Ok(transition_response(outcome))
}

#[axum::debug_handler]
pub async fn re_approve_booking(
    State(state): State<Arc<BookingCellState>>,
    Path(booking_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    let outcome = state
        .authority
        .request_transition(booking_id, &actor, TransitionAction::ReApprove)
        .await
        .map_err(map_booking_error)?;

    Ok(transition_response(outcome))
}

#[axum::debug_handler]
pub async fn complete_booking(
    State(state): State<Arc<BookingCellState>>,
    Path(booking_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
) -> Result<Json<Value>, AppError> {
    let outcome = state
        .authority
        .request_transition(booking_id, &actor, TransitionAction::Complete)
        .await
        .map_err(map_booking_error)?;

    Ok(transition_response(outcome))
}

#[axum::debug_handler]
pub async fn update_booking_note(
    State(state): State<Arc<BookingCellState>>,
    Path(booking_id): Path<Uuid>,
    Extension(actor): Extension<Actor>,
    Json(request): Json<NoteUpdateRequest>,
) -> Result<Json<Value>, AppError> {
    let booking = state
        .authority
        .annotate(&actor, booking_id, request.note)
        .await
        .map_err(map_booking_error)?;

    Ok(Json(json!({
        "success": true,
        "booking": booking
    })))
}

// ==============================================================================
// LIVE UPDATES (SSE)
// ==============================================================================

/// Server-sent stream of booking snapshots matching the actor's scope.
/// Starts with a full snapshot so a reconnecting consumer converges, then
/// relays live updates; a lagged subscriber is resynced in place.
pub async fn stream_bookings(
    State(state): State<Arc<BookingCellState>>,
    Extension(actor): Extension<Actor>,
    Query(filter): Query<BookingFilter>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let filter = scoped_filter(&actor, filter)?;
    let mut updates = state.notifier.subscribe(filter.clone());
    let store = Arc::clone(&state.store);

    let (tx, rx) = mpsc::channel::<Event>(32);

    tokio::spawn(async move {
        for booking in store.list(&filter).await {
            if send_booking_event(&tx, &booking).await.is_err() {
                return;
            }
        }

        loop {
            match updates.next().await {
                Some(BookingUpdate::Changed(booking)) => {
                    if send_booking_event(&tx, &booking).await.is_err() {
                        return;
                    }
                }
                Some(BookingUpdate::Lagged(skipped)) => {
                    debug!("Stream lagged by {}; replaying snapshot", skipped);
                    for booking in store.list(&filter).await {
                        if send_booking_event(&tx, &booking).await.is_err() {
                            return;
                        }
                    }
                }
                None => return,
            }
        }
    });

    let stream = stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|event| (Ok::<_, Infallible>(event), rx))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

async fn send_booking_event(
    tx: &mpsc::Sender<Event>,
    booking: &Booking,
) -> Result<(), mpsc::error::SendError<Event>> {
    match Event::default().event("booking").json_data(booking) {
        Ok(event) => tx.send(event).await,
        Err(e) => {
            warn!("Failed to encode booking event: {}", e);
            Ok(())
        }
    }
}
