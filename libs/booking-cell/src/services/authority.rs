// libs/booking-cell/src/services/authority.rs
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_models::auth::{Actor, Role};

use crate::models::{
    Booking, BookingError, BookingPatch, BookingStatus, CreateBookingRequest, TransitionAction,
    TransitionOutcome,
};
use crate::services::notifier::ChangeNotifier;
use crate::services::resolver::{Adjudication, ConflictResolver};
use crate::services::store::BookingStore;

/// The sole writer of booking status. Every transition funnels through one
/// legality matrix here instead of each surface checking its own permissions.
pub struct TransitionAuthority {
    store: Arc<BookingStore>,
    resolver: ConflictResolver,
    notifier: ChangeNotifier,
    store_timeout: Duration,
}

impl TransitionAuthority {
    pub fn new(
        store: Arc<BookingStore>,
        resolver: ConflictResolver,
        notifier: ChangeNotifier,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            resolver,
            notifier,
            store_timeout,
        }
    }

    /// Patients create their own bookings, in `pending`, against a slot the
    /// clinic is actually open for.
    pub async fn create_booking(
        &self,
        actor: &Actor,
        request: CreateBookingRequest,
    ) -> Result<Booking, BookingError> {
        if actor.role != Role::Patient || actor.id != request.patient_id {
            return Err(BookingError::Forbidden(
                "Bookings are created by the patient who holds them".to_string(),
            ));
        }

        self.resolver
            .validate_slot(
                request.clinic_id,
                request.appointment_date,
                request.appointment_time,
            )
            .await?;

        let booking = self.bounded(self.store.create(request)).await??;

        info!(
            "Booking {} created by patient {} for clinic {}",
            booking.id, actor.id, booking.clinic_id
        );
        self.notifier.publish(&booking);
        Ok(booking)
    }

    /// Validate and apply a requested status change.
    ///
    /// On a lost commit race the request is retried exactly once against the
    /// reloaded state: a winner with the same target reads as success, a
    /// conflicting winner sends the action back through the legality matrix,
    /// and a second conflict surfaces as `Stale`.
    pub async fn request_transition(
        &self,
        booking_id: Uuid,
        actor: &Actor,
        action: TransitionAction,
    ) -> Result<TransitionOutcome, BookingError> {
        debug!(
            "Transition requested: {} on booking {} by {} ({})",
            action.name(),
            booking_id,
            actor.id,
            actor.role
        );

        let booking = self.bounded(self.store.get(booking_id)).await??;

        self.check_role(actor, &action, &booking)?;

        // Payload-free actions whose target the booking already holds are
        // idempotent retries, not errors.
        if !action.carries_slot() && booking.status == action.target_status() {
            debug!(
                "Booking {} already {}; treating {} as applied",
                booking_id,
                booking.status,
                action.name()
            );
            return Ok(TransitionOutcome::AlreadyApplied(booking));
        }

        self.check_status(&booking, &action)?;

        let patch = Self::patch_for(&action);

        match self.commit_once(&booking, &action, patch.clone()).await {
            Ok(committed) => {
                info!(
                    "Booking {} transitioned to {} by {} ({})",
                    booking_id, committed.status, actor.id, actor.role
                );
                self.notifier.publish(&committed);
                Ok(TransitionOutcome::Applied(committed))
            }
            Err(BookingError::VersionConflict) => {
                // A row purged mid-flight surfaces here as NotFound.
                let reloaded = self.bounded(self.store.get(booking_id)).await??;

                match self.resolver.adjudicate(&action, &reloaded) {
                    Adjudication::AlreadyApplied => {
                        info!(
                            "Booking {} reached {} concurrently; {} treated as applied",
                            booking_id,
                            reloaded.status,
                            action.name()
                        );
                        Ok(TransitionOutcome::AlreadyApplied(reloaded))
                    }
                    Adjudication::Retry => {
                        self.check_status(&reloaded, &action)?;
                        match self.commit_once(&reloaded, &action, patch).await {
                            Ok(committed) => {
                                info!(
                                    "Booking {} transitioned to {} on retry",
                                    booking_id, committed.status
                                );
                                self.notifier.publish(&committed);
                                Ok(TransitionOutcome::Applied(committed))
                            }
                            Err(BookingError::VersionConflict) => {
                                warn!("Booking {} still contended after retry", booking_id);
                                Err(BookingError::Stale)
                            }
                            Err(e) => Err(e),
                        }
                    }
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Free-text annotation, clinic/super admin only. Uses the same CAS and
    /// bounded-retry discipline as transitions, without touching status.
    pub async fn annotate(
        &self,
        actor: &Actor,
        booking_id: Uuid,
        note: String,
    ) -> Result<Booking, BookingError> {
        let booking = self.bounded(self.store.get(booking_id)).await??;

        let allowed = match actor.role {
            Role::SuperAdmin => true,
            Role::ClinicAdmin => actor.clinic_id == Some(booking.clinic_id),
            Role::Patient => false,
        };
        if !allowed {
            return Err(BookingError::Forbidden(
                "Only clinic or super admins may annotate bookings".to_string(),
            ));
        }

        let patch = BookingPatch {
            note: Some(note),
            ..BookingPatch::default()
        };

        let committed = match self
            .bounded(self.store.commit(booking.id, booking.version, patch.clone()))
            .await?
        {
            Ok(committed) => committed,
            Err(BookingError::VersionConflict) => {
                let reloaded = self.bounded(self.store.get(booking_id)).await??;
                self.bounded(self.store.commit(reloaded.id, reloaded.version, patch))
                    .await?
                    .map_err(|e| match e {
                        BookingError::VersionConflict => BookingError::Stale,
                        other => other,
                    })?
            }
            Err(e) => return Err(e),
        };

        self.notifier.publish(&committed);
        Ok(committed)
    }

    /// Physical removal, super admin only, behind the handler's confirmation
    /// gate. Not a lifecycle transition; observers converge via resync.
    pub async fn purge(&self, actor: &Actor, booking_id: Uuid) -> Result<Booking, BookingError> {
        if actor.role != Role::SuperAdmin {
            return Err(BookingError::Forbidden(
                "Only super admins may delete bookings".to_string(),
            ));
        }

        let removed = self.bounded(self.store.remove(booking_id)).await??;
        info!("Booking {} purged by super admin {}", booking_id, actor.id);
        Ok(removed)
    }

    // ==============================================================================
    // LEGALITY MATRIX
    // ==============================================================================

    /// Who may invoke which action. Patients act on their own bookings,
    /// clinic admins within their own clinic, super admins anywhere; the
    /// re-approval after a reschedule belongs to the patient alone.
    fn check_role(
        &self,
        actor: &Actor,
        action: &TransitionAction,
        booking: &Booking,
    ) -> Result<(), BookingError> {
        let allowed = match (actor.role, action) {
            (Role::Patient, TransitionAction::Cancel)
            | (Role::Patient, TransitionAction::ReApprove) => actor.id == booking.patient_id,
            (Role::Patient, _) => false,
            (Role::ClinicAdmin, TransitionAction::ReApprove) => false,
            (Role::ClinicAdmin, _) => actor.clinic_id == Some(booking.clinic_id),
            (Role::SuperAdmin, TransitionAction::ReApprove) => false,
            (Role::SuperAdmin, _) => true,
        };

        if allowed {
            Ok(())
        } else {
            Err(BookingError::Forbidden(format!(
                "{} may not {} this booking",
                actor.role,
                action.name()
            )))
        }
    }

    /// Which actions are legal from which status. Terminal statuses have no
    /// outgoing transitions.
    fn check_status(&self, booking: &Booking, action: &TransitionAction) -> Result<(), BookingError> {
        let legal = match action {
            TransitionAction::Approve => booking.status == BookingStatus::Pending,
            TransitionAction::Cancel => !booking.status.is_terminal(),
            TransitionAction::Reschedule { .. } => booking.status == BookingStatus::Confirmed,
            TransitionAction::ReApprove => booking.status == BookingStatus::Rescheduled,
            TransitionAction::Complete => booking.status == BookingStatus::Confirmed,
        };

        if legal {
            Ok(())
        } else {
            warn!(
                "Illegal transition attempted: {} from {} on booking {}",
                action.name(),
                booking.status,
                booking.id
            );
            Err(BookingError::IllegalTransition {
                from: booking.status,
                action: action.name(),
            })
        }
    }

    fn patch_for(action: &TransitionAction) -> BookingPatch {
        match action {
            TransitionAction::Reschedule { new_date, new_time } => BookingPatch {
                status: Some(BookingStatus::Rescheduled),
                appointment_date: Some(*new_date),
                appointment_time: Some(*new_time),
                ..BookingPatch::default()
            },
            other => BookingPatch {
                status: Some(other.target_status()),
                ..BookingPatch::default()
            },
        }
    }

    /// Slot validity is re-verified against current clinic hours immediately
    /// before every commit attempt, not just at request time.
    async fn commit_once(
        &self,
        observed: &Booking,
        action: &TransitionAction,
        patch: BookingPatch,
    ) -> Result<Booking, BookingError> {
        if let TransitionAction::Reschedule { new_date, new_time } = action {
            self.resolver
                .validate_slot(observed.clinic_id, *new_date, *new_time)
                .await?;
        }

        self.bounded(self.store.commit(observed.id, observed.version, patch))
            .await?
    }

    /// Store round-trips are bounded; a timed-out request is failed, never
    /// half-applied, and is not retried here.
    async fn bounded<F, T>(&self, fut: F) -> Result<T, BookingError>
    where
        F: Future<Output = T>,
    {
        timeout(self.store_timeout, fut)
            .await
            .map_err(|_| BookingError::StoreTimeout)
    }
}
