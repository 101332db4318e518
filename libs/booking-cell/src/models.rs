// libs/booking-cell/src/models.rs
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE BOOKING MODELS
// ==============================================================================

/// The persisted record of an appointment. `version` is the optimistic
/// concurrency token: every commit bumps it, and a commit carrying a stale
/// version fails instead of overwriting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub clinic_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub status: BookingStatus,
    pub note: Option<String>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    Rescheduled,
}

impl BookingStatus {
    /// Terminal statuses have no outgoing transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingStatus::Pending => write!(f, "pending"),
            BookingStatus::Confirmed => write!(f, "confirmed"),
            BookingStatus::Cancelled => write!(f, "cancelled"),
            BookingStatus::Completed => write!(f, "completed"),
            BookingStatus::Rescheduled => write!(f, "rescheduled"),
        }
    }
}

// ==============================================================================
// TRANSITIONS
// ==============================================================================

/// A requested status change. Reschedule is the only action carrying a
/// payload; it moves the slot and forces `rescheduled` in the same commit.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionAction {
    Approve,
    Cancel,
    Reschedule {
        new_date: NaiveDate,
        new_time: NaiveTime,
    },
    ReApprove,
    Complete,
}

impl TransitionAction {
    pub fn name(&self) -> &'static str {
        match self {
            TransitionAction::Approve => "approve",
            TransitionAction::Cancel => "cancel",
            TransitionAction::Reschedule { .. } => "reschedule",
            TransitionAction::ReApprove => "re-approve",
            TransitionAction::Complete => "complete",
        }
    }

    pub fn target_status(&self) -> BookingStatus {
        match self {
            TransitionAction::Approve => BookingStatus::Confirmed,
            TransitionAction::Cancel => BookingStatus::Cancelled,
            TransitionAction::Reschedule { .. } => BookingStatus::Rescheduled,
            TransitionAction::ReApprove => BookingStatus::Confirmed,
            TransitionAction::Complete => BookingStatus::Completed,
        }
    }

    /// Actions with a payload are never treated as idempotent retries.
    pub fn carries_slot(&self) -> bool {
        matches!(self, TransitionAction::Reschedule { .. })
    }
}

/// Result of a transition request. `AlreadyApplied` means the booking was
/// found already holding the action's target status, either up front or after
/// losing a race to a writer with the same intent.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    Applied(Booking),
    AlreadyApplied(Booking),
}

impl TransitionOutcome {
    pub fn booking(&self) -> &Booking {
        match self {
            TransitionOutcome::Applied(b) | TransitionOutcome::AlreadyApplied(b) => b,
        }
    }

    pub fn into_booking(self) -> Booking {
        match self {
            TransitionOutcome::Applied(b) | TransitionOutcome::AlreadyApplied(b) => b,
        }
    }

    pub fn was_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied(_))
    }
}

// ==============================================================================
// REQUEST/FILTER MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    pub patient_id: Uuid,
    pub clinic_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleBookingRequest {
    pub new_date: NaiveDate,
    pub new_time: NaiveTime,
}

/// Field-level patch applied by `BookingStore::commit`. Status must only be
/// set by the transition authority; nothing else writes it.
#[derive(Debug, Clone, Default)]
pub struct BookingPatch {
    pub status: Option<BookingStatus>,
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<NaiveTime>,
    pub note: Option<String>,
}

/// Shared between `list` and `subscribe`: a booking matches when every set
/// field matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingFilter {
    pub clinic_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub status: Option<BookingStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
}

impl BookingFilter {
    pub fn for_patient(patient_id: Uuid) -> Self {
        Self {
            patient_id: Some(patient_id),
            ..Self::default()
        }
    }

    pub fn for_clinic(clinic_id: Uuid) -> Self {
        Self {
            clinic_id: Some(clinic_id),
            ..Self::default()
        }
    }

    pub fn matches(&self, booking: &Booking) -> bool {
        if let Some(clinic_id) = self.clinic_id {
            if booking.clinic_id != clinic_id {
                return false;
            }
        }
        if let Some(patient_id) = self.patient_id {
            if booking.patient_id != patient_id {
                return false;
            }
        }
        if let Some(doctor_id) = self.doctor_id {
            if booking.doctor_id != doctor_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if booking.status != status {
                return false;
            }
        }
        if let Some(from_date) = self.from_date {
            if booking.appointment_date < from_date {
                return false;
            }
        }
        if let Some(to_date) = self.to_date {
            if booking.appointment_date > to_date {
                return false;
            }
        }
        true
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotUnavailableReason {
    PastDate,
    ClinicClosedThatDay,
    OutsideOperatingHours,
}

impl fmt::Display for SlotUnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotUnavailableReason::PastDate => write!(f, "slot is in the past"),
            SlotUnavailableReason::ClinicClosedThatDay => {
                write!(f, "clinic is closed that day")
            }
            SlotUnavailableReason::OutsideOperatingHours => {
                write!(f, "slot is outside operating hours")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BookingError {
    #[error("Booking not found")]
    NotFound,

    #[error("Clinic not found")]
    ClinicNotFound,

    #[error("A booking for this slot already exists")]
    DuplicateBooking,

    #[error("Booking version has advanced")]
    VersionConflict,

    #[error("Booking was modified concurrently; reload and retry")]
    Stale,

    #[error("Cannot {action} a booking in status {from}")]
    IllegalTransition {
        from: BookingStatus,
        action: &'static str,
    },

    #[error("Slot unavailable: {0}")]
    SlotUnavailable(SlotUnavailableReason),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Booking store did not respond in time")]
    StoreTimeout,
}
