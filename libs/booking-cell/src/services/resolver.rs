// libs/booking-cell/src/services/resolver.rs
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveTime, Utc};
use tracing::debug;
use uuid::Uuid;

use clinic_cell::services::directory::ClinicDirectoryService;

use crate::models::{Booking, BookingError, SlotUnavailableReason, TransitionAction};

/// Outcome of adjudicating a lost commit race. `AlreadyApplied` when the
/// winning writer had the same intent; `Retry` sends the loser back through
/// the legality check against the fresh state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjudication {
    AlreadyApplied,
    Retry,
}

/// Guards slots against clinic operating hours and adjudicates concurrent
/// transition races for the authority.
pub struct ConflictResolver {
    directory: Arc<ClinicDirectoryService>,
}

impl ConflictResolver {
    pub fn new(directory: Arc<ClinicDirectoryService>) -> Self {
        Self { directory }
    }

    /// Reject slots in the past, on a day the clinic is closed, or outside
    /// the clinic's operating hours for that weekday. Callers re-run this
    /// immediately before every commit attempt; hours may change in between.
    pub async fn validate_slot(
        &self,
        clinic_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<(), BookingError> {
        let slot_start = date.and_time(time).and_utc();
        if slot_start <= Utc::now() {
            return Err(BookingError::SlotUnavailable(SlotUnavailableReason::PastDate));
        }

        let hours = self
            .directory
            .hours_on(clinic_id, date.weekday())
            .await
            .map_err(|_| BookingError::ClinicNotFound)?;

        match hours {
            None => {
                debug!("Clinic {} closed on {}", clinic_id, date.weekday());
                Err(BookingError::SlotUnavailable(
                    SlotUnavailableReason::ClinicClosedThatDay,
                ))
            }
            Some(window) if time < window.opens_at || time >= window.closes_at => {
                debug!(
                    "Slot {} outside hours {}-{} for clinic {}",
                    time, window.opens_at, window.closes_at, clinic_id
                );
                Err(BookingError::SlotUnavailable(
                    SlotUnavailableReason::OutsideOperatingHours,
                ))
            }
            Some(_) => Ok(()),
        }
    }

    /// Last-committer-wins holds at the storage layer; here the losing writer
    /// learns whether the winner already produced its target state.
    pub fn adjudicate(&self, action: &TransitionAction, reloaded: &Booking) -> Adjudication {
        if !action.carries_slot() && reloaded.status == action.target_status() {
            Adjudication::AlreadyApplied
        } else {
            Adjudication::Retry
        }
    }
}
