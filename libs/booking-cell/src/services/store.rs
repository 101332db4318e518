// libs/booking-cell/src/services/store.rs
use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    Booking, BookingError, BookingFilter, BookingPatch, BookingStatus, CreateBookingRequest,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SlotKey {
    patient_id: Uuid,
    clinic_id: Uuid,
    doctor_id: Uuid,
    date: NaiveDate,
    time: NaiveTime,
}

impl SlotKey {
    fn of(booking: &Booking) -> Self {
        Self {
            patient_id: booking.patient_id,
            clinic_id: booking.clinic_id,
            doctor_id: booking.doctor_id,
            date: booking.appointment_date,
            time: booking.appointment_time,
        }
    }
}

#[derive(Default)]
struct StoreInner {
    rows: HashMap<Uuid, Booking>,
    // One row per (patient, clinic, doctor, date, time), any status.
    slots: HashMap<SlotKey, Uuid>,
}

/// Single source of truth for bookings. All status mutation flows through
/// `commit`, driven by the transition authority; reads never queue behind
/// anything but the lock itself.
pub struct BookingStore {
    inner: RwLock<StoreInner>,
}

impl BookingStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner::default()),
        }
    }

    /// Create a booking in `pending` at version 1. Fails with
    /// `DuplicateBooking` when the patient already holds the identical slot.
    pub async fn create(&self, request: CreateBookingRequest) -> Result<Booking, BookingError> {
        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            clinic_id: request.clinic_id,
            doctor_id: request.doctor_id,
            appointment_date: request.appointment_date,
            appointment_time: request.appointment_time,
            status: BookingStatus::Pending,
            note: request.note,
            version: 1,
            created_at: now,
            updated_at: now,
            confirmed_at: None,
        };

        let key = SlotKey::of(&booking);
        let mut inner = self.inner.write().await;

        if inner.slots.contains_key(&key) {
            warn!(
                "Duplicate booking rejected for patient {} at {} {}",
                booking.patient_id, booking.appointment_date, booking.appointment_time
            );
            return Err(BookingError::DuplicateBooking);
        }

        inner.slots.insert(key, booking.id);
        inner.rows.insert(booking.id, booking.clone());

        info!("Booking {} created for patient {}", booking.id, booking.patient_id);
        Ok(booking)
    }

    pub async fn get(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        let inner = self.inner.read().await;
        inner
            .rows
            .get(&booking_id)
            .cloned()
            .ok_or(BookingError::NotFound)
    }

    /// Compare-and-swap commit. The caller supplies the version it last
    /// observed; if the stored version has advanced the commit fails with
    /// `VersionConflict` instead of overwriting. On success the version is
    /// bumped, `updated_at` refreshed, and `confirmed_at` stamped the first
    /// time the booking reaches `confirmed`.
    pub async fn commit(
        &self,
        booking_id: Uuid,
        previous_version: u64,
        patch: BookingPatch,
    ) -> Result<Booking, BookingError> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;

        let current = inner
            .rows
            .get(&booking_id)
            .cloned()
            .ok_or(BookingError::NotFound)?;

        if current.version != previous_version {
            debug!(
                "Version conflict on booking {}: observed v{}, stored v{}",
                booking_id, previous_version, current.version
            );
            return Err(BookingError::VersionConflict);
        }

        let mut updated = current.clone();

        if patch.appointment_date.is_some() || patch.appointment_time.is_some() {
            updated.appointment_date = patch.appointment_date.unwrap_or(current.appointment_date);
            updated.appointment_time = patch.appointment_time.unwrap_or(current.appointment_time);

            let old_key = SlotKey::of(&current);
            let new_key = SlotKey::of(&updated);
            if new_key != old_key {
                if inner.slots.contains_key(&new_key) {
                    return Err(BookingError::DuplicateBooking);
                }
                inner.slots.remove(&old_key);
                inner.slots.insert(new_key, booking_id);
            }
        }

        if let Some(status) = patch.status {
            updated.status = status;
            if status == BookingStatus::Confirmed && updated.confirmed_at.is_none() {
                updated.confirmed_at = Some(now);
            }
        }

        if let Some(note) = patch.note {
            updated.note = Some(note);
        }

        updated.version = current.version + 1;
        updated.updated_at = now;

        inner.rows.insert(booking_id, updated.clone());

        debug!(
            "Booking {} committed: v{} -> v{}, status {}",
            booking_id, previous_version, updated.version, updated.status
        );
        Ok(updated)
    }

    /// All bookings matching the filter, ordered by slot (date, then time).
    pub async fn list(&self, filter: &BookingFilter) -> Vec<Booking> {
        let inner = self.inner.read().await;
        let mut matching: Vec<Booking> = inner
            .rows
            .values()
            .filter(|booking| filter.matches(booking))
            .cloned()
            .collect();

        matching.sort_by_key(|b| (b.appointment_date, b.appointment_time));
        matching
    }

    /// Administrative purge. Removal is not a lifecycle transition; a
    /// concurrent transition observes the disappearance as `NotFound`.
    pub async fn remove(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        let mut inner = self.inner.write().await;

        let removed = inner
            .rows
            .remove(&booking_id)
            .ok_or(BookingError::NotFound)?;
        inner.slots.remove(&SlotKey::of(&removed));

        info!("Booking {} removed from store", booking_id);
        Ok(removed)
    }
}

impl Default for BookingStore {
    fn default() -> Self {
        Self::new()
    }
}
