// libs/booking-cell/src/services/notifier.rs
use std::collections::HashMap;

use tokio::sync::broadcast;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Booking, BookingFilter};

/// Fans committed bookings out to live observers. Delivery is at-least-once
/// and unordered-safe: every message is a full-state snapshot, and consumers
/// drop anything older than what they hold.
pub struct ChangeNotifier {
    sender: broadcast::Sender<Booking>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Called once per committed transition. A notifier with no live
    /// subscribers is not an error; the actor's request already succeeded.
    pub fn publish(&self, booking: &Booking) {
        match self.sender.send(booking.clone()) {
            Ok(subscribers) => {
                debug!(
                    "Published booking {} v{} to {} subscribers",
                    booking.id, booking.version, subscribers
                );
            }
            Err(_) => {
                debug!("No live subscribers for booking {}", booking.id);
            }
        }
    }

    /// Lazy, restartable stream of updates matching the filter. A consumer
    /// that observes `Lagged` must resync from `BookingStore::list`.
    pub fn subscribe(&self, filter: BookingFilter) -> BookingUpdates {
        BookingUpdates {
            receiver: self.sender.subscribe(),
            filter,
        }
    }
}

impl Clone for ChangeNotifier {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum BookingUpdate {
    /// Full-state snapshot of a committed booking.
    Changed(Booking),
    /// The subscriber fell behind and `skipped` messages were dropped.
    Lagged(u64),
}

pub struct BookingUpdates {
    receiver: broadcast::Receiver<Booking>,
    filter: BookingFilter,
}

impl BookingUpdates {
    /// Next matching update; `None` once the notifier has shut down.
    pub async fn next(&mut self) -> Option<BookingUpdate> {
        loop {
            match self.receiver.recv().await {
                Ok(booking) if self.filter.matches(&booking) => {
                    return Some(BookingUpdate::Changed(booking));
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Subscriber lagged, {} updates dropped; resync required", skipped);
                    return Some(BookingUpdate::Lagged(skipped));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn filter(&self) -> &BookingFilter {
        &self.filter
    }
}

/// Consumer-side replica of the bookings a view cares about. Deliveries are
/// absorbed by version comparison, so duplicates and reordered messages are
/// harmless.
#[derive(Debug, Default)]
pub struct BookingView {
    rows: HashMap<Uuid, Booking>,
}

impl BookingView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held copy when the delivered one is newer. Returns whether
    /// the view changed; older and duplicate deliveries are discarded.
    pub fn absorb(&mut self, booking: Booking) -> bool {
        match self.rows.get(&booking.id) {
            Some(held) if held.version >= booking.version => false,
            _ => {
                self.rows.insert(booking.id, booking);
                true
            }
        }
    }

    /// Replace the whole view with a fresh `list` result after a gap.
    pub fn resync(&mut self, bookings: Vec<Booking>) {
        self.rows.clear();
        for booking in bookings {
            self.rows.insert(booking.id, booking);
        }
    }

    pub fn get(&self, booking_id: &Uuid) -> Option<&Booking> {
        self.rows.get(booking_id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
