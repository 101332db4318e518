pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use handlers::BookingCellState;
pub use models::*;
pub use router::booking_routes;
pub use services::authority::TransitionAuthority;
pub use services::notifier::{BookingUpdate, BookingUpdates, BookingView, ChangeNotifier};
pub use services::resolver::{Adjudication, ConflictResolver};
pub use services::store::BookingStore;
