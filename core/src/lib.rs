//! # Swellbook Core
//!
//! The availability-and-booking reservation core for a surf-lesson
//! marketplace: instructor time slots with capacity, an atomic reservation
//! workflow that can never oversell a slot, and a role-gated booking status
//! state machine that restores slot capacity on cancellation.
//!
//! ## Core concepts
//!
//! - **Slot**: an instructor's bookable window of time at a location, with a
//!   capacity counter whose invariants live on the type itself
//! - **Booking**: a student's claim on one unit of slot capacity, carrying a
//!   denormalized copy of the slot's schedule
//! - **Transition table**: the single authoritative list of legal status
//!   moves and which party may drive them ([`status`])
//! - **Store**: injected persistence capability with an explicit unit of work
//!   ([`store::StoreTx`]); both workflows run entirely inside one transaction
//! - **Notifier**: fire-and-forget collaborator told about commits after the
//!   fact ([`notify`])
//!
//! ## Architecture principles
//!
//! - All occupancy and status writes flow through [`workflow::Reservations`];
//!   nothing else touches `current_bookings`, `is_available` or `status`
//! - The overselling race is closed by the store's transaction isolation, not
//!   by application-level check-then-write
//! - Dependencies (store, clock, notifier) are injected, so the same workflow
//!   code runs against `PostgreSQL` in production and an in-memory store in
//!   tests
//!
//! ## Example
//!
//! ```ignore
//! use swellbook_core::prelude::*;
//! use std::sync::Arc;
//!
//! async fn book(reservations: &Reservations<impl ReservationStore>) -> Result<(), BookingError> {
//!     let slot = reservations.create_slot(NewSlot {
//!         instructor_id,
//!         location_id,
//!         starts_at,
//!         duration_minutes: 90,
//!         max_students: 2,
//!     }).await?;
//!
//!     let booking = reservations.reserve(student_id, instructor_id, slot.id).await?;
//!     reservations.transition(booking.id, instructor_id, BookingStatus::Confirmed, None).await?;
//!     Ok(())
//! }
//! ```

pub mod booking;
pub mod clock;
pub mod error;
pub mod notify;
pub mod slot;
pub mod status;
pub mod store;
pub mod types;
pub mod workflow;

/// Convenient glob import for downstream crates.
pub mod prelude {
    pub use crate::booking::{Booking, BookingStatus, Cancellation};
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::error::{BookingError, StoreError};
    pub use crate::notify::{NoopNotifier, NotificationKind, Notifier, NotifyError};
    pub use crate::slot::Slot;
    pub use crate::status::ActorRole;
    pub use crate::store::{BookingQuery, ReservationStore, StoreTx, Timeframe};
    pub use crate::types::{BookingId, LocationId, Money, SlotId, UserId};
    pub use crate::workflow::{NewSlot, Reservations};
}

pub use prelude::*;
