//! Store abstraction for slots, bookings and instructor rates.
//!
//! # Design
//!
//! The store is deliberately minimal and focused. It provides exactly what
//! the two transactional workflows and the read-only display layer need:
//!
//! - A unit of work ([`StoreTx`]) that reads records *under the transaction*
//!   (row locks in the `PostgreSQL` implementation) and applies all writes
//!   atomically on [`StoreTx::commit`]. Dropping a transaction without
//!   committing rolls every write back.
//! - Plain read-side queries for dashboards, which may be served without a
//!   transaction (eventually-consistent reads are acceptable there).
//!
//! The occupancy counter (`current_bookings`), the availability flag and the
//! booking status are only ever written through a [`StoreTx`] held by
//! [`crate::workflow::Reservations`]; no other code path may touch them.
//!
//! # Implementations
//!
//! - `PgReservationStore` (in `swellbook-postgres`): production implementation
//! - `InMemoryReservationStore` (in `swellbook-testing`): fast, deterministic
//!   testing

use crate::booking::{Booking, BookingStatus};
use crate::error::StoreError;
use crate::slot::Slot;
use crate::types::{BookingId, Money, SlotId, UserId};
use chrono::{DateTime, Utc};
use std::future::Future;

/// Upcoming/past filter for booking queries.
///
/// The reference instant is always supplied by the caller. The core never
/// derives "today" from a naive local date, so day-boundary classification is
/// exact regardless of the viewer's timezone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timeframe {
    /// No time filter
    Any,
    /// Lessons that have not yet finished at the reference instant
    Upcoming(DateTime<Utc>),
    /// Lessons that finished before the reference instant
    Past(DateTime<Utc>),
}

/// Read-side filter over bookings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BookingQuery {
    /// Keep only bookings with this status
    pub status: Option<BookingStatus>,
    /// Keep only upcoming or past lessons
    pub timeframe: Timeframe,
}

impl BookingQuery {
    /// Match everything.
    #[must_use]
    pub const fn any() -> Self {
        Self { status: None, timeframe: Timeframe::Any }
    }

    /// Restrict to a single status.
    #[must_use]
    pub const fn with_status(mut self, status: BookingStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restrict to lessons not yet finished at `now`.
    #[must_use]
    pub const fn upcoming(mut self, now: DateTime<Utc>) -> Self {
        self.timeframe = Timeframe::Upcoming(now);
        self
    }

    /// Restrict to lessons already finished at `now`.
    #[must_use]
    pub const fn past(mut self, now: DateTime<Utc>) -> Self {
        self.timeframe = Timeframe::Past(now);
        self
    }

    /// Whether `booking` satisfies this filter.
    #[must_use]
    pub fn matches(&self, booking: &Booking) -> bool {
        if let Some(status) = self.status {
            if booking.status != status {
                return false;
            }
        }
        match self.timeframe {
            Timeframe::Any => true,
            Timeframe::Upcoming(now) => booking.ends_at() > now,
            Timeframe::Past(now) => booking.ends_at() <= now,
        }
    }
}

impl Default for BookingQuery {
    fn default() -> Self {
        Self::any()
    }
}

/// Store abstraction over slots, bookings and instructor hourly rates.
///
/// # Thread safety
///
/// Implementations must be `Send + Sync`; the workflows are shared across
/// request handlers.
pub trait ReservationStore: Send + Sync {
    /// The unit-of-work type produced by [`Self::begin`].
    type Tx: StoreTx;

    /// Open a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] when a connection cannot be acquired
    /// or the transaction cannot be started.
    fn begin(&self) -> impl Future<Output = Result<Self::Tx, StoreError>> + Send;

    /// Fetch a slot by id (non-transactional read).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    fn slot(&self, id: SlotId) -> impl Future<Output = Result<Option<Slot>, StoreError>> + Send;

    /// Fetch a booking by id (non-transactional read).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    fn booking(
        &self,
        id: BookingId,
    ) -> impl Future<Output = Result<Option<Booking>, StoreError>> + Send;

    /// List an instructor's slots starting at or after `from`, ordered by
    /// start time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    fn slots_for_instructor(
        &self,
        instructor_id: UserId,
        from: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Slot>, StoreError>> + Send;

    /// List a student's bookings matching `query`, newest lesson first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    fn bookings_for_student(
        &self,
        student_id: UserId,
        query: &BookingQuery,
    ) -> impl Future<Output = Result<Vec<Booking>, StoreError>> + Send;

    /// List an instructor's bookings matching `query`, newest lesson first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    fn bookings_for_instructor(
        &self,
        instructor_id: UserId,
        query: &BookingQuery,
    ) -> impl Future<Output = Result<Vec<Booking>, StoreError>> + Send;

    /// Record or replace an instructor's hourly rate.
    ///
    /// Rates are reference data maintained by the (out-of-core) profile
    /// layer; the core only ever reads them when pricing a reservation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on write failure.
    fn set_instructor_rate(
        &self,
        instructor_id: UserId,
        hourly_rate: Money,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// A unit of work over the reservation tables.
///
/// All reads issued through a `StoreTx` observe a consistent snapshot and,
/// for `*_for_update` reads, block concurrent transactions touching the same
/// row until this transaction finishes. Writes become visible atomically on
/// [`StoreTx::commit`]; a dropped, uncommitted transaction leaves no partial
/// state.
pub trait StoreTx: Send + Sized {
    /// Read a slot with an exclusive row lock.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    fn slot_for_update(
        &mut self,
        id: SlotId,
    ) -> impl Future<Output = Result<Option<Slot>, StoreError>> + Send;

    /// Read a booking with an exclusive row lock.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    fn booking_for_update(
        &mut self,
        id: BookingId,
    ) -> impl Future<Output = Result<Option<Booking>, StoreError>> + Send;

    /// Read an instructor's current hourly rate under the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on query failure.
    fn instructor_rate(
        &mut self,
        instructor_id: UserId,
    ) -> impl Future<Output = Result<Option<Money>, StoreError>> + Send;

    /// Stage a new slot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on write failure.
    fn insert_slot(&mut self, slot: &Slot)
    -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Stage a new booking.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on write failure.
    fn insert_booking(
        &mut self,
        booking: &Booking,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Stage an update to an existing slot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on write failure.
    fn update_slot(&mut self, slot: &Slot)
    -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Stage an update to an existing booking.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on write failure.
    fn update_booking(
        &mut self,
        booking: &Booking,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Stage permanent removal of a slot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on write failure.
    fn delete_slot(&mut self, id: SlotId) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Commit every staged write atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] when the commit fails; no staged
    /// write is applied in that case.
    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;
}
