//! Availability slots: an instructor's bookable window of time at a location.
//!
//! Occupancy invariants live here as methods so the workflows can only move
//! the counter through [`Slot::claim`] and [`Slot::release`]:
//!
//! - `0 <= current_bookings <= max_students`
//! - `is_available` is true iff `current_bookings < max_students`
//!   (administrative override excepted)
//!
//! A slot stores a single timezone-aware start instant plus a duration. It
//! deliberately does not store a naive calendar date: any "is this today?"
//! classification is done by the caller against an explicit reference instant.

use crate::error::BookingError;
use crate::types::{LocationId, SlotId, UserId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// An instructor's bookable time slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Slot identifier
    pub id: SlotId,
    /// Owning instructor
    pub instructor_id: UserId,
    /// Where the lesson takes place
    pub location_id: LocationId,
    /// When the lesson starts
    pub starts_at: DateTime<Utc>,
    /// Lesson length in minutes
    pub duration_minutes: u32,
    /// Maximum number of students the slot can hold
    pub max_students: u32,
    /// Number of non-cancelled bookings currently claiming capacity
    pub current_bookings: u32,
    /// Whether the slot is open for new reservations
    pub is_available: bool,
}

impl Slot {
    /// Create a fresh, unbooked slot.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Validation`] when `max_students` is zero or
    /// `duration_minutes` is zero.
    pub fn new(
        instructor_id: UserId,
        location_id: LocationId,
        starts_at: DateTime<Utc>,
        duration_minutes: u32,
        max_students: u32,
    ) -> Result<Self, BookingError> {
        if max_students == 0 {
            return Err(BookingError::Validation(
                "slot capacity must be at least 1".into(),
            ));
        }
        if duration_minutes == 0 {
            return Err(BookingError::Validation(
                "slot duration must be positive".into(),
            ));
        }
        Ok(Self {
            id: SlotId::new(),
            instructor_id,
            location_id,
            starts_at,
            duration_minutes,
            max_students,
            current_bookings: 0,
            is_available: true,
        })
    }

    /// When the lesson ends.
    #[must_use]
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.starts_at + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Whether at least one unit of capacity remains.
    #[must_use]
    pub const fn has_capacity(&self) -> bool {
        self.current_bookings < self.max_students
    }

    /// Claim one unit of capacity for a new booking.
    ///
    /// Flips `is_available` off when the claim fills the slot. Callers must
    /// hold the slot under a store transaction so concurrent claims serialize.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::SlotUnavailable`] when the slot is marked
    /// unavailable or already full.
    pub fn claim(&mut self) -> Result<(), BookingError> {
        if !self.is_available || !self.has_capacity() {
            return Err(BookingError::SlotUnavailable(self.id));
        }
        self.current_bookings += 1;
        if self.current_bookings == self.max_students {
            self.is_available = false;
        }
        Ok(())
    }

    /// Return one unit of capacity after a cancellation.
    ///
    /// Floors at zero and re-opens the slot; cancelling always frees exactly
    /// one unit.
    pub const fn release(&mut self) {
        self.current_bookings = self.current_bookings.saturating_sub(1);
        self.is_available = true;
    }

    /// Whether the slot may be deleted: still open and never claimed.
    #[must_use]
    pub const fn deletable(&self) -> bool {
        self.is_available && self.current_bookings == 0
    }
}
