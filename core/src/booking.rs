//! Bookings: a student's claim on one unit of slot capacity.
//!
//! A booking carries its own copy of the slot's location, start instant and
//! duration. Slots can be deleted once they are no longer referenced by an
//! active booking; the denormalized copy keeps historical bookings intact
//! when that happens.

use crate::slot::Slot;
use crate::types::{BookingId, LocationId, Money, SlotId, UserId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a booking.
///
/// `Pending` is the unique initial state. `Completed`, `NoShow` and
/// `Cancelled` are terminal. The legal moves between states live in
/// [`crate::status`]; nothing else in the crate encodes transition rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Reserved, awaiting instructor confirmation
    Pending,
    /// Confirmed by the instructor
    Confirmed,
    /// Lesson took place
    Completed,
    /// Student did not show up
    NoShow,
    /// Cancelled by either party
    Cancelled,
}

impl BookingStatus {
    /// Whether no further transitions are possible from this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::NoShow | Self::Cancelled)
    }

    /// Stable string form used for persistence and display.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::NoShow => "no_show",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the persisted string form.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "confirmed" => Some(Self::Confirmed),
            "completed" => Some(Self::Completed),
            "no_show" => Some(Self::NoShow),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who cancelled a booking, when, and why.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cancellation {
    /// Free-form reason supplied by the cancelling party
    pub reason: String,
    /// The party that cancelled
    pub cancelled_by: UserId,
    /// When the cancellation was applied
    pub cancelled_at: DateTime<Utc>,
}

/// A student's reservation of one unit of slot capacity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking identifier
    pub id: BookingId,
    /// The student who reserved
    pub student_id: UserId,
    /// The instructor giving the lesson
    pub instructor_id: UserId,
    /// The slot whose capacity this booking claims
    pub slot_id: SlotId,
    /// Lesson location, copied from the slot at creation
    pub location_id: LocationId,
    /// Lesson start, copied from the slot at creation
    pub starts_at: DateTime<Utc>,
    /// Lesson length in minutes, copied from the slot at creation
    pub duration_minutes: u32,
    /// Price charged for the lesson
    pub price: Money,
    /// Current lifecycle status
    pub status: BookingStatus,
    /// Present once the booking has been cancelled
    pub cancellation: Option<Cancellation>,
    /// When the booking was created
    pub created_at: DateTime<Utc>,
}

impl Booking {
    /// Create a `Pending` booking for `student_id` against `slot`, copying
    /// the slot's location and schedule.
    #[must_use]
    pub fn pending(
        student_id: UserId,
        slot: &Slot,
        price: Money,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: BookingId::new(),
            student_id,
            instructor_id: slot.instructor_id,
            slot_id: slot.id,
            location_id: slot.location_id,
            starts_at: slot.starts_at,
            duration_minutes: slot.duration_minutes,
            price,
            status: BookingStatus::Pending,
            cancellation: None,
            created_at,
        }
    }

    /// When the lesson ends.
    #[must_use]
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.starts_at + Duration::minutes(i64::from(self.duration_minutes))
    }

    /// Whether the booking still claims slot capacity (pending or confirmed).
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.status, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}
