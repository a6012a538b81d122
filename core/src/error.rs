//! Error taxonomy for the reservation core.
//!
//! Every operation returns one of these typed failures to its immediate
//! caller; the surrounding API layer owns the translation into user-facing
//! messages. The core never retries internally - `SlotUnavailable` is a
//! definitive answer for that attempt, because capacity may legitimately
//! remain exhausted.

use crate::booking::BookingStatus;
use crate::types::{BookingId, SlotId, UserId};
use thiserror::Error;

/// Errors produced by the reservation workflow, the status transition engine
/// and the slot store.
#[derive(Error, Debug)]
pub enum BookingError {
    /// Referenced slot does not exist.
    #[error("slot not found: {0}")]
    SlotNotFound(SlotId),

    /// Referenced booking does not exist.
    #[error("booking not found: {0}")]
    BookingNotFound(BookingId),

    /// Capacity exhausted or slot marked unavailable at the moment of
    /// reservation. Recoverable by the caller (pick another slot).
    #[error("slot {0} is not available for booking")]
    SlotUnavailable(SlotId),

    /// Requested status change is not legal from the current state.
    #[error("cannot move booking from {from} to {to}")]
    InvalidTransition {
        /// Status the booking currently holds.
        from: BookingStatus,
        /// Status the caller asked for.
        to: BookingStatus,
    },

    /// Actor is not a party to the booking, or lacks the role required for
    /// the requested transition (e.g. a student attempting to confirm).
    #[error("user {0} may not perform this action")]
    Forbidden(UserId),

    /// Deletion attempted on a slot that still has active bookings.
    #[error("slot {0} still has active bookings")]
    Conflict(SlotId),

    /// Malformed input (missing cancellation reason, zero capacity, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Data store failure (connection, query, serialization).
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Infrastructure-level failure reported by a [`crate::store::ReservationStore`]
/// implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// A row could not be mapped onto a domain type.
    #[error("corrupt record: {0}")]
    CorruptRecord(String),
}
