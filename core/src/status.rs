//! The booking status transition table.
//!
//! This module is the single authoritative location for which status moves
//! are legal and which party may drive them. Handlers never branch on roles
//! themselves; they ask [`check_transition`].
//!
//! | From      | To        | Allowed actor         | Extra precondition |
//! |-----------|-----------|-----------------------|--------------------|
//! | pending   | confirmed | instructor only       | none               |
//! | pending   | cancelled | student or instructor | reason required    |
//! | confirmed | cancelled | student or instructor | reason required    |
//! | confirmed | completed | instructor only       | none               |
//! | confirmed | no_show   | instructor only       | none               |
//!
//! Everything else is rejected. Transitions out of a terminal state always
//! fail.

use crate::booking::BookingStatus;
use crate::error::BookingError;
use crate::types::UserId;

/// The role an actor plays on a particular booking.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActorRole {
    /// The booking's student
    Student,
    /// The booking's instructor
    Instructor,
}

/// Which parties may drive a given (from, to) move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Permit {
    InstructorOnly,
    EitherParty,
}

impl Permit {
    const fn allows(self, role: ActorRole) -> bool {
        match self {
            Self::InstructorOnly => matches!(role, ActorRole::Instructor),
            Self::EitherParty => true,
        }
    }
}

/// Look up the (from, to) pair in the table, ignoring the actor.
const fn permit_for(from: BookingStatus, to: BookingStatus) -> Option<Permit> {
    use BookingStatus::{Cancelled, Completed, Confirmed, NoShow, Pending};
    match (from, to) {
        (Pending, Confirmed) | (Confirmed, Completed | NoShow) => Some(Permit::InstructorOnly),
        (Pending | Confirmed, Cancelled) => Some(Permit::EitherParty),
        _ => None,
    }
}

/// Validate a requested status move for the booking's current status and the
/// caller's role.
///
/// Precedence: a pair that is illegal for every role reports
/// [`BookingError::InvalidTransition`]; a legal pair attempted by the wrong
/// role reports [`BookingError::Forbidden`] naming `actor_id`.
///
/// # Errors
///
/// - [`BookingError::InvalidTransition`] when no actor may make this move.
/// - [`BookingError::Forbidden`] when the move exists but not for this role.
pub const fn check_transition(
    from: BookingStatus,
    to: BookingStatus,
    role: ActorRole,
    actor_id: UserId,
) -> Result<(), BookingError> {
    match permit_for(from, to) {
        None => Err(BookingError::InvalidTransition { from, to }),
        Some(permit) => {
            if permit.allows(role) {
                Ok(())
            } else {
                Err(BookingError::Forbidden(actor_id))
            }
        }
    }
}

/// Whether the move requires a cancellation reason.
#[must_use]
pub const fn requires_reason(to: BookingStatus) -> bool {
    matches!(to, BookingStatus::Cancelled)
}
