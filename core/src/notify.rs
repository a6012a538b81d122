//! Notification collaborator contract.
//!
//! Reservation and transition workflows tell the counterpart actor what
//! happened after their transaction commits. Delivery is owned by an external
//! collaborator (email, in-app bell); the core only emits the call, and a
//! delivery failure never affects the outcome of the operation that triggered
//! it.
//!
//! # Dyn compatibility
//!
//! The trait returns `Pin<Box<dyn Future>>` instead of `async fn` so it can
//! be held as `Arc<dyn Notifier>` inside the workflows.

use crate::types::{BookingId, UserId};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// What happened to a booking, from the recipient's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationKind {
    /// A student reserved one of the recipient's slots
    BookingRequested,
    /// The instructor confirmed the recipient's booking
    BookingConfirmed,
    /// The counterpart cancelled the booking
    BookingCancelled,
    /// The instructor marked the lesson completed
    BookingCompleted,
    /// The instructor marked the recipient a no-show
    BookingNoShow,
}

/// Delivery failure reported by a notification collaborator.
///
/// Surfaced only in logs; callers of the workflows never see it.
#[derive(Error, Debug)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Fire-and-forget notification sink.
pub trait Notifier: Send + Sync {
    /// Tell `recipient` that `kind` happened to `booking_id`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] when delivery fails. The workflows log the
    /// failure and carry on.
    fn notify(
        &self,
        recipient: UserId,
        kind: NotificationKind,
        booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>>;
}

/// Notifier that drops everything, for deployments without a notification
/// service and as a default in tests that don't assert on notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(
        &self,
        _recipient: UserId,
        _kind: NotificationKind,
        _booking_id: BookingId,
    ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}
