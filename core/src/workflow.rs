//! Reservation workflow and status transition engine.
//!
//! [`Reservations`] owns every write to the slot and booking tables. Each
//! operation runs inside a single store transaction: the record is re-read
//! under the transaction (closing the read-then-write race at the store's
//! isolation level, not with an application-level check), mutated, and
//! committed atomically. Notification dispatch happens after commit and is
//! best-effort.

use crate::booking::{Booking, BookingStatus, Cancellation};
use crate::clock::Clock;
use crate::error::BookingError;
use crate::notify::{NotificationKind, Notifier};
use crate::slot::Slot;
use crate::status::{self, ActorRole};
use crate::store::{ReservationStore, StoreTx};
use crate::types::{BookingId, LocationId, SlotId, UserId};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Parameters for creating one availability slot.
#[derive(Clone, Copy, Debug)]
pub struct NewSlot {
    /// Owning instructor
    pub instructor_id: UserId,
    /// Where the lesson takes place
    pub location_id: LocationId,
    /// When the lesson starts
    pub starts_at: DateTime<Utc>,
    /// Lesson length in minutes
    pub duration_minutes: u32,
    /// Maximum number of students
    pub max_students: u32,
}

/// The reservation core: slot management, the atomic reserve operation and
/// the booking status state machine.
///
/// Generic over the store so production runs against `PostgreSQL` and tests
/// against the in-memory store, with identical workflow code.
pub struct Reservations<S> {
    store: S,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
}

impl<S: ReservationStore> Reservations<S> {
    /// Assemble the workflows around a store, a clock and a notification
    /// collaborator.
    pub fn new(store: S, clock: Arc<dyn Clock>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, clock, notifier }
    }

    /// The underlying store, for read-side queries.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Create one availability slot.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] for zero capacity or zero duration.
    /// - [`BookingError::Store`] on store failure.
    #[tracing::instrument(skip(self), fields(instructor = %params.instructor_id))]
    pub async fn create_slot(&self, params: NewSlot) -> Result<Slot, BookingError> {
        let slot = Slot::new(
            params.instructor_id,
            params.location_id,
            params.starts_at,
            params.duration_minutes,
            params.max_students,
        )?;
        let mut tx = self.store.begin().await?;
        tx.insert_slot(&slot).await?;
        tx.commit().await?;
        tracing::debug!(slot = %slot.id, starts_at = %slot.starts_at, "slot created");
        Ok(slot)
    }

    /// Create `count` back-to-back slots starting at `params.starts_at`, all
    /// sharing the same length and capacity. Used by availability seeding
    /// tooling; either every slot is created or none is.
    ///
    /// # Errors
    ///
    /// - [`BookingError::Validation`] when `count` is zero or any slot is
    ///   invalid.
    /// - [`BookingError::Store`] on store failure.
    #[tracing::instrument(skip(self), fields(instructor = %params.instructor_id, count))]
    pub async fn seed_slots(&self, params: NewSlot, count: u32) -> Result<Vec<Slot>, BookingError> {
        if count == 0 {
            return Err(BookingError::Validation("slot count must be at least 1".into()));
        }
        let mut slots = Vec::new();
        for i in 0..count {
            let offset = Duration::minutes(i64::from(i) * i64::from(params.duration_minutes));
            slots.push(Slot::new(
                params.instructor_id,
                params.location_id,
                params.starts_at + offset,
                params.duration_minutes,
                params.max_students,
            )?);
        }
        let mut tx = self.store.begin().await?;
        for slot in &slots {
            tx.insert_slot(slot).await?;
        }
        tx.commit().await?;
        tracing::debug!(created = slots.len(), "slots seeded");
        Ok(slots)
    }

    /// Atomically claim one unit of slot capacity for `student_id` and create
    /// the `pending` booking.
    ///
    /// The slot is re-read under the transaction, so concurrent reserves
    /// against the same slot serialize: at most `max_students` of them
    /// succeed and every other attempt fails with
    /// [`BookingError::SlotUnavailable`] without corrupting the counter.
    ///
    /// # Errors
    ///
    /// - [`BookingError::SlotNotFound`] when the slot does not exist.
    /// - [`BookingError::Validation`] when `instructor_id` does not own the
    ///   slot, or the instructor has no hourly rate on file.
    /// - [`BookingError::SlotUnavailable`] when capacity is exhausted or the
    ///   slot is closed.
    /// - [`BookingError::Store`] on store failure.
    #[tracing::instrument(skip(self), fields(student = %student_id, slot = %slot_id))]
    pub async fn reserve(
        &self,
        student_id: UserId,
        instructor_id: UserId,
        slot_id: SlotId,
    ) -> Result<Booking, BookingError> {
        let mut tx = self.store.begin().await?;

        let mut slot = tx
            .slot_for_update(slot_id)
            .await?
            .ok_or(BookingError::SlotNotFound(slot_id))?;
        if slot.instructor_id != instructor_id {
            return Err(BookingError::Validation(format!(
                "slot {slot_id} does not belong to instructor {instructor_id}"
            )));
        }

        let rate = tx.instructor_rate(instructor_id).await?.ok_or_else(|| {
            BookingError::Validation(format!("no hourly rate on file for {instructor_id}"))
        })?;

        slot.claim()?;
        let price = rate.for_minutes(slot.duration_minutes);
        let booking = Booking::pending(student_id, &slot, price, self.clock.now());

        tx.insert_booking(&booking).await?;
        tx.update_slot(&slot).await?;
        tx.commit().await?;

        tracing::info!(booking = %booking.id, price = %booking.price, "slot reserved");
        self.dispatch(instructor_id, NotificationKind::BookingRequested, booking.id).await;
        Ok(booking)
    }

    /// Move a booking to `target`, enforcing the transition table and
    /// restoring slot capacity on cancellation.
    ///
    /// The booking is re-read under the transaction; two racing transitions
    /// on the same booking serialize, and the loser fails cleanly against the
    /// winner's state instead of applying on a stale read.
    ///
    /// # Errors
    ///
    /// - [`BookingError::BookingNotFound`] when the booking does not exist.
    /// - [`BookingError::Forbidden`] when the actor is not a party to the
    ///   booking, or lacks the role the move requires.
    /// - [`BookingError::InvalidTransition`] when the move is illegal from
    ///   the booking's current status.
    /// - [`BookingError::Validation`] when a cancellation carries no reason.
    /// - [`BookingError::Store`] on store failure.
    #[tracing::instrument(skip(self, reason), fields(booking = %booking_id, actor = %actor_id, target = %target))]
    pub async fn transition(
        &self,
        booking_id: BookingId,
        actor_id: UserId,
        target: BookingStatus,
        reason: Option<String>,
    ) -> Result<Booking, BookingError> {
        let reason = reason.map(|r| r.trim().to_owned()).filter(|r| !r.is_empty());
        if status::requires_reason(target) && reason.is_none() {
            return Err(BookingError::Validation("a cancellation reason is required".into()));
        }

        let mut tx = self.store.begin().await?;

        let mut booking = tx
            .booking_for_update(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))?;

        let role = if actor_id == booking.student_id {
            ActorRole::Student
        } else if actor_id == booking.instructor_id {
            ActorRole::Instructor
        } else {
            return Err(BookingError::Forbidden(actor_id));
        };
        status::check_transition(booking.status, target, role, actor_id)?;

        let from = booking.status;
        booking.status = target;
        if target == BookingStatus::Cancelled {
            booking.cancellation = reason.map(|reason| Cancellation {
                reason,
                cancelled_by: actor_id,
                cancelled_at: self.clock.now(),
            });
            // Slot may already be gone for historical bookings; the booking's
            // denormalized schedule keeps it self-contained.
            if let Some(mut slot) = tx.slot_for_update(booking.slot_id).await? {
                slot.release();
                tx.update_slot(&slot).await?;
            }
        }

        tx.update_booking(&booking).await?;
        tx.commit().await?;

        tracing::info!(%from, to = %target, "booking transitioned");
        let counterpart = if role == ActorRole::Student {
            booking.instructor_id
        } else {
            booking.student_id
        };
        if let Some(kind) = notification_for(target) {
            self.dispatch(counterpart, kind, booking.id).await;
        }
        Ok(booking)
    }

    /// Permanently delete an unbooked slot.
    ///
    /// # Errors
    ///
    /// - [`BookingError::SlotNotFound`] when the slot does not exist.
    /// - [`BookingError::Forbidden`] when the actor does not own the slot.
    /// - [`BookingError::Conflict`] when the slot is closed or still claimed
    ///   by active bookings.
    /// - [`BookingError::Store`] on store failure.
    #[tracing::instrument(skip(self), fields(slot = %slot_id, actor = %actor_instructor_id))]
    pub async fn delete_slot(
        &self,
        slot_id: SlotId,
        actor_instructor_id: UserId,
    ) -> Result<(), BookingError> {
        let mut tx = self.store.begin().await?;

        let slot = tx
            .slot_for_update(slot_id)
            .await?
            .ok_or(BookingError::SlotNotFound(slot_id))?;
        if slot.instructor_id != actor_instructor_id {
            return Err(BookingError::Forbidden(actor_instructor_id));
        }
        if !slot.deletable() {
            return Err(BookingError::Conflict(slot_id));
        }

        tx.delete_slot(slot_id).await?;
        tx.commit().await?;
        tracing::info!("slot deleted");
        Ok(())
    }

    /// Fire the notification and swallow delivery failures.
    async fn dispatch(&self, recipient: UserId, kind: NotificationKind, booking_id: BookingId) {
        if let Err(err) = self.notifier.notify(recipient, kind, booking_id).await {
            tracing::warn!(%recipient, ?kind, %booking_id, %err, "notification delivery failed");
        }
    }
}

/// Map a transition target to the event the counterpart hears about.
const fn notification_for(target: BookingStatus) -> Option<NotificationKind> {
    match target {
        BookingStatus::Confirmed => Some(NotificationKind::BookingConfirmed),
        BookingStatus::Cancelled => Some(NotificationKind::BookingCancelled),
        BookingStatus::Completed => Some(NotificationKind::BookingCompleted),
        BookingStatus::NoShow => Some(NotificationKind::BookingNoShow),
        // Nothing transitions *to* pending; the table rejects it first.
        BookingStatus::Pending => None,
    }
}
