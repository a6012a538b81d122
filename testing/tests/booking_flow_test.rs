//! Booking lifecycle edge case tests.
//!
//! Tests the reserve → confirm/complete/cancel flows, actor gating, the
//! deletion guard and capacity restoration against the in-memory store.
//!
//! Run with: `cargo test --test booking_flow_test`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use chrono::Duration;
use std::sync::Arc;
use swellbook_core::prelude::*;
use swellbook_testing::mocks::{InMemoryReservationStore, RecordingNotifier};
use swellbook_testing::{fixture_time, test_clock};

struct Fixture {
    reservations: Reservations<InMemoryReservationStore>,
    store: InMemoryReservationStore,
    notifier: Arc<RecordingNotifier>,
    instructor: UserId,
    location: LocationId,
}

impl Fixture {
    async fn new() -> Self {
        let store = InMemoryReservationStore::new();
        let notifier = Arc::new(RecordingNotifier::new());
        let instructor = UserId::new();
        store
            .set_instructor_rate(instructor, Money::from_cents(6000))
            .await
            .expect("rate write");
        Self {
            reservations: Reservations::new(
                store.clone(),
                test_clock(),
                Arc::clone(&notifier) as Arc<dyn Notifier>,
            ),
            store,
            notifier,
            instructor,
            location: LocationId::new(),
        }
    }

    async fn slot(&self, max_students: u32) -> Slot {
        self.reservations
            .create_slot(NewSlot {
                instructor_id: self.instructor,
                location_id: self.location,
                starts_at: fixture_time() + Duration::days(1),
                duration_minutes: 90,
                max_students,
            })
            .await
            .expect("slot creation")
    }

    async fn reread_slot(&self, id: SlotId) -> Slot {
        self.store.slot(id).await.expect("slot read").expect("slot exists")
    }
}

/// Scenario: reserve → pending; instructor confirms; instructor completes;
/// a late cancellation on the completed booking is rejected.
#[tokio::test]
async fn full_lifecycle_then_late_cancel_is_rejected() {
    let fx = Fixture::new().await;
    let slot = fx.slot(2).await;
    let student = UserId::new();

    let booking = fx.reservations.reserve(student, fx.instructor, slot.id).await.expect("reserve");
    assert_eq!(booking.status, BookingStatus::Pending);

    let booking = fx
        .reservations
        .transition(booking.id, fx.instructor, BookingStatus::Confirmed, None)
        .await
        .expect("confirm");
    assert_eq!(booking.status, BookingStatus::Confirmed);

    let booking = fx
        .reservations
        .transition(booking.id, fx.instructor, BookingStatus::Completed, None)
        .await
        .expect("complete");
    assert_eq!(booking.status, BookingStatus::Completed);

    let err = fx
        .reservations
        .transition(booking.id, student, BookingStatus::Cancelled, Some("too late".into()))
        .await
        .expect_err("completed is terminal");
    assert!(matches!(err, BookingError::InvalidTransition { .. }));
}

/// Scenario: slot with capacity 2 fully booked, one cancellation restores
/// exactly one unit and reopens the slot.
#[tokio::test]
async fn cancellation_restores_capacity() {
    let fx = Fixture::new().await;
    let slot = fx.slot(2).await;
    let (alice, bob) = (UserId::new(), UserId::new());

    let first = fx.reservations.reserve(alice, fx.instructor, slot.id).await.expect("first");
    fx.reservations.reserve(bob, fx.instructor, slot.id).await.expect("second");

    let full = fx.reread_slot(slot.id).await;
    assert_eq!(full.current_bookings, 2);
    assert!(!full.is_available);

    fx.reservations
        .transition(first.id, alice, BookingStatus::Cancelled, Some("surf's flat".into()))
        .await
        .expect("cancel");

    let reopened = fx.reread_slot(slot.id).await;
    assert_eq!(reopened.current_bookings, 1);
    assert!(reopened.is_available);
}

/// Cancelling twice is rejected the second time and must not double-decrement
/// the occupancy counter.
#[tokio::test]
async fn double_cancel_does_not_double_decrement() {
    let fx = Fixture::new().await;
    let slot = fx.slot(2).await;
    let student = UserId::new();

    let booking = fx.reservations.reserve(student, fx.instructor, slot.id).await.expect("reserve");
    fx.reservations
        .transition(booking.id, student, BookingStatus::Cancelled, Some("injured".into()))
        .await
        .expect("first cancel");

    let err = fx
        .reservations
        .transition(booking.id, student, BookingStatus::Cancelled, Some("again".into()))
        .await
        .expect_err("already cancelled");
    assert!(matches!(
        err,
        BookingError::InvalidTransition { from: BookingStatus::Cancelled, to: BookingStatus::Cancelled }
    ));

    assert_eq!(fx.reread_slot(slot.id).await.current_bookings, 0);
}

/// A student may never confirm their own booking, regardless of state.
#[tokio::test]
async fn student_cannot_confirm() {
    let fx = Fixture::new().await;
    let slot = fx.slot(1).await;
    let student = UserId::new();

    let booking = fx.reservations.reserve(student, fx.instructor, slot.id).await.expect("reserve");
    let err = fx
        .reservations
        .transition(booking.id, student, BookingStatus::Confirmed, None)
        .await
        .expect_err("students cannot confirm");
    assert!(matches!(err, BookingError::Forbidden(id) if id == student));
}

/// Users who are not a party to the booking are rejected outright.
#[tokio::test]
async fn outsider_cannot_transition() {
    let fx = Fixture::new().await;
    let slot = fx.slot(1).await;
    let student = UserId::new();
    let stranger = UserId::new();

    let booking = fx.reservations.reserve(student, fx.instructor, slot.id).await.expect("reserve");
    let err = fx
        .reservations
        .transition(booking.id, stranger, BookingStatus::Cancelled, Some("why not".into()))
        .await
        .expect_err("stranger");
    assert!(matches!(err, BookingError::Forbidden(id) if id == stranger));
}

/// Cancellation without a reason is malformed input.
#[tokio::test]
async fn cancellation_requires_a_reason() {
    let fx = Fixture::new().await;
    let slot = fx.slot(1).await;
    let student = UserId::new();

    let booking = fx.reservations.reserve(student, fx.instructor, slot.id).await.expect("reserve");
    for reason in [None, Some(String::new()), Some("   ".to_owned())] {
        let err = fx
            .reservations
            .transition(booking.id, student, BookingStatus::Cancelled, reason)
            .await
            .expect_err("reason required");
        assert!(matches!(err, BookingError::Validation(_)));
    }

    // The booking is untouched by the rejected attempts.
    let unchanged = fx.store.booking(booking.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, BookingStatus::Pending);
}

/// A cancelled booking records who cancelled, when, and why.
#[tokio::test]
async fn cancellation_metadata_is_recorded() {
    let fx = Fixture::new().await;
    let slot = fx.slot(1).await;
    let student = UserId::new();

    let booking = fx.reservations.reserve(student, fx.instructor, slot.id).await.expect("reserve");
    let cancelled = fx
        .reservations
        .transition(booking.id, fx.instructor, BookingStatus::Cancelled, Some("storm warning".into()))
        .await
        .expect("cancel");

    let meta = cancelled.cancellation.expect("cancellation metadata");
    assert_eq!(meta.reason, "storm warning");
    assert_eq!(meta.cancelled_by, fx.instructor);
    assert_eq!(meta.cancelled_at, fixture_time());
}

/// Deletion guard: full slots and partially booked slots conflict; untouched
/// slots delete permanently; only the owner may delete.
#[tokio::test]
async fn deletion_guard() {
    let fx = Fixture::new().await;

    // Fresh slot deletes cleanly and is no longer retrievable.
    let fresh = fx.slot(1).await;
    fx.reservations.delete_slot(fresh.id, fx.instructor).await.expect("delete fresh");
    assert!(fx.store.slot(fresh.id).await.unwrap().is_none());

    // Partially booked slot (still available) conflicts.
    let partial = fx.slot(2).await;
    fx.reservations.reserve(UserId::new(), fx.instructor, partial.id).await.expect("reserve");
    let err = fx.reservations.delete_slot(partial.id, fx.instructor).await.expect_err("partial");
    assert!(matches!(err, BookingError::Conflict(id) if id == partial.id));

    // Full slot conflicts.
    let full = fx.slot(1).await;
    fx.reservations.reserve(UserId::new(), fx.instructor, full.id).await.expect("reserve");
    let err = fx.reservations.delete_slot(full.id, fx.instructor).await.expect_err("full");
    assert!(matches!(err, BookingError::Conflict(id) if id == full.id));

    // Non-owner is rejected before the guard is even consulted.
    let other = fx.slot(1).await;
    let stranger = UserId::new();
    let err = fx.reservations.delete_slot(other.id, stranger).await.expect_err("stranger");
    assert!(matches!(err, BookingError::Forbidden(id) if id == stranger));
}

/// Reserve failure paths: unknown slot, mismatched instructor, missing rate.
#[tokio::test]
async fn reserve_rejects_bad_input() {
    let fx = Fixture::new().await;
    let slot = fx.slot(1).await;
    let student = UserId::new();

    let missing = SlotId::new();
    let err = fx.reservations.reserve(student, fx.instructor, missing).await.expect_err("missing");
    assert!(matches!(err, BookingError::SlotNotFound(id) if id == missing));

    let wrong_instructor = UserId::new();
    let err = fx
        .reservations
        .reserve(student, wrong_instructor, slot.id)
        .await
        .expect_err("wrong instructor");
    assert!(matches!(err, BookingError::Validation(_)));

    // An instructor without a rate on file cannot be booked.
    let unpriced = UserId::new();
    let orphan_slot = fx
        .reservations
        .create_slot(NewSlot {
            instructor_id: unpriced,
            location_id: fx.location,
            starts_at: fixture_time() + Duration::days(2),
            duration_minutes: 60,
            max_students: 1,
        })
        .await
        .expect("slot");
    let err = fx.reservations.reserve(student, unpriced, orphan_slot.id).await.expect_err("no rate");
    assert!(matches!(err, BookingError::Validation(_)));

    // None of the failures claimed capacity.
    assert_eq!(fx.reread_slot(slot.id).await.current_bookings, 0);
}

/// Price is the hourly rate scaled by the slot duration, and the booking
/// carries a denormalized copy of the slot schedule.
#[tokio::test]
async fn booking_is_priced_and_denormalized() {
    let fx = Fixture::new().await;
    let slot = fx.slot(3).await;
    let student = UserId::new();

    let booking = fx.reservations.reserve(student, fx.instructor, slot.id).await.expect("reserve");

    // $60/h for 90 minutes.
    assert_eq!(booking.price, Money::from_cents(9000));
    assert_eq!(booking.location_id, slot.location_id);
    assert_eq!(booking.starts_at, slot.starts_at);
    assert_eq!(booking.duration_minutes, slot.duration_minutes);
    assert_eq!(booking.created_at, fixture_time());
}

/// Reserve notifies the instructor; transitions notify the counterpart.
#[tokio::test]
async fn notifications_reach_the_counterpart() {
    let fx = Fixture::new().await;
    let slot = fx.slot(2).await;
    let student = UserId::new();

    let booking = fx.reservations.reserve(student, fx.instructor, slot.id).await.expect("reserve");
    fx.reservations
        .transition(booking.id, fx.instructor, BookingStatus::Confirmed, None)
        .await
        .expect("confirm");
    fx.reservations
        .transition(booking.id, student, BookingStatus::Cancelled, Some("rip current".into()))
        .await
        .expect("cancel");

    let sent = fx.notifier.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0].recipient, fx.instructor);
    assert_eq!(sent[0].kind, NotificationKind::BookingRequested);
    assert_eq!(sent[1].recipient, student);
    assert_eq!(sent[1].kind, NotificationKind::BookingConfirmed);
    assert_eq!(sent[2].recipient, fx.instructor);
    assert_eq!(sent[2].kind, NotificationKind::BookingCancelled);
    assert!(sent.iter().all(|s| s.booking_id == booking.id));
}

/// Notification delivery failures never affect the operation's result.
#[tokio::test]
async fn failed_notifications_do_not_fail_the_booking() {
    let fx = Fixture::new().await;
    let slot = fx.slot(1).await;
    fx.notifier.fail_deliveries();

    let booking = fx
        .reservations
        .reserve(UserId::new(), fx.instructor, slot.id)
        .await
        .expect("reserve must survive notifier outage");
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(fx.reread_slot(slot.id).await.current_bookings, 1);
    assert!(fx.notifier.sent().is_empty());
}

/// Read-side queries filter by status and by upcoming/past against an
/// explicit reference instant.
#[tokio::test]
async fn read_side_queries() {
    let fx = Fixture::new().await;
    let student = UserId::new();

    // One lesson tomorrow, one last week.
    let upcoming_slot = fx.slot(1).await;
    let past_slot = fx
        .reservations
        .create_slot(NewSlot {
            instructor_id: fx.instructor,
            location_id: fx.location,
            starts_at: fixture_time() - Duration::days(7),
            duration_minutes: 90,
            max_students: 1,
        })
        .await
        .expect("past slot");

    let upcoming = fx.reservations.reserve(student, fx.instructor, upcoming_slot.id).await.expect("r1");
    let past = fx.reservations.reserve(student, fx.instructor, past_slot.id).await.expect("r2");
    fx.reservations
        .transition(past.id, fx.instructor, BookingStatus::Confirmed, None)
        .await
        .expect("confirm past");

    let now = fixture_time();
    let upcoming_list = fx
        .store
        .bookings_for_student(student, &BookingQuery::any().upcoming(now))
        .await
        .expect("query");
    assert_eq!(upcoming_list.len(), 1);
    assert_eq!(upcoming_list[0].id, upcoming.id);

    let past_list = fx
        .store
        .bookings_for_student(student, &BookingQuery::any().past(now))
        .await
        .expect("query");
    assert_eq!(past_list.len(), 1);
    assert_eq!(past_list[0].id, past.id);

    let confirmed = fx
        .store
        .bookings_for_instructor(fx.instructor, &BookingQuery::any().with_status(BookingStatus::Confirmed))
        .await
        .expect("query");
    assert_eq!(confirmed.len(), 1);
    assert_eq!(confirmed[0].id, past.id);

    let slots = fx
        .store
        .slots_for_instructor(fx.instructor, now)
        .await
        .expect("query");
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].id, upcoming_slot.id);
}

/// Bulk seeding creates back-to-back slots, all-or-nothing.
#[tokio::test]
async fn seed_slots_creates_a_consecutive_run() {
    let fx = Fixture::new().await;
    let params = NewSlot {
        instructor_id: fx.instructor,
        location_id: fx.location,
        starts_at: fixture_time() + Duration::days(1),
        duration_minutes: 60,
        max_students: 2,
    };

    let slots = fx.reservations.seed_slots(params, 4).await.expect("seed");
    assert_eq!(slots.len(), 4);
    for pair in slots.windows(2) {
        assert_eq!(pair[1].starts_at, pair[0].ends_at());
    }

    let err = fx.reservations.seed_slots(params, 0).await.expect_err("zero count");
    assert!(matches!(err, BookingError::Validation(_)));
}
