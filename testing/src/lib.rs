//! # Swellbook Testing
//!
//! Testing utilities for the Swellbook booking core.
//!
//! This crate provides:
//! - An in-memory [`swellbook_core::store::ReservationStore`] with real
//!   transactional semantics (all-or-nothing, serialized), so workflow tests
//!   exercise the same commit/rollback paths as production
//! - [`mocks::FixedClock`]: deterministic time
//! - [`mocks::RecordingNotifier`]: captures emitted notifications and can be
//!   switched into a failing mode to verify fire-and-forget behavior
//!
//! ## Example
//!
//! ```ignore
//! use swellbook_testing::mocks::{FixedClock, InMemoryReservationStore, RecordingNotifier};
//! use swellbook_core::prelude::*;
//!
//! #[tokio::test]
//! async fn reserve_claims_capacity() {
//!     let store = InMemoryReservationStore::new();
//!     let reservations = Reservations::new(store, test_clock(), Arc::new(NoopNotifier));
//!     // ...
//! }
//! ```

/// Mock implementations of the core's injected dependencies.
pub mod mocks {
    use chrono::{DateTime, Utc};
    use std::collections::HashMap;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use swellbook_core::booking::Booking;
    use swellbook_core::clock::Clock;
    use swellbook_core::error::StoreError;
    use swellbook_core::notify::{NotificationKind, Notifier, NotifyError};
    use swellbook_core::slot::Slot;
    use swellbook_core::store::{BookingQuery, ReservationStore, StoreTx};
    use swellbook_core::types::{BookingId, Money, SlotId, UserId};
    use tokio::sync::OwnedMutexGuard;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// One captured notification call.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SentNotification {
        /// Who the notification was addressed to
        pub recipient: UserId,
        /// What it announced
        pub kind: NotificationKind,
        /// The booking it concerned
        pub booking_id: BookingId,
    }

    /// Notifier that records every call, with an optional failing mode.
    ///
    /// Failing mode exercises the fire-and-forget contract: workflows must
    /// succeed even when every delivery errors.
    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        sent: Mutex<Vec<SentNotification>>,
        fail: AtomicBool,
    }

    impl RecordingNotifier {
        /// Create a notifier that accepts every delivery.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every subsequent delivery fail.
        pub fn fail_deliveries(&self) {
            self.fail.store(true, Ordering::SeqCst);
        }

        /// Everything recorded so far, in call order.
        ///
        /// # Panics
        ///
        /// Panics if a previous test thread poisoned the internal lock.
        #[must_use]
        #[allow(clippy::unwrap_used)]
        pub fn sent(&self) -> Vec<SentNotification> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(
            &self,
            recipient: UserId,
            kind: NotificationKind,
            booking_id: BookingId,
        ) -> Pin<Box<dyn Future<Output = Result<(), NotifyError>> + Send + '_>> {
            Box::pin(async move {
                if self.fail.load(Ordering::SeqCst) {
                    return Err(NotifyError("delivery disabled by test".into()));
                }
                if let Ok(mut sent) = self.sent.lock() {
                    sent.push(SentNotification { recipient, kind, booking_id });
                }
                Ok(())
            })
        }
    }

    /// The records behind one in-memory store.
    #[derive(Debug, Clone, Default)]
    struct Dataset {
        slots: HashMap<SlotId, Slot>,
        bookings: HashMap<BookingId, Booking>,
        rates: HashMap<UserId, Money>,
    }

    /// In-memory reservation store with transactional semantics.
    ///
    /// A transaction takes the whole-dataset lock and clones a snapshot;
    /// writes mutate the live dataset in place and [`StoreTx::commit`] keeps
    /// them, while dropping the transaction uncommitted restores the
    /// snapshot. Holding the lock for the life of the transaction serializes
    /// concurrent transactions completely, which is exactly the consistency
    /// the workflows rely on (and is plenty fast for tests).
    ///
    /// Clones share the same dataset.
    #[derive(Debug, Clone, Default)]
    pub struct InMemoryReservationStore {
        inner: Arc<tokio::sync::Mutex<Dataset>>,
    }

    impl InMemoryReservationStore {
        /// Create an empty store.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }
    }

    /// Unit of work over an [`InMemoryReservationStore`].
    pub struct InMemoryTx {
        guard: OwnedMutexGuard<Dataset>,
        snapshot: Dataset,
        committed: bool,
    }

    impl Drop for InMemoryTx {
        fn drop(&mut self) {
            if !self.committed {
                *self.guard = std::mem::take(&mut self.snapshot);
            }
        }
    }

    impl StoreTx for InMemoryTx {
        async fn slot_for_update(&mut self, id: SlotId) -> Result<Option<Slot>, StoreError> {
            Ok(self.guard.slots.get(&id).cloned())
        }

        async fn booking_for_update(
            &mut self,
            id: BookingId,
        ) -> Result<Option<Booking>, StoreError> {
            Ok(self.guard.bookings.get(&id).cloned())
        }

        async fn instructor_rate(
            &mut self,
            instructor_id: UserId,
        ) -> Result<Option<Money>, StoreError> {
            Ok(self.guard.rates.get(&instructor_id).copied())
        }

        async fn insert_slot(&mut self, slot: &Slot) -> Result<(), StoreError> {
            self.guard.slots.insert(slot.id, slot.clone());
            Ok(())
        }

        async fn insert_booking(&mut self, booking: &Booking) -> Result<(), StoreError> {
            self.guard.bookings.insert(booking.id, booking.clone());
            Ok(())
        }

        async fn update_slot(&mut self, slot: &Slot) -> Result<(), StoreError> {
            self.guard.slots.insert(slot.id, slot.clone());
            Ok(())
        }

        async fn update_booking(&mut self, booking: &Booking) -> Result<(), StoreError> {
            self.guard.bookings.insert(booking.id, booking.clone());
            Ok(())
        }

        async fn delete_slot(&mut self, id: SlotId) -> Result<(), StoreError> {
            self.guard.slots.remove(&id);
            Ok(())
        }

        async fn commit(mut self) -> Result<(), StoreError> {
            self.committed = true;
            Ok(())
        }
    }

    impl ReservationStore for InMemoryReservationStore {
        type Tx = InMemoryTx;

        async fn begin(&self) -> Result<Self::Tx, StoreError> {
            let guard = Arc::clone(&self.inner).lock_owned().await;
            let snapshot = guard.clone();
            Ok(InMemoryTx { guard, snapshot, committed: false })
        }

        async fn slot(&self, id: SlotId) -> Result<Option<Slot>, StoreError> {
            Ok(self.inner.lock().await.slots.get(&id).cloned())
        }

        async fn booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
            Ok(self.inner.lock().await.bookings.get(&id).cloned())
        }

        async fn slots_for_instructor(
            &self,
            instructor_id: UserId,
            from: DateTime<Utc>,
        ) -> Result<Vec<Slot>, StoreError> {
            let mut slots: Vec<Slot> = self
                .inner
                .lock()
                .await
                .slots
                .values()
                .filter(|s| s.instructor_id == instructor_id && s.starts_at >= from)
                .cloned()
                .collect();
            slots.sort_by_key(|s| s.starts_at);
            Ok(slots)
        }

        async fn bookings_for_student(
            &self,
            student_id: UserId,
            query: &BookingQuery,
        ) -> Result<Vec<Booking>, StoreError> {
            let mut bookings: Vec<Booking> = self
                .inner
                .lock()
                .await
                .bookings
                .values()
                .filter(|b| b.student_id == student_id && query.matches(b))
                .cloned()
                .collect();
            bookings.sort_by_key(|b| std::cmp::Reverse(b.starts_at));
            Ok(bookings)
        }

        async fn bookings_for_instructor(
            &self,
            instructor_id: UserId,
            query: &BookingQuery,
        ) -> Result<Vec<Booking>, StoreError> {
            let mut bookings: Vec<Booking> = self
                .inner
                .lock()
                .await
                .bookings
                .values()
                .filter(|b| b.instructor_id == instructor_id && query.matches(b))
                .cloned()
                .collect();
            bookings.sort_by_key(|b| std::cmp::Reverse(b.starts_at));
            Ok(bookings)
        }

        async fn set_instructor_rate(
            &self,
            instructor_id: UserId,
            hourly_rate: Money,
        ) -> Result<(), StoreError> {
            self.inner.lock().await.rates.insert(instructor_id, hourly_rate);
            Ok(())
        }
    }
}

/// Test helpers shared by the integration suites.
pub mod helpers {
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Arc;
    use swellbook_core::clock::Clock;

    use super::mocks::FixedClock;

    /// A stable instant for deterministic fixtures: 2025-06-14 09:00 UTC.
    ///
    /// # Panics
    ///
    /// Never panics; the constant is a valid calendar time.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn fixture_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 14, 9, 0, 0).single().unwrap()
    }

    /// A fixed clock pinned to [`fixture_time`].
    #[must_use]
    pub fn test_clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock::new(fixture_time()))
    }

    /// Install a compact tracing subscriber for debugging a test run.
    ///
    /// Safe to call from several tests; only the first call wins.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt().with_test_writer().compact().try_init();
    }
}

// Re-exported so integration tests read naturally.
pub use helpers::{fixture_time, init_tracing, test_clock};
pub use mocks::{InMemoryReservationStore, RecordingNotifier, SentNotification};
