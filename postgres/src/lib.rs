//! `PostgreSQL` reservation store for the Swellbook booking core.
//!
//! This crate provides the production implementation of
//! [`swellbook_core::store::ReservationStore`]. It uses sqlx with runtime-checked
//! queries and supports:
//!
//! - Explicit transactions with `SELECT … FOR UPDATE` row locks, which is the
//!   load-bearing mechanism behind the no-overselling guarantee
//! - Connection pooling configured from the environment
//! - Schema bootstrap for fresh databases
//!
//! Slots and bookings live in separate tables with **no** foreign key from
//! `bookings.slot_id` to `slots`: bookings carry denormalized copies of the
//! slot schedule, and a slot may be deleted once nothing active references it
//! without corrupting booking history.
//!
//! # Example
//!
//! ```ignore
//! use swellbook_postgres::{PgReservationStore, PostgresConfig};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PgReservationStore::connect(&PostgresConfig::from_env()).await?;
//!     store.ensure_schema().await?;
//!     Ok(())
//! }
//! ```

mod config;

pub use config::PostgresConfig;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;
use swellbook_core::booking::{Booking, BookingStatus, Cancellation};
use swellbook_core::error::StoreError;
use swellbook_core::slot::Slot;
use swellbook_core::store::{BookingQuery, ReservationStore, StoreTx, Timeframe};
use swellbook_core::types::{BookingId, LocationId, Money, SlotId, UserId};
use uuid::Uuid;

const SLOT_COLS: &str = "id, instructor_id, location_id, starts_at, duration_minutes, \
                         max_students, current_bookings, is_available";
const BOOKING_COLS: &str = "id, student_id, instructor_id, slot_id, location_id, starts_at, \
                            duration_minutes, price_cents, status, cancellation_reason, \
                            cancelled_by, cancelled_at, created_at";

fn db_err(err: sqlx::Error) -> StoreError {
    StoreError::Database(err.to_string())
}

fn count_from_db(value: i64, what: &str) -> Result<u32, StoreError> {
    u32::try_from(value)
        .map_err(|_| StoreError::CorruptRecord(format!("{what} out of range: {value}")))
}

fn cents_to_db(amount: Money) -> Result<i64, StoreError> {
    i64::try_from(amount.as_cents())
        .map_err(|_| StoreError::CorruptRecord(format!("price exceeds storage range: {amount}")))
}

fn cents_from_db(value: i64) -> Result<Money, StoreError> {
    u64::try_from(value)
        .map(Money::from_cents)
        .map_err(|_| StoreError::CorruptRecord(format!("negative stored price: {value}")))
}

#[derive(sqlx::FromRow)]
struct SlotRow {
    id: Uuid,
    instructor_id: Uuid,
    location_id: Uuid,
    starts_at: DateTime<Utc>,
    duration_minutes: i64,
    max_students: i64,
    current_bookings: i64,
    is_available: bool,
}

impl TryFrom<SlotRow> for Slot {
    type Error = StoreError;

    fn try_from(row: SlotRow) -> Result<Self, StoreError> {
        Ok(Self {
            id: SlotId::from_uuid(row.id),
            instructor_id: UserId::from_uuid(row.instructor_id),
            location_id: LocationId::from_uuid(row.location_id),
            starts_at: row.starts_at,
            duration_minutes: count_from_db(row.duration_minutes, "slot duration")?,
            max_students: count_from_db(row.max_students, "slot capacity")?,
            current_bookings: count_from_db(row.current_bookings, "slot occupancy")?,
            is_available: row.is_available,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    student_id: Uuid,
    instructor_id: Uuid,
    slot_id: Uuid,
    location_id: Uuid,
    starts_at: DateTime<Utc>,
    duration_minutes: i64,
    price_cents: i64,
    status: String,
    cancellation_reason: Option<String>,
    cancelled_by: Option<Uuid>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, StoreError> {
        let status = BookingStatus::parse(&row.status).ok_or_else(|| {
            StoreError::CorruptRecord(format!("unknown booking status: {}", row.status))
        })?;
        let cancellation = match (row.cancellation_reason, row.cancelled_by, row.cancelled_at) {
            (Some(reason), Some(by), Some(at)) => Some(Cancellation {
                reason,
                cancelled_by: UserId::from_uuid(by),
                cancelled_at: at,
            }),
            (None, None, None) => None,
            _ => {
                return Err(StoreError::CorruptRecord(format!(
                    "partial cancellation metadata on booking {}",
                    row.id
                )));
            }
        };
        Ok(Self {
            id: BookingId::from_uuid(row.id),
            student_id: UserId::from_uuid(row.student_id),
            instructor_id: UserId::from_uuid(row.instructor_id),
            slot_id: SlotId::from_uuid(row.slot_id),
            location_id: LocationId::from_uuid(row.location_id),
            starts_at: row.starts_at,
            duration_minutes: count_from_db(row.duration_minutes, "booking duration")?,
            price: cents_from_db(row.price_cents)?,
            status,
            cancellation,
            created_at: row.created_at,
        })
    }
}

/// `PostgreSQL`-backed reservation store.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct PgReservationStore {
    pool: PgPool,
}

impl PgReservationStore {
    /// Connect a pool according to `config`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] when the pool cannot be established.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout))
            .idle_timeout(Duration::from_secs(config.idle_timeout))
            .connect(&config.url)
            .await
            .map_err(db_err)?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the reservation tables if they do not exist.
    ///
    /// The `CHECK` constraints are a backstop; the invariants are enforced by
    /// the workflows, which are the only writers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] when a statement fails.
    #[tracing::instrument(skip(self))]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS slots (
                id UUID PRIMARY KEY,
                instructor_id UUID NOT NULL,
                location_id UUID NOT NULL,
                starts_at TIMESTAMPTZ NOT NULL,
                duration_minutes BIGINT NOT NULL CHECK (duration_minutes > 0),
                max_students BIGINT NOT NULL CHECK (max_students > 0),
                current_bookings BIGINT NOT NULL DEFAULT 0
                    CHECK (current_bookings >= 0 AND current_bookings <= max_students),
                is_available BOOLEAN NOT NULL DEFAULT TRUE
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_slots_instructor_start
             ON slots (instructor_id, starts_at)",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS bookings (
                id UUID PRIMARY KEY,
                student_id UUID NOT NULL,
                instructor_id UUID NOT NULL,
                slot_id UUID NOT NULL,
                location_id UUID NOT NULL,
                starts_at TIMESTAMPTZ NOT NULL,
                duration_minutes BIGINT NOT NULL,
                price_cents BIGINT NOT NULL,
                status TEXT NOT NULL,
                cancellation_reason TEXT,
                cancelled_by UUID,
                cancelled_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_bookings_student
             ON bookings (student_id, starts_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_bookings_instructor
             ON bookings (instructor_id, starts_at DESC)",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS instructor_rates (
                instructor_id UUID PRIMARY KEY,
                hourly_rate_cents BIGINT NOT NULL CHECK (hourly_rate_cents >= 0)
            )
            ",
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        tracing::debug!("reservation schema ensured");
        Ok(())
    }

    async fn bookings_where(
        &self,
        party_column: &'static str,
        user_id: UserId,
        query: &BookingQuery,
    ) -> Result<Vec<Booking>, StoreError> {
        let mut sql = format!("SELECT {BOOKING_COLS} FROM bookings WHERE {party_column} = $1");
        let mut next_param = 1;
        if query.status.is_some() {
            next_param += 1;
            sql.push_str(&format!(" AND status = ${next_param}"));
        }
        let reference = match query.timeframe {
            Timeframe::Any => None,
            Timeframe::Upcoming(now) => {
                next_param += 1;
                sql.push_str(&format!(
                    " AND starts_at + make_interval(mins => duration_minutes::int) > ${next_param}"
                ));
                Some(now)
            }
            Timeframe::Past(now) => {
                next_param += 1;
                sql.push_str(&format!(
                    " AND starts_at + make_interval(mins => duration_minutes::int) <= ${next_param}"
                ));
                Some(now)
            }
        };
        sql.push_str(" ORDER BY starts_at DESC");

        let mut rows = sqlx::query_as::<_, BookingRow>(&sql).bind(*user_id.as_uuid());
        if let Some(status) = query.status {
            rows = rows.bind(status.as_str());
        }
        if let Some(now) = reference {
            rows = rows.bind(now);
        }
        rows.fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(Booking::try_from)
            .collect()
    }
}

/// A `PostgreSQL` transaction over the reservation tables.
///
/// `*_for_update` reads take exclusive row locks, so two transactions
/// touching the same slot or booking serialize at the database.
pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

impl StoreTx for PgStoreTx {
    async fn slot_for_update(&mut self, id: SlotId) -> Result<Option<Slot>, StoreError> {
        let sql = format!("SELECT {SLOT_COLS} FROM slots WHERE id = $1 FOR UPDATE");
        let row: Option<SlotRow> = sqlx::query_as(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;
        row.map(Slot::try_from).transpose()
    }

    async fn booking_for_update(&mut self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        let sql = format!("SELECT {BOOKING_COLS} FROM bookings WHERE id = $1 FOR UPDATE");
        let row: Option<BookingRow> = sqlx::query_as(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_err)?;
        row.map(Booking::try_from).transpose()
    }

    async fn instructor_rate(&mut self, instructor_id: UserId) -> Result<Option<Money>, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT hourly_rate_cents FROM instructor_rates WHERE instructor_id = $1",
        )
        .bind(*instructor_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db_err)?;
        row.map(|(cents,)| cents_from_db(cents)).transpose()
    }

    async fn insert_slot(&mut self, slot: &Slot) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO slots (id, instructor_id, location_id, starts_at, duration_minutes,
                               max_students, current_bookings, is_available)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ",
        )
        .bind(*slot.id.as_uuid())
        .bind(*slot.instructor_id.as_uuid())
        .bind(*slot.location_id.as_uuid())
        .bind(slot.starts_at)
        .bind(i64::from(slot.duration_minutes))
        .bind(i64::from(slot.max_students))
        .bind(i64::from(slot.current_bookings))
        .bind(slot.is_available)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), StoreError> {
        let (reason, by, at) = cancellation_columns(booking);
        sqlx::query(
            r"
            INSERT INTO bookings (id, student_id, instructor_id, slot_id, location_id, starts_at,
                                  duration_minutes, price_cents, status, cancellation_reason,
                                  cancelled_by, cancelled_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ",
        )
        .bind(*booking.id.as_uuid())
        .bind(*booking.student_id.as_uuid())
        .bind(*booking.instructor_id.as_uuid())
        .bind(*booking.slot_id.as_uuid())
        .bind(*booking.location_id.as_uuid())
        .bind(booking.starts_at)
        .bind(i64::from(booking.duration_minutes))
        .bind(cents_to_db(booking.price)?)
        .bind(booking.status.as_str())
        .bind(reason)
        .bind(by)
        .bind(at)
        .bind(booking.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_slot(&mut self, slot: &Slot) -> Result<(), StoreError> {
        sqlx::query(
            r"
            UPDATE slots
            SET starts_at = $2, duration_minutes = $3, max_students = $4,
                current_bookings = $5, is_available = $6
            WHERE id = $1
            ",
        )
        .bind(*slot.id.as_uuid())
        .bind(slot.starts_at)
        .bind(i64::from(slot.duration_minutes))
        .bind(i64::from(slot.max_students))
        .bind(i64::from(slot.current_bookings))
        .bind(slot.is_available)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn update_booking(&mut self, booking: &Booking) -> Result<(), StoreError> {
        let (reason, by, at) = cancellation_columns(booking);
        sqlx::query(
            r"
            UPDATE bookings
            SET status = $2, cancellation_reason = $3, cancelled_by = $4, cancelled_at = $5
            WHERE id = $1
            ",
        )
        .bind(*booking.id.as_uuid())
        .bind(booking.status.as_str())
        .bind(reason)
        .bind(by)
        .bind(at)
        .execute(&mut *self.tx)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn delete_slot(&mut self, id: SlotId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM slots WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&mut *self.tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(db_err)
    }
}

fn cancellation_columns(
    booking: &Booking,
) -> (Option<&str>, Option<Uuid>, Option<DateTime<Utc>>) {
    match &booking.cancellation {
        Some(c) => (Some(c.reason.as_str()), Some(*c.cancelled_by.as_uuid()), Some(c.cancelled_at)),
        None => (None, None, None),
    }
}

impl ReservationStore for PgReservationStore {
    type Tx = PgStoreTx;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let tx = self.pool.begin().await.map_err(db_err)?;
        Ok(PgStoreTx { tx })
    }

    async fn slot(&self, id: SlotId) -> Result<Option<Slot>, StoreError> {
        let sql = format!("SELECT {SLOT_COLS} FROM slots WHERE id = $1");
        let row: Option<SlotRow> = sqlx::query_as(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(Slot::try_from).transpose()
    }

    async fn booking(&self, id: BookingId) -> Result<Option<Booking>, StoreError> {
        let sql = format!("SELECT {BOOKING_COLS} FROM bookings WHERE id = $1");
        let row: Option<BookingRow> = sqlx::query_as(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(Booking::try_from).transpose()
    }

    async fn slots_for_instructor(
        &self,
        instructor_id: UserId,
        from: DateTime<Utc>,
    ) -> Result<Vec<Slot>, StoreError> {
        let sql = format!(
            "SELECT {SLOT_COLS} FROM slots
             WHERE instructor_id = $1 AND starts_at >= $2
             ORDER BY starts_at"
        );
        sqlx::query_as::<_, SlotRow>(&sql)
            .bind(*instructor_id.as_uuid())
            .bind(from)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(Slot::try_from)
            .collect()
    }

    async fn bookings_for_student(
        &self,
        student_id: UserId,
        query: &BookingQuery,
    ) -> Result<Vec<Booking>, StoreError> {
        self.bookings_where("student_id", student_id, query).await
    }

    async fn bookings_for_instructor(
        &self,
        instructor_id: UserId,
        query: &BookingQuery,
    ) -> Result<Vec<Booking>, StoreError> {
        self.bookings_where("instructor_id", instructor_id, query).await
    }

    async fn set_instructor_rate(
        &self,
        instructor_id: UserId,
        hourly_rate: Money,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO instructor_rates (instructor_id, hourly_rate_cents)
            VALUES ($1, $2)
            ON CONFLICT (instructor_id) DO UPDATE SET hourly_rate_cents = EXCLUDED.hourly_rate_cents
            ",
        )
        .bind(*instructor_id.as_uuid())
        .bind(cents_to_db(hourly_rate)?)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }
}
