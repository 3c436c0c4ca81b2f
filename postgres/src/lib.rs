//! PostgreSQL record store for Nestly.
//!
//! The durable source of truth for users, listings, bookings, and the
//! derived occupancy table. This is the one place with transactional
//! discipline: `create_booking` takes a per-listing advisory lock and
//! re-runs the overlap check inside the same transaction as the insert,
//! so two concurrent overlapping reservations can never both commit.
//!
//! Queries use sqlx's runtime API (`query`/`query_as`), so the crate
//! builds without a live database.

use chrono::{DateTime, Utc};
use nestly_core::availability::DateRange;
use nestly_core::error::{Error, Result};
use nestly_core::model::{
    Booking, BookingId, BookingStatus, Listing, ListingId, NewBooking, NewListing, NewUser,
    OccupiedRange, Role, User, UserId,
};
use nestly_core::store::RecordStore;
use sqlx::postgres::{PgPool, PgPoolOptions};

const BOOKING_COLUMNS: &str =
    "id, listing_id, guest_id, start_date, end_date, status, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    password_hash: String,
    name: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(Self {
            id: UserId(row.id),
            email: row.email,
            password_hash: row.password_hash,
            name: row.name,
            role: Role::parse(&row.role)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ListingRow {
    id: i64,
    host_id: i64,
    title: String,
    description: String,
    location: String,
    nightly_price: f64,
    available: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ListingRow> for Listing {
    fn from(row: ListingRow) -> Self {
        Self {
            id: ListingId(row.id),
            host_id: UserId(row.host_id),
            title: row.title,
            description: row.description,
            location: row.location,
            nightly_price: row.nightly_price,
            available: row.available,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: i64,
    listing_id: i64,
    guest_id: i64,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = Error;

    fn try_from(row: BookingRow) -> Result<Self> {
        Ok(Self {
            id: BookingId(row.id),
            listing_id: ListingId(row.listing_id),
            guest_id: UserId(row.guest_id),
            start_date: row.start_date,
            end_date: row.end_date,
            status: BookingStatus::parse(&row.status)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn storage(context: &str, e: &sqlx::Error) -> Error {
    Error::Storage(format!("{context}: {e}"))
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn violated_constraint(e: &sqlx::Error) -> Option<&str> {
    match e {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => db.constraint(),
        _ => None,
    }
}

/// PostgreSQL-backed [`RecordStore`].
#[derive(Clone)]
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the database.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the pool cannot be established.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| storage("failed to connect", &e))?;
        Ok(Self::new(pool))
    }

    /// Run schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Storage(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// The underlying pool, for custom queries in tests and tooling.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl RecordStore for PgRecordStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let row: UserRow = sqlx::query_as(
            "INSERT INTO users (email, password_hash, name, role)
             VALUES ($1, $2, $3, $4)
             RETURNING id, email, password_hash, name, role, created_at, updated_at",
        )
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.name)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::Conflict
            } else {
                storage("failed to create user", &e)
            }
        })?;

        row.try_into()
    }

    async fn user(&self, id: UserId) -> Result<User> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, password_hash, name, role, created_at, updated_at
             FROM users
             WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage("failed to get user", &e))?;

        row.ok_or(Error::not_found("user", id.0))?.try_into()
    }

    async fn create_listing(&self, listing: NewListing) -> Result<Listing> {
        let row: ListingRow = sqlx::query_as(
            "INSERT INTO listings (host_id, title, description, location, nightly_price, available)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, host_id, title, description, location, nightly_price, available,
                       created_at, updated_at",
        )
        .bind(listing.host_id.0)
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(&listing.location)
        .bind(listing.nightly_price)
        .bind(listing.available)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if violated_constraint(&e).is_some() {
                Error::not_found("user", listing.host_id.0)
            } else {
                storage("failed to create listing", &e)
            }
        })?;

        Ok(row.into())
    }

    async fn listing(&self, id: ListingId) -> Result<Listing> {
        let row: Option<ListingRow> = sqlx::query_as(
            "SELECT id, host_id, title, description, location, nightly_price, available,
                    created_at, updated_at
             FROM listings
             WHERE id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage("failed to get listing", &e))?;

        Ok(row.ok_or(Error::not_found("listing", id.0))?.into())
    }

    async fn update_listing(&self, listing: &Listing) -> Result<Listing> {
        let row: Option<ListingRow> = sqlx::query_as(
            "UPDATE listings
             SET title = $2,
                 description = $3,
                 location = $4,
                 nightly_price = $5,
                 available = $6,
                 updated_at = now()
             WHERE id = $1
             RETURNING id, host_id, title, description, location, nightly_price, available,
                       created_at, updated_at",
        )
        .bind(listing.id.0)
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(&listing.location)
        .bind(listing.nightly_price)
        .bind(listing.available)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage("failed to update listing", &e))?;

        Ok(row.ok_or(Error::not_found("listing", listing.id.0))?.into())
    }

    async fn delete_listing(&self, id: ListingId) -> Result<()> {
        let result = sqlx::query("DELETE FROM listings WHERE id = $1")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| storage("failed to delete listing", &e))?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found("listing", id.0));
        }
        Ok(())
    }

    async fn create_booking(&self, booking: NewBooking) -> Result<Booking> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage("failed to start transaction", &e))?;

        // Serialize creates per listing: the lock is held until commit, so
        // a concurrent insert for the same listing waits here and then
        // observes this booking in its overlap check.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(booking.listing_id.0)
            .execute(&mut *tx)
            .await
            .map_err(|e| storage("failed to lock listing", &e))?;

        let (overlaps,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(
                 SELECT 1 FROM bookings
                 WHERE listing_id = $1
                   AND status IN ('pending', 'confirmed')
                   AND start_date < $3
                   AND $2 < end_date
             )",
        )
        .bind(booking.listing_id.0)
        .bind(booking.period.start())
        .bind(booking.period.end())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| storage("failed to check overlap", &e))?;

        if overlaps {
            return Err(Error::Conflict);
        }

        let row: BookingRow = sqlx::query_as(&format!(
            "INSERT INTO bookings (listing_id, guest_id, start_date, end_date, status)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking.listing_id.0)
        .bind(booking.guest_id.0)
        .bind(booking.period.start())
        .bind(booking.period.end())
        .bind(booking.status.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match violated_constraint(&e) {
            Some(name) if name.contains("guest") => Error::not_found("user", booking.guest_id.0),
            Some(_) => Error::not_found("listing", booking.listing_id.0),
            None => storage("failed to create booking", &e),
        })?;

        tx.commit()
            .await
            .map_err(|e| storage("failed to commit booking", &e))?;

        tracing::debug!(
            booking_id = row.id,
            listing_id = row.listing_id,
            "booking committed"
        );
        row.try_into()
    }

    async fn booking(&self, id: BookingId) -> Result<Booking> {
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage("failed to get booking", &e))?;

        row.ok_or(Error::not_found("booking", id.0))?.try_into()
    }

    async fn bookings_by_guest(&self, guest_id: UserId) -> Result<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE guest_id = $1 ORDER BY id"
        ))
        .bind(guest_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage("failed to list guest bookings", &e))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn bookings_by_host(&self, host_id: UserId) -> Result<Vec<Booking>> {
        let rows: Vec<BookingRow> = sqlx::query_as(
            "SELECT b.id, b.listing_id, b.guest_id, b.start_date, b.end_date, b.status,
                    b.created_at, b.updated_at
             FROM bookings b
             JOIN listings l ON l.id = b.listing_id
             WHERE l.host_id = $1
             ORDER BY b.id",
        )
        .bind(host_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| storage("failed to list host bookings", &e))?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn mark_booking_cancelled(&self, id: BookingId) -> Result<Booking> {
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            "UPDATE bookings
             SET status = 'cancelled', updated_at = now()
             WHERE id = $1 AND status <> 'cancelled'
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| storage("failed to cancel booking", &e))?;

        match row {
            Some(row) => row.try_into(),
            // Zero rows: either absent or already cancelled.
            None => {
                let exists: Option<(String,)> =
                    sqlx::query_as("SELECT status FROM bookings WHERE id = $1")
                        .bind(id.0)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(|e| storage("failed to get booking", &e))?;
                match exists {
                    Some(_) => Err(Error::AlreadyCancelled),
                    None => Err(Error::not_found("booking", id.0)),
                }
            }
        }
    }

    async fn has_overlap(&self, listing_id: ListingId, period: DateRange) -> Result<bool> {
        let (overlaps,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(
                 SELECT 1 FROM bookings
                 WHERE listing_id = $1
                   AND status IN ('pending', 'confirmed')
                   AND start_date < $3
                   AND $2 < end_date
             )",
        )
        .bind(listing_id.0)
        .bind(period.start())
        .bind(period.end())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage("failed to check overlap", &e))?;

        Ok(overlaps)
    }

    async fn insert_occupied_range(&self, range: &OccupiedRange) -> Result<()> {
        // Insert-ignore keyed by booking id: a redelivered booking.created
        // changes nothing.
        sqlx::query(
            "INSERT INTO occupied_date_ranges (booking_id, listing_id, start_date, end_date)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (booking_id) DO NOTHING",
        )
        .bind(range.booking_id.0)
        .bind(range.listing_id.0)
        .bind(range.start_date)
        .bind(range.end_date)
        .execute(&self.pool)
        .await
        .map_err(|e| storage("failed to insert occupied range", &e))?;

        Ok(())
    }

    async fn delete_occupied_range(&self, booking_id: BookingId) -> Result<()> {
        sqlx::query("DELETE FROM occupied_date_ranges WHERE booking_id = $1")
            .bind(booking_id.0)
            .execute(&self.pool)
            .await
            .map_err(|e| storage("failed to delete occupied range", &e))?;

        Ok(())
    }

    async fn range_occupied(&self, listing_id: ListingId, period: DateRange) -> Result<bool> {
        let (occupied,): (bool,) = sqlx::query_as(
            "SELECT EXISTS(
                 SELECT 1 FROM occupied_date_ranges
                 WHERE listing_id = $1
                   AND start_date < $3
                   AND $2 < end_date
             )",
        )
        .bind(listing_id.0)
        .bind(period.start())
        .bind(period.end())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| storage("failed to check occupancy", &e))?;

        Ok(occupied)
    }
}
