//! Domain entities for the rental marketplace.
//!
//! Identifiers are `i64` newtypes assigned by the record store. All types
//! are `Clone + Serialize` so they can be snapshotted into the cache and
//! carried inside lifecycle events.

use crate::availability::DateRange;
use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ═══════════════════════════════════════════════════════════════════════
// ID Types
// ═══════════════════════════════════════════════════════════════════════

/// Unique identifier for a user (host or guest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// Unique identifier for a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListingId(pub i64);

/// Unique identifier for a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BookingId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Users
// ═══════════════════════════════════════════════════════════════════════

/// User role on the marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Publishes listings.
    Host,
    /// Reserves listings.
    Guest,
}

impl Role {
    /// Stable string form used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Guest => "guest",
        }
    }

    /// Parse the storage string form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] for an unrecognized role string.
    pub fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "host" => Ok(Self::Host),
            "guest" => Ok(Self::Guest),
            other => Err(Error::Storage(format!("unknown role: {other}"))),
        }
    }
}

/// A registered user.
///
/// Identity (id, email) is immutable once created; profile fields may
/// change. The credential hash is opaque here — issuing and verifying
/// credentials happens outside this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// User ID.
    pub id: UserId,
    /// Email address (unique).
    pub email: String,
    /// Opaque credential hash. Never serialized into snapshots.
    #[serde(skip)]
    pub password_hash: String,
    /// Display name.
    pub name: String,
    /// Role on the marketplace.
    pub role: Role,
    /// Account creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last profile update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a user; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Email address (must be unique).
    pub email: String,
    /// Opaque credential hash.
    pub password_hash: String,
    /// Display name.
    pub name: String,
    /// Role on the marketplace.
    pub role: Role,
}

// ═══════════════════════════════════════════════════════════════════════
// Listings
// ═══════════════════════════════════════════════════════════════════════

/// A host's bookable inventory unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    /// Listing ID.
    pub id: ListingId,
    /// Owning host.
    pub host_id: UserId,
    /// Listing title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Location string.
    pub location: String,
    /// Price per night.
    pub nightly_price: f64,
    /// Whether the listing accepts bookings.
    pub available: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a listing; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewListing {
    /// Owning host.
    pub host_id: UserId,
    /// Listing title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Location string.
    pub location: String,
    /// Price per night.
    pub nightly_price: f64,
    /// Whether the listing accepts bookings.
    pub available: bool,
}

// ═══════════════════════════════════════════════════════════════════════
// Bookings
// ═══════════════════════════════════════════════════════════════════════

/// Lifecycle status of a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    /// Reserved, awaiting confirmation.
    Pending,
    /// Confirmed reservation.
    Confirmed,
    /// Cancelled; never blocks availability.
    Cancelled,
}

impl BookingStatus {
    /// Stable string form used in storage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the storage string form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] for an unrecognized status string.
    pub fn parse(s: &str) -> Result<Self, Error> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(Error::Storage(format!("unknown booking status: {other}"))),
        }
    }

    /// Whether this status occupies the calendar.
    ///
    /// Only pending and confirmed bookings participate in overlap checks.
    #[must_use]
    pub const fn blocks_availability(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

/// A guest's reservation of a listing for a half-open date interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking ID.
    pub id: BookingId,
    /// Reserved listing.
    pub listing_id: ListingId,
    /// Reserving guest.
    pub guest_id: UserId,
    /// Start of the reservation (inclusive).
    pub start_date: DateTime<Utc>,
    /// End of the reservation (exclusive).
    pub end_date: DateTime<Utc>,
    /// Current lifecycle status.
    pub status: BookingStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last status change timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// The booking's reservation interval.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the persisted dates are inverted,
    /// which the store schema forbids.
    pub fn period(&self) -> Result<DateRange, Error> {
        DateRange::new(self.start_date, self.end_date)
            .map_err(|e| Error::Storage(format!("booking {} has invalid dates: {e}", self.id)))
    }
}

/// Fields for creating a booking; the store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewBooking {
    /// Listing to reserve.
    pub listing_id: ListingId,
    /// Reserving guest.
    pub guest_id: UserId,
    /// Validated reservation interval.
    pub period: DateRange,
    /// Initial status (`Pending` unless verification already cleared).
    pub status: BookingStatus,
}

// ═══════════════════════════════════════════════════════════════════════
// Occupancy
// ═══════════════════════════════════════════════════════════════════════

/// Derived occupancy record, one row per effective booking.
///
/// Materialized by the occupancy consumer to accelerate availability
/// queries; keyed by booking id so duplicate event delivery is a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupiedRange {
    /// The booking this row is derived from (unique).
    pub booking_id: BookingId,
    /// The occupied listing.
    pub listing_id: ListingId,
    /// Start of the occupied interval (inclusive).
    pub start_date: DateTime<Utc>,
    /// End of the occupied interval (exclusive).
    pub end_date: DateTime<Utc>,
}

impl OccupiedRange {
    /// Derive the occupancy row for a booking.
    #[must_use]
    pub const fn for_booking(booking: &Booking) -> Self {
        Self {
            booking_id: booking.id,
            listing_id: booking.listing_id,
            start_date: booking.start_date,
            end_date: booking.end_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trips_storage_form() {
        for role in [Role::Host, Role::Guest] {
            assert_eq!(Role::parse(role.as_str()), Ok(role));
        }
        assert!(Role::parse("admin").is_err());
    }

    #[test]
    fn status_round_trips_storage_form() {
        for status in [
            BookingStatus::Pending,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
        ] {
            assert_eq!(BookingStatus::parse(status.as_str()), Ok(status));
        }
        assert!(BookingStatus::parse("canceled").is_err());
    }

    #[test]
    fn only_active_statuses_block_availability() {
        assert!(BookingStatus::Pending.blocks_availability());
        assert!(BookingStatus::Confirmed.blocks_availability());
        assert!(!BookingStatus::Cancelled.blocks_availability());
    }
}
