//! Record store abstraction.
//!
//! The record store is the durable source of truth for users, listings,
//! bookings, and the derived occupancy table. It is also the single point
//! where the no-double-booking invariant is enforced: `create_booking`
//! must run its overlap check and insert under per-listing serialization
//! (a transaction with a per-listing lock, or an equivalent), so that two
//! concurrent overlapping requests can never both succeed.
//!
//! Implementations: `PgRecordStore` in `nestly-postgres` for production,
//! an in-memory store in `nestly-testing` for tests.

use crate::availability::DateRange;
use crate::error::Result;
use crate::model::{
    Booking, BookingId, Listing, ListingId, NewBooking, NewListing, NewUser, OccupiedRange, User,
    UserId,
};
use std::future::Future;

/// Durable, relationally-structured storage for the marketplace entities.
pub trait RecordStore: Send + Sync {
    /// Create a user; the store assigns id and timestamps.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the email is already registered, or `Storage`
    /// on query failure.
    fn create_user(&self, user: NewUser) -> impl Future<Output = Result<User>> + Send;

    /// Look up a user by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if absent, or `Storage` on query failure.
    fn user(&self, id: UserId) -> impl Future<Output = Result<User>> + Send;

    /// Create a listing; the store assigns id and timestamps.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the host does not exist, or `Storage` on
    /// query failure.
    fn create_listing(&self, listing: NewListing) -> impl Future<Output = Result<Listing>> + Send;

    /// Look up a listing by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if absent, or `Storage` on query failure.
    fn listing(&self, id: ListingId) -> impl Future<Output = Result<Listing>> + Send;

    /// Replace a listing's mutable fields.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if absent, or `Storage` on query failure.
    fn update_listing(&self, listing: &Listing) -> impl Future<Output = Result<Listing>> + Send;

    /// Delete a listing; its bookings cascade.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if absent, or `Storage` on query failure.
    fn delete_listing(&self, id: ListingId) -> impl Future<Output = Result<()>> + Send;

    /// Insert a booking, enforcing the no-overlap invariant atomically.
    ///
    /// The overlap check against pending/confirmed bookings and the insert
    /// happen under per-listing serialization; a concurrent overlapping
    /// insert observes the winner and fails.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` if the period overlaps an existing
    /// pending/confirmed booking, or `Storage` on query failure.
    fn create_booking(&self, booking: NewBooking) -> impl Future<Output = Result<Booking>> + Send;

    /// Look up a booking by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if absent, or `Storage` on query failure.
    fn booking(&self, id: BookingId) -> impl Future<Output = Result<Booking>> + Send;

    /// All bookings made by a guest.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on query failure.
    fn bookings_by_guest(&self, guest_id: UserId)
    -> impl Future<Output = Result<Vec<Booking>>> + Send;

    /// All bookings across a host's listings.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on query failure.
    fn bookings_by_host(&self, host_id: UserId)
    -> impl Future<Output = Result<Vec<Booking>>> + Send;

    /// Transition a booking to cancelled and return the updated row.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if absent, `AlreadyCancelled` if the status was
    /// already cancelled, or `Storage` on query failure.
    fn mark_booking_cancelled(
        &self,
        id: BookingId,
    ) -> impl Future<Output = Result<Booking>> + Send;

    /// Whether any pending/confirmed booking of the listing overlaps
    /// `period` (half-open). The authoritative conflict query.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on query failure.
    fn has_overlap(
        &self,
        listing_id: ListingId,
        period: DateRange,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Insert an occupancy row, ignoring duplicates by booking id so
    /// redelivered `booking.created` events are no-ops.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on query failure.
    fn insert_occupied_range(
        &self,
        range: &OccupiedRange,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delete the occupancy row for a booking, if any. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on query failure.
    fn delete_occupied_range(&self, booking_id: BookingId)
    -> impl Future<Output = Result<()>> + Send;

    /// Whether any occupancy row of the listing overlaps `period`
    /// (half-open). The accelerated availability query.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on query failure.
    fn range_occupied(
        &self,
        listing_id: ListingId,
        period: DateRange,
    ) -> impl Future<Output = Result<bool>> + Send;
}
