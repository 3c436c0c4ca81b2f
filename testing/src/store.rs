//! In-memory record store.

use chrono::Utc;
use nestly_core::availability::{DateRange, conflicts_with};
use nestly_core::error::{Error, Result};
use nestly_core::model::{
    Booking, BookingId, BookingStatus, Listing, ListingId, NewBooking, NewListing, NewUser,
    OccupiedRange, User, UserId,
};
use nestly_core::store::RecordStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct State {
    users: HashMap<UserId, User>,
    listings: HashMap<ListingId, Listing>,
    bookings: HashMap<BookingId, Booking>,
    occupied: HashMap<BookingId, OccupiedRange>,
    next_id: i64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory [`RecordStore`] backed by a single mutex.
///
/// Holding one lock across the overlap check and the insert gives
/// `create_booking` the same per-listing serialization the Postgres store
/// gets from its advisory lock, so the no-double-booking invariant holds
/// under concurrent use here too.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    inner: Arc<Mutex<State>>,
}

impl InMemoryRecordStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.inner
            .lock()
            .map_err(|_| Error::Storage("record store lock poisoned".to_string()))
    }

    /// Number of occupancy rows currently materialized, for assertions.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the lock is poisoned.
    pub fn occupied_row_count(&self) -> Result<usize> {
        Ok(self.lock()?.occupied.len())
    }
}

impl RecordStore for InMemoryRecordStore {
    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut state = self.lock()?;
        if state.users.values().any(|u| u.email == user.email) {
            return Err(Error::Conflict);
        }
        let now = Utc::now();
        let created = User {
            id: UserId(state.next_id()),
            email: user.email,
            password_hash: user.password_hash,
            name: user.name,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        state.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn user(&self, id: UserId) -> Result<User> {
        self.lock()?
            .users
            .get(&id)
            .cloned()
            .ok_or(Error::not_found("user", id.0))
    }

    async fn create_listing(&self, listing: NewListing) -> Result<Listing> {
        let mut state = self.lock()?;
        if !state.users.contains_key(&listing.host_id) {
            return Err(Error::not_found("user", listing.host_id.0));
        }
        let now = Utc::now();
        let created = Listing {
            id: ListingId(state.next_id()),
            host_id: listing.host_id,
            title: listing.title,
            description: listing.description,
            location: listing.location,
            nightly_price: listing.nightly_price,
            available: listing.available,
            created_at: now,
            updated_at: now,
        };
        state.listings.insert(created.id, created.clone());
        Ok(created)
    }

    async fn listing(&self, id: ListingId) -> Result<Listing> {
        self.lock()?
            .listings
            .get(&id)
            .cloned()
            .ok_or(Error::not_found("listing", id.0))
    }

    async fn update_listing(&self, listing: &Listing) -> Result<Listing> {
        let mut state = self.lock()?;
        if !state.listings.contains_key(&listing.id) {
            return Err(Error::not_found("listing", listing.id.0));
        }
        let mut updated = listing.clone();
        updated.updated_at = Utc::now();
        state.listings.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn delete_listing(&self, id: ListingId) -> Result<()> {
        let mut state = self.lock()?;
        if state.listings.remove(&id).is_none() {
            return Err(Error::not_found("listing", id.0));
        }
        // Cascade, mirroring the relational schema.
        let cascaded: Vec<BookingId> = state
            .bookings
            .values()
            .filter(|b| b.listing_id == id)
            .map(|b| b.id)
            .collect();
        for booking_id in cascaded {
            state.bookings.remove(&booking_id);
            state.occupied.remove(&booking_id);
        }
        Ok(())
    }

    async fn create_booking(&self, booking: NewBooking) -> Result<Booking> {
        // One lock scope spans the recheck and the insert.
        let mut state = self.lock()?;
        let same_listing = state
            .bookings
            .values()
            .filter(|b| b.listing_id == booking.listing_id);
        if conflicts_with(&booking.period, same_listing) {
            return Err(Error::Conflict);
        }

        let now = Utc::now();
        let created = Booking {
            id: BookingId(state.next_id()),
            listing_id: booking.listing_id,
            guest_id: booking.guest_id,
            start_date: booking.period.start(),
            end_date: booking.period.end(),
            status: booking.status,
            created_at: now,
            updated_at: now,
        };
        state.bookings.insert(created.id, created.clone());
        Ok(created)
    }

    async fn booking(&self, id: BookingId) -> Result<Booking> {
        self.lock()?
            .bookings
            .get(&id)
            .cloned()
            .ok_or(Error::not_found("booking", id.0))
    }

    async fn bookings_by_guest(&self, guest_id: UserId) -> Result<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .lock()?
            .bookings
            .values()
            .filter(|b| b.guest_id == guest_id)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.id);
        Ok(bookings)
    }

    async fn bookings_by_host(&self, host_id: UserId) -> Result<Vec<Booking>> {
        let state = self.lock()?;
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|b| {
                state
                    .listings
                    .get(&b.listing_id)
                    .is_some_and(|l| l.host_id == host_id)
            })
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.id);
        Ok(bookings)
    }

    async fn mark_booking_cancelled(&self, id: BookingId) -> Result<Booking> {
        let mut state = self.lock()?;
        let booking = state
            .bookings
            .get_mut(&id)
            .ok_or(Error::not_found("booking", id.0))?;
        if booking.status == BookingStatus::Cancelled {
            return Err(Error::AlreadyCancelled);
        }
        booking.status = BookingStatus::Cancelled;
        booking.updated_at = Utc::now();
        Ok(booking.clone())
    }

    async fn has_overlap(&self, listing_id: ListingId, period: DateRange) -> Result<bool> {
        let state = self.lock()?;
        let same_listing = state.bookings.values().filter(|b| b.listing_id == listing_id);
        Ok(conflicts_with(&period, same_listing))
    }

    async fn insert_occupied_range(&self, range: &OccupiedRange) -> Result<()> {
        // Keyed by booking id: redelivery overwrites with identical data.
        self.lock()?
            .occupied
            .entry(range.booking_id)
            .or_insert_with(|| range.clone());
        Ok(())
    }

    async fn delete_occupied_range(&self, booking_id: BookingId) -> Result<()> {
        self.lock()?.occupied.remove(&booking_id);
        Ok(())
    }

    async fn range_occupied(&self, listing_id: ListingId, period: DateRange) -> Result<bool> {
        Ok(self.lock()?.occupied.values().any(|r| {
            r.listing_id == listing_id
                && DateRange::new(r.start_date, r.end_date)
                    .is_ok_and(|occupied| occupied.overlaps(&period))
        }))
    }
}
