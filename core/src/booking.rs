//! Booking orchestration.
//!
//! [`BookingService`] accepts a reservation request, guarantees it does
//! not overlap an existing pending/confirmed reservation for the same
//! listing, persists it durably, keeps the read cache coherent with the
//! durable record, and publishes the resulting lifecycle event for the
//! side-effect consumers.
//!
//! Failure handling follows the dependency's role:
//! - the record store is authoritative — its failures abort the operation;
//! - the cache is best-effort — failures are logged and the request
//!   degrades to direct store reads;
//! - the event channel is reported honestly — a publish failure after a
//!   durable write does not roll the booking back, it surfaces as
//!   [`EventDispatch::Pending`] on an otherwise successful result.

use crate::availability::DateRange;
use crate::cache::{EntityCache, keys};
use crate::clock::Clock;
use crate::config::BookingConfig;
use crate::error::{Error, Result};
use crate::event::{EventRecord, LifecycleEvent};
use crate::event_bus::EventBus;
use crate::model::{Booking, BookingId, BookingStatus, ListingId, NewBooking, UserId};
use crate::store::RecordStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;

/// A reservation request as received from the inbound boundary.
#[derive(Debug, Clone)]
pub struct BookingRequest {
    /// Listing to reserve.
    pub listing_id: ListingId,
    /// Reserving guest.
    pub guest_id: UserId,
    /// Start of the reservation (inclusive).
    pub start_date: DateTime<Utc>,
    /// End of the reservation (exclusive).
    pub end_date: DateTime<Utc>,
}

/// Whether the lifecycle event for a completed write reached the channel.
///
/// `Pending` means the durable write succeeded but the event could not be
/// published within the retry budget; downstream materialization and
/// notifications will lag until the event is replayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDispatch {
    /// The event was accepted by the channel.
    Published,
    /// Publishing failed; the state change is durable but undistributed.
    Pending,
}

impl EventDispatch {
    /// True if the event reached the channel.
    #[must_use]
    pub const fn is_published(self) -> bool {
        matches!(self, Self::Published)
    }
}

/// Result of a successful [`BookingService::create_booking`].
#[derive(Debug, Clone)]
pub struct CreatedBooking {
    /// The durably persisted booking.
    pub booking: Booking,
    /// Whether `booking.created` reached the channel.
    pub event: EventDispatch,
}

/// Result of a successful [`BookingService::cancel_booking`].
#[derive(Debug, Clone)]
pub struct CancelledBooking {
    /// The booking after the status transition.
    pub booking: Booking,
    /// Whether `booking.canceled` reached the channel.
    pub event: EventDispatch,
}

/// The booking orchestrator.
///
/// All collaborators are injected at construction; the service holds no
/// process-wide state and is cheap to share per-request.
pub struct BookingService<S, C, B, K> {
    store: S,
    cache: C,
    bus: B,
    clock: K,
    config: BookingConfig,
}

impl<S, C, B, K> BookingService<S, C, B, K>
where
    S: RecordStore,
    C: EntityCache,
    B: EventBus,
    K: Clock,
{
    /// Create a booking service over the given collaborators.
    pub const fn new(store: S, cache: C, bus: B, clock: K, config: BookingConfig) -> Self {
        Self {
            store,
            cache,
            bus,
            clock,
            config,
        }
    }

    /// Create a reservation.
    ///
    /// On success the booking is durably persisted and conflict-free at
    /// that instant. Event delivery to consumers is at-least-once and
    /// asynchronous; see [`CreatedBooking::event`].
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for an inverted range or a start date in
    ///   the past, before any store access;
    /// - [`Error::NotFound`] if the guest or listing does not exist;
    /// - [`Error::Conflict`] if the period overlaps an existing
    ///   pending/confirmed booking;
    /// - [`Error::Storage`] / [`Error::Timeout`] from the record store.
    pub async fn create_booking(&self, request: BookingRequest) -> Result<CreatedBooking> {
        let period = DateRange::new(request.start_date, request.end_date)?;
        if request.start_date < self.clock.now() {
            return Err(Error::InvalidInput(
                "start date must not be in the past".to_string(),
            ));
        }

        let guest = self
            .deadline("guest lookup", self.store.user(request.guest_id))
            .await?;
        let listing = self
            .deadline("listing lookup", self.store.listing(request.listing_id))
            .await?;

        // Fail-fast read; the store re-checks under per-listing
        // serialization inside create_booking.
        if self
            .deadline(
                "availability check",
                self.store.has_overlap(listing.id, period),
            )
            .await?
        {
            return Err(Error::Conflict);
        }

        let booking = self
            .deadline(
                "booking insert",
                self.store.create_booking(NewBooking {
                    listing_id: listing.id,
                    guest_id: guest.id,
                    period,
                    status: BookingStatus::Pending,
                }),
            )
            .await?;

        metrics::counter!("nestly_bookings_created_total").increment(1);
        tracing::info!(
            booking_id = %booking.id,
            listing_id = %booking.listing_id,
            guest_id = %booking.guest_id,
            period = %period,
            "booking created"
        );

        self.snapshot_set(&keys::booking(booking.id), &booking).await;
        self.evict(vec![
            keys::guest_bookings(booking.guest_id),
            keys::host_bookings(listing.host_id),
        ])
        .await;

        let event = self
            .publish(LifecycleEvent::BookingCreated {
                booking: booking.clone(),
            })
            .await;

        Ok(CreatedBooking { booking, event })
    }

    /// Cancel a reservation.
    ///
    /// Transitions the booking to cancelled, retracts its occupancy row,
    /// invalidates its cache entries, and publishes `booking.canceled`.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if no such booking exists;
    /// - [`Error::AlreadyCancelled`] if it was cancelled earlier (the
    ///   transition itself is idempotent in effect, not in response);
    /// - [`Error::Storage`] / [`Error::Timeout`] from the record store.
    pub async fn cancel_booking(&self, id: BookingId) -> Result<CancelledBooking> {
        let existing = self.deadline("booking lookup", self.store.booking(id)).await?;
        if existing.status == BookingStatus::Cancelled {
            return Err(Error::AlreadyCancelled);
        }

        let booking = self
            .deadline("booking cancel", self.store.mark_booking_cancelled(id))
            .await?;
        self.deadline(
            "occupancy retract",
            self.store.delete_occupied_range(booking.id),
        )
        .await?;

        metrics::counter!("nestly_bookings_cancelled_total").increment(1);
        tracing::info!(booking_id = %booking.id, "booking cancelled");

        // Invalidation precedes visibility: evict before returning so a
        // subsequent read never serves the stale pending snapshot.
        let mut stale = vec![keys::booking(booking.id), keys::guest_bookings(booking.guest_id)];
        match self
            .deadline("listing lookup", self.store.listing(booking.listing_id))
            .await
        {
            Ok(listing) => stale.push(keys::host_bookings(listing.host_id)),
            Err(e) => tracing::warn!(
                booking_id = %booking.id,
                listing_id = %booking.listing_id,
                error = %e,
                "listing unresolved, skipping host collection invalidation"
            ),
        }
        self.evict(stale).await;

        let event = self
            .publish(LifecycleEvent::BookingCanceled {
                booking: booking.clone(),
            })
            .await;

        Ok(CancelledBooking { booking, event })
    }

    /// Fetch a booking, read-through the cache.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if absent, or [`Error::Storage`] /
    /// [`Error::Timeout`] from the record store.
    pub async fn get_booking(&self, id: BookingId) -> Result<Booking> {
        let key = keys::booking(id);
        if let Some(cached) = self.snapshot_get::<Booking>(&key).await {
            return Ok(cached);
        }

        let booking = self.deadline("booking lookup", self.store.booking(id)).await?;
        self.snapshot_set(&key, &booking).await;
        Ok(booking)
    }

    /// All bookings made by a guest, read-through the cache.
    ///
    /// A cached empty collection is treated as a miss so "zero results"
    /// never becomes authoritative.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the guest does not exist, or
    /// [`Error::Storage`] / [`Error::Timeout`] from the record store.
    pub async fn bookings_by_guest(&self, guest_id: UserId) -> Result<Vec<Booking>> {
        self.deadline("guest lookup", self.store.user(guest_id)).await?;
        self.collection(
            keys::guest_bookings(guest_id),
            self.store.bookings_by_guest(guest_id),
        )
        .await
    }

    /// All bookings across a host's listings, read-through the cache.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the host does not exist, or
    /// [`Error::Storage`] / [`Error::Timeout`] from the record store.
    pub async fn bookings_by_host(&self, host_id: UserId) -> Result<Vec<Booking>> {
        self.deadline("host lookup", self.store.user(host_id)).await?;
        self.collection(
            keys::host_bookings(host_id),
            self.store.bookings_by_host(host_id),
        )
        .await
    }

    /// Whether the listing is free over `[start, end)`.
    ///
    /// Served from the materialized occupancy table, so the answer
    /// reflects what the occupancy consumer has applied.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an inverted range, or
    /// [`Error::Storage`] / [`Error::Timeout`] from the record store.
    pub async fn check_availability(
        &self,
        listing_id: ListingId,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
    ) -> Result<bool> {
        let period = DateRange::new(start_date, end_date)?;
        let occupied = self
            .deadline(
                "availability check",
                self.store.range_occupied(listing_id, period),
            )
            .await?;
        Ok(!occupied)
    }

    // ═══════════════════════════════════════════════════════════════════
    // I/O helpers
    // ═══════════════════════════════════════════════════════════════════

    async fn deadline<T>(
        &self,
        what: &'static str,
        fut: impl Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        with_deadline(self.config.op_deadline, what, fut).await
    }

    async fn collection(
        &self,
        key: String,
        load: impl Future<Output = Result<Vec<Booking>>> + Send,
    ) -> Result<Vec<Booking>> {
        if let Some(cached) = self.snapshot_get::<Vec<Booking>>(&key).await {
            if !cached.is_empty() {
                return Ok(cached);
            }
        }

        let bookings = self.deadline("booking query", load).await?;
        if !bookings.is_empty() {
            self.snapshot_set(&key, &bookings).await;
        }
        Ok(bookings)
    }

    async fn snapshot_get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        snapshot_get(&self.cache, key).await
    }

    async fn snapshot_set<T: Serialize>(&self, key: &str, value: &T) {
        snapshot_set(&self.cache, self.config.cache_ttl, key, value).await;
    }

    async fn evict(&self, keys: Vec<String>) {
        evict(&self.cache, keys).await;
    }

    async fn publish(&self, event: LifecycleEvent) -> EventDispatch {
        publish_with_retry(&self.bus, &self.clock, &self.config, &event).await
    }
}

/// Bound `fut` by `deadline`, mapping expiry to [`Error::Timeout`].
pub(crate) async fn with_deadline<T>(
    deadline: Duration,
    what: &'static str,
    fut: impl Future<Output = Result<T>> + Send,
) -> Result<T> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(what)),
    }
}

/// Best-effort cache read: backend or decode failures log and miss.
pub(crate) async fn snapshot_get<C: EntityCache, T: DeserializeOwned>(
    cache: &C,
    key: &str,
) -> Option<T> {
    match cache.get(key).await {
        Ok(Some(bytes)) => match bincode::deserialize(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "discarding undecodable cache entry");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "cache read failed, falling through to store");
            None
        }
    }
}

/// Best-effort cache write: failures log and drop.
pub(crate) async fn snapshot_set<C: EntityCache, T: Serialize>(
    cache: &C,
    ttl: Duration,
    key: &str,
    value: &T,
) {
    let bytes = match bincode::serialize(value) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "snapshot serialization failed");
            return;
        }
    };
    if let Err(e) = cache.set(key, &bytes, ttl).await {
        tracing::warn!(key = %key, error = %e, "cache write failed");
    }
}

/// Best-effort cache invalidation: failures log and drop.
pub(crate) async fn evict<C: EntityCache>(cache: &C, keys: Vec<String>) {
    if let Err(e) = cache.delete(&keys).await {
        tracing::warn!(keys = ?keys, error = %e, "cache invalidation failed");
    }
}

/// Publish with bounded exponential backoff; exhaustion degrades to
/// [`EventDispatch::Pending`] instead of failing the request.
pub(crate) async fn publish_with_retry<B: EventBus, K: Clock>(
    bus: &B,
    clock: &K,
    config: &BookingConfig,
    event: &LifecycleEvent,
) -> EventDispatch {
    let record = match EventRecord::from_event(event, clock.now()) {
        Ok(record) => record,
        Err(e) => {
            tracing::error!(topic = event.topic(), error = %e, "event encoding failed");
            metrics::counter!("nestly_event_publish_failures_total").increment(1);
            return EventDispatch::Pending;
        }
    };

    let attempts = config.publish_attempts.max(1);
    for attempt in 0..attempts {
        match with_deadline(
            config.op_deadline,
            "event publish",
            async {
                bus.publish(record.clone())
                    .await
                    .map_err(|e| Error::DependencyUnavailable(e.to_string()))
            },
        )
        .await
        {
            Ok(()) => return EventDispatch::Published,
            Err(e) => {
                tracing::warn!(
                    topic = %record.topic,
                    key = %record.key,
                    attempt = attempt + 1,
                    error = %e,
                    "event publish attempt failed"
                );
                if attempt + 1 < attempts {
                    tokio::time::sleep(config.publish_backoff * 2u32.pow(attempt)).await;
                }
            }
        }
    }

    metrics::counter!("nestly_event_publish_failures_total").increment(1);
    tracing::error!(
        topic = %record.topic,
        key = %record.key,
        "event undelivered after retries; state change is durable but undistributed"
    );
    EventDispatch::Pending
}
