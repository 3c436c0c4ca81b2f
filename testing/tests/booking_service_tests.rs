//! Behavioral tests for the booking orchestrator over in-memory doubles.

#![allow(clippy::unwrap_used)]

use chrono::{DateTime, TimeZone, Utc};
use nestly_core::cache::keys;
use nestly_core::{
    Booking, BookingConfig, BookingRequest, BookingService, EntityCache, Error, EventDispatch,
    Listing, NewListing, NewUser, RecordStore, Role, User,
};
use nestly_core::event::topics;
use nestly_testing::{
    FailingEventBus, FixedClock, InMemoryCache, InMemoryEventBus, InMemoryRecordStore,
    UnavailableCache,
};
use std::time::Duration;

type Service =
    BookingService<InMemoryRecordStore, InMemoryCache, InMemoryEventBus, FixedClock>;

fn june(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, day, 0, 0, 0).single().unwrap()
}

fn fast_config() -> BookingConfig {
    BookingConfig::default().with_publish_retry(1, Duration::from_millis(1))
}

async fn seed(store: &InMemoryRecordStore) -> (User, User, Listing) {
    let host = store
        .create_user(NewUser {
            email: "host@example.com".to_string(),
            password_hash: "hash".to_string(),
            name: "Hana Host".to_string(),
            role: Role::Host,
        })
        .await
        .unwrap();
    let guest = store
        .create_user(NewUser {
            email: "guest@example.com".to_string(),
            password_hash: "hash".to_string(),
            name: "Gustav Guest".to_string(),
            role: Role::Guest,
        })
        .await
        .unwrap();
    let listing = store
        .create_listing(NewListing {
            host_id: host.id,
            title: "Canal-side loft".to_string(),
            description: "Two rooms over the water".to_string(),
            location: "Amsterdam".to_string(),
            nightly_price: 120.0,
            available: true,
        })
        .await
        .unwrap();
    (host, guest, listing)
}

struct Harness {
    cache: InMemoryCache,
    bus: InMemoryEventBus,
    service: Service,
    host: User,
    guest: User,
    listing: Listing,
}

async fn harness() -> Harness {
    let store = InMemoryRecordStore::new();
    let cache = InMemoryCache::new();
    let bus = InMemoryEventBus::new();
    let (host, guest, listing) = seed(&store).await;
    let service = BookingService::new(
        store.clone(),
        cache.clone(),
        bus.clone(),
        FixedClock::start_of_2025(),
        fast_config(),
    );
    Harness {
        cache,
        bus,
        service,
        host,
        guest,
        listing,
    }
}

fn request(h: &Harness, start: u32, end: u32) -> BookingRequest {
    BookingRequest {
        listing_id: h.listing.id,
        guest_id: h.guest.id,
        start_date: june(start),
        end_date: june(end),
    }
}

#[tokio::test]
async fn create_then_get_round_trips_every_field() {
    let h = harness().await;
    let created = h.service.create_booking(request(&h, 1, 5)).await.unwrap();
    assert_eq!(created.event, EventDispatch::Published);

    // First read is served by the cache written through on create, the
    // second re-reads it; both must agree with the created record.
    let from_cache = h.service.get_booking(created.booking.id).await.unwrap();
    assert_eq!(from_cache, created.booking);

    h.cache.delete(&[keys::booking(created.booking.id)]).await.ok();
    let from_store = h.service.get_booking(created.booking.id).await.unwrap();
    assert_eq!(from_store, created.booking);
}

#[tokio::test]
async fn overlapping_booking_fails_with_conflict() {
    let h = harness().await;
    h.service.create_booking(request(&h, 1, 5)).await.unwrap();

    // Overlap at June 4.
    let err = h.service.create_booking(request(&h, 4, 8)).await.unwrap_err();
    assert_eq!(err, Error::Conflict);

    // Only the winner published an event.
    assert_eq!(h.bus.published_to(topics::BOOKING_CREATED).len(), 1);
}

#[tokio::test]
async fn adjacent_booking_succeeds_under_half_open_intervals() {
    let h = harness().await;
    h.service.create_booking(request(&h, 1, 5)).await.unwrap();

    // Shares the June 5 endpoint; half-open, so no overlap.
    let adjacent = h.service.create_booking(request(&h, 5, 8)).await.unwrap();
    assert_eq!(adjacent.booking.start_date, june(5));
}

#[tokio::test]
async fn inverted_or_empty_range_fails_before_store_access() {
    let h = harness().await;
    for (start, end) in [(5, 5), (8, 5)] {
        let err = h
            .service
            .create_booking(request(&h, start, end))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)), "got {err:?}");
    }
    // Invalid even when the listing does not exist: validation comes first.
    let err = h
        .service
        .create_booking(BookingRequest {
            listing_id: nestly_core::ListingId(999),
            guest_id: h.guest.id,
            start_date: june(5),
            end_date: june(5),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn past_start_date_is_rejected() {
    let h = harness().await;
    let past = Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).single().unwrap();
    let err = h
        .service
        .create_booking(BookingRequest {
            listing_id: h.listing.id,
            guest_id: h.guest.id,
            start_date: past,
            end_date: june(1),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn unknown_guest_or_listing_fails_with_not_found() {
    let h = harness().await;
    let err = h
        .service
        .create_booking(BookingRequest {
            guest_id: nestly_core::UserId(999),
            ..request(&h, 1, 5)
        })
        .await
        .unwrap_err();
    assert_eq!(err, Error::not_found("user", 999));

    let err = h
        .service
        .create_booking(BookingRequest {
            listing_id: nestly_core::ListingId(999),
            ..request(&h, 1, 5)
        })
        .await
        .unwrap_err();
    assert_eq!(err, Error::not_found("listing", 999));
}

#[tokio::test]
async fn cancel_is_idempotent_in_effect_but_not_in_response() {
    let h = harness().await;
    let created = h.service.create_booking(request(&h, 1, 5)).await.unwrap();

    let cancelled = h.service.cancel_booking(created.booking.id).await.unwrap();
    assert_eq!(
        cancelled.booking.status,
        nestly_core::BookingStatus::Cancelled
    );

    let err = h.service.cancel_booking(created.booking.id).await.unwrap_err();
    assert_eq!(err, Error::AlreadyCancelled);

    // One cancellation event despite two calls.
    assert_eq!(h.bus.published_to(topics::BOOKING_CANCELED).len(), 1);
}

#[tokio::test]
async fn cancelled_booking_is_never_served_from_a_stale_snapshot() {
    let h = harness().await;
    let created = h.service.create_booking(request(&h, 1, 5)).await.unwrap();

    // Populate the cache with the pending snapshot.
    let fetched = h.service.get_booking(created.booking.id).await.unwrap();
    assert_eq!(fetched.status, nestly_core::BookingStatus::Pending);
    assert!(h.cache.contains_key(&keys::booking(created.booking.id)));

    h.service.cancel_booking(created.booking.id).await.unwrap();

    // Invalidation precedes visibility: the next read reflects the store.
    let after = h.service.get_booking(created.booking.id).await.unwrap();
    assert_eq!(after.status, nestly_core::BookingStatus::Cancelled);
}

#[tokio::test]
async fn cancelling_frees_the_dates_for_a_new_booking() {
    let h = harness().await;
    let created = h.service.create_booking(request(&h, 1, 5)).await.unwrap();
    h.service.cancel_booking(created.booking.id).await.unwrap();

    // Cancelled bookings never block.
    h.service.create_booking(request(&h, 1, 5)).await.unwrap();
}

#[tokio::test]
async fn empty_collection_is_a_miss_not_an_authoritative_answer() {
    let h = harness().await;
    assert!(h.service.bookings_by_guest(h.guest.id).await.unwrap().is_empty());

    let created = h.service.create_booking(request(&h, 1, 5)).await.unwrap();

    // If "zero results" had been cached as truth, this would still be empty.
    let bookings = h.service.bookings_by_guest(h.guest.id).await.unwrap();
    assert_eq!(bookings, vec![created.booking]);
}

#[tokio::test]
async fn host_collection_reflects_new_bookings() {
    let h = harness().await;
    assert!(h.service.bookings_by_host(h.host.id).await.unwrap().is_empty());

    let created = h.service.create_booking(request(&h, 1, 5)).await.unwrap();
    let bookings = h.service.bookings_by_host(h.host.id).await.unwrap();
    assert_eq!(bookings, vec![created.booking]);

    // Second read is the cached collection and must agree.
    let cached: Vec<Booking> = h.service.bookings_by_host(h.host.id).await.unwrap();
    assert_eq!(cached, bookings);
}

#[tokio::test]
async fn collection_queries_require_an_existing_owner() {
    let h = harness().await;
    let err = h
        .service
        .bookings_by_guest(nestly_core::UserId(999))
        .await
        .unwrap_err();
    assert_eq!(err, Error::not_found("user", 999));
}

#[tokio::test]
async fn availability_is_true_on_an_empty_calendar() {
    let h = harness().await;
    let available = h
        .service
        .check_availability(h.listing.id, june(1), june(3))
        .await
        .unwrap();
    assert!(available);
}

#[tokio::test]
async fn cache_outage_degrades_to_store_reads() {
    let store = InMemoryRecordStore::new();
    let bus = InMemoryEventBus::new();
    let (_, guest, listing) = seed(&store).await;
    let service = BookingService::new(
        store,
        UnavailableCache::new(),
        bus,
        FixedClock::start_of_2025(),
        fast_config(),
    );

    let created = service
        .create_booking(BookingRequest {
            listing_id: listing.id,
            guest_id: guest.id,
            start_date: june(1),
            end_date: june(5),
        })
        .await
        .unwrap();
    assert_eq!(created.event, EventDispatch::Published);

    // Reads, collections, and cancellation all survive the dead cache.
    assert_eq!(
        service.get_booking(created.booking.id).await.unwrap(),
        created.booking
    );
    assert_eq!(
        service.bookings_by_guest(guest.id).await.unwrap(),
        vec![created.booking.clone()]
    );
    service.cancel_booking(created.booking.id).await.unwrap();
}

#[tokio::test]
async fn publish_outage_degrades_to_pending_event() {
    let store = InMemoryRecordStore::new();
    let (_, guest, listing) = seed(&store).await;
    let service = BookingService::new(
        store.clone(),
        InMemoryCache::new(),
        FailingEventBus::new(),
        FixedClock::start_of_2025(),
        fast_config(),
    );

    let created = service
        .create_booking(BookingRequest {
            listing_id: listing.id,
            guest_id: guest.id,
            start_date: june(1),
            end_date: june(5),
        })
        .await
        .unwrap();

    // The booking is durable even though the event never left the process.
    assert_eq!(created.event, EventDispatch::Pending);
    assert_eq!(
        store.booking(created.booking.id).await.unwrap(),
        created.booking
    );
}

#[tokio::test]
async fn concurrent_overlapping_requests_admit_exactly_one_booking() {
    let store = InMemoryRecordStore::new();
    let cache = InMemoryCache::new();
    let bus = InMemoryEventBus::new();
    let (_, guest, listing) = seed(&store).await;

    let make_service = || {
        BookingService::new(
            store.clone(),
            cache.clone(),
            bus.clone(),
            FixedClock::start_of_2025(),
            fast_config(),
        )
    };
    let a = make_service();
    let b = make_service();

    let req = BookingRequest {
        listing_id: listing.id,
        guest_id: guest.id,
        start_date: june(1),
        end_date: june(5),
    };
    // Same dates from both sides; the fail-fast checks may both pass, but
    // the store's serialized check-and-insert admits only one.
    let (first, second) = tokio::join!(
        a.create_booking(req.clone()),
        b.create_booking(BookingRequest {
            start_date: june(3),
            end_date: june(7),
            ..req.clone()
        })
    );

    assert!(
        first.is_ok() ^ second.is_ok(),
        "exactly one concurrent overlapping create may succeed: {first:?} / {second:?}"
    );
    let loser = if first.is_ok() { second } else { first };
    assert_eq!(loser.unwrap_err(), Error::Conflict);
    assert_eq!(bus.published_to(topics::BOOKING_CREATED).len(), 1);
}
