//! End-to-end pipeline tests: orchestrator → event bus → consumers.

#![allow(clippy::unwrap_used)]

use chrono::{DateTime, TimeZone, Utc};
use nestly_consumers::{ConsumerRunner, OccupancyMaterializer};
use nestly_core::{
    BookingConfig, BookingRequest, BookingService, NewListing, NewUser, RecordStore, Role,
};
use nestly_testing::{FixedClock, InMemoryCache, InMemoryEventBus, InMemoryRecordStore};
use std::sync::Arc;
use std::time::Duration;

fn june(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, day, 0, 0, 0).single().unwrap()
}

async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(condition(), "condition not reached within 2s");
}

#[tokio::test]
async fn bookings_flow_through_the_channel_into_the_occupancy_calendar() {
    let store = InMemoryRecordStore::new();
    let bus = InMemoryEventBus::new();

    let host = store
        .create_user(NewUser {
            email: "host@example.com".to_string(),
            password_hash: "hash".to_string(),
            name: "Hana".to_string(),
            role: Role::Host,
        })
        .await
        .unwrap();
    let guest = store
        .create_user(NewUser {
            email: "guest@example.com".to_string(),
            password_hash: "hash".to_string(),
            name: "Gustav".to_string(),
            role: Role::Guest,
        })
        .await
        .unwrap();
    let listing = store
        .create_listing(NewListing {
            host_id: host.id,
            title: "Loft".to_string(),
            description: String::new(),
            location: "Amsterdam".to_string(),
            nightly_price: 100.0,
            available: true,
        })
        .await
        .unwrap();

    let service = BookingService::new(
        store.clone(),
        InMemoryCache::new(),
        bus.clone(),
        FixedClock::start_of_2025(),
        BookingConfig::default(),
    );

    let (mut runner, shutdown) = ConsumerRunner::new(
        OccupancyMaterializer::new(store.clone()),
        Arc::new(bus.clone()),
    );
    let consumer = tokio::spawn(async move { runner.run().await });

    // Publishing before the consumer attaches would drop the event on the
    // in-memory bus; Kafka replays from the group offset instead.
    {
        let bus = bus.clone();
        wait_until(move || bus.subscriber_count() == 1).await;
    }

    // Create: the consumer materializes the occupied range, and the
    // standalone availability query starts reflecting it.
    let created = service
        .create_booking(BookingRequest {
            listing_id: listing.id,
            guest_id: guest.id,
            start_date: june(1),
            end_date: june(5),
        })
        .await
        .unwrap();

    {
        let store = store.clone();
        wait_until(move || store.occupied_row_count().unwrap_or(0) == 1).await;
    }
    assert!(
        !service
            .check_availability(listing.id, june(4), june(8))
            .await
            .unwrap(),
        "overlap at June 4 must make the listing unavailable"
    );
    assert!(
        service
            .check_availability(listing.id, june(5), june(8))
            .await
            .unwrap(),
        "adjacent half-open interval must stay available"
    );

    // Cancel: the canceled event retracts the row and frees the dates.
    service.cancel_booking(created.booking.id).await.unwrap();
    {
        let store = store.clone();
        wait_until(move || store.occupied_row_count().unwrap_or(1) == 0).await;
    }
    assert!(
        service
            .check_availability(listing.id, june(1), june(5))
            .await
            .unwrap(),
        "cancellation must restore availability"
    );

    shutdown.send(true).unwrap();
    consumer.await.unwrap().unwrap();
}
