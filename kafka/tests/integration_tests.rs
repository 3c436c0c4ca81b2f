//! Kafka integration tests.
//!
//! These require a Kafka-compatible broker on localhost:9092:
//! `docker run -d -p 9092:9092 redpandadata/redpanda`

#![allow(clippy::unwrap_used)]

use chrono::{TimeZone, Utc};
use futures::StreamExt;
use nestly_core::event::{EventRecord, LifecycleEvent, topics};
use nestly_core::event_bus::EventBus;
use nestly_core::model::{Booking, BookingId, BookingStatus, ListingId, UserId};
use nestly_kafka::KafkaEventBus;
use std::time::Duration;

fn sample_booking(id: i64) -> Booking {
    let now = Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).single().unwrap();
    Booking {
        id: BookingId(id),
        listing_id: ListingId(5),
        guest_id: UserId(42),
        start_date: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).single().unwrap(),
        end_date: Utc.with_ymd_and_hms(2025, 6, 5, 0, 0, 0).single().unwrap(),
        status: BookingStatus::Pending,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
#[ignore] // Requires Kafka running
async fn published_event_reaches_a_subscriber() {
    let bus = KafkaEventBus::builder()
        .brokers("localhost:9092")
        .consumer_group(format!("roundtrip-{}", std::process::id()))
        .auto_offset_reset("earliest")
        .build()
        .unwrap();

    let mut stream = bus.subscribe(&[topics::BOOKING_CREATED]).await.unwrap();
    // Give the group a moment to rebalance before publishing.
    tokio::time::sleep(Duration::from_secs(2)).await;

    let event = LifecycleEvent::BookingCreated {
        booking: sample_booking(9),
    };
    let record = EventRecord::from_event(&event, Utc::now()).unwrap();
    bus.publish(record).await.unwrap();

    let received = tokio::time::timeout(Duration::from_secs(30), stream.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(received.topic, topics::BOOKING_CREATED);
    assert_eq!(received.key, "9");
    assert_eq!(received.decode().unwrap(), event);
}

#[tokio::test]
#[ignore] // Requires Kafka running
async fn one_subscription_receives_both_booking_topics() {
    let bus = KafkaEventBus::builder()
        .brokers("localhost:9092")
        .consumer_group(format!("ordering-{}", std::process::id()))
        .auto_offset_reset("earliest")
        .build()
        .unwrap();

    let mut stream = bus.subscribe(topics::BOOKING_TOPICS).await.unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    let booking = sample_booking(11);
    let created = LifecycleEvent::BookingCreated {
        booking: booking.clone(),
    };
    let canceled = LifecycleEvent::BookingCanceled { booking };
    bus.publish(EventRecord::from_event(&created, Utc::now()).unwrap())
        .await
        .unwrap();
    bus.publish(EventRecord::from_event(&canceled, Utc::now()).unwrap())
        .await
        .unwrap();

    // The two lifecycle kinds live on separate topics, so only per-topic
    // order is guaranteed; assert both arrive.
    let mut received = Vec::new();
    while received.len() < 2 {
        let record = tokio::time::timeout(Duration::from_secs(30), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        if record.key == "11" {
            received.push(record.decode().unwrap());
        }
    }

    assert!(received.contains(&created));
    assert!(received.contains(&canceled));
}
