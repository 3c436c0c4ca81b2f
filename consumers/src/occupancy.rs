//! Occupancy calendar materialization.

use crate::runner::EventHandler;
use nestly_core::error::Result;
use nestly_core::event::{LifecycleEvent, topics};
use nestly_core::model::OccupiedRange;
use nestly_core::store::RecordStore;

/// Materializes one occupied-date-range row per effective booking.
///
/// Rows are keyed by booking id under a uniqueness constraint in the
/// store, so a redelivered `booking.created` inserts nothing and a
/// redelivered `booking.canceled` deletes nothing.
pub struct OccupancyMaterializer<S> {
    store: S,
}

impl<S> OccupancyMaterializer<S>
where
    S: RecordStore,
{
    /// Create the materializer over a record store handle.
    pub const fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S> EventHandler for OccupancyMaterializer<S>
where
    S: RecordStore,
{
    fn name(&self) -> &'static str {
        "booking-occupancy"
    }

    fn topics(&self) -> &'static [&'static str] {
        topics::BOOKING_TOPICS
    }

    async fn handle(&self, event: &LifecycleEvent) -> Result<()> {
        match event {
            LifecycleEvent::BookingCreated { booking } => {
                self.store
                    .insert_occupied_range(&OccupiedRange::for_booking(booking))
                    .await?;
                tracing::debug!(
                    booking_id = %booking.id,
                    listing_id = %booking.listing_id,
                    "occupancy materialized"
                );
            }
            LifecycleEvent::BookingCanceled { booking } => {
                self.store.delete_occupied_range(booking.id).await?;
                tracing::debug!(booking_id = %booking.id, "occupancy retracted");
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use nestly_core::DateRange;
    use nestly_core::model::{Booking, BookingId, BookingStatus, ListingId, UserId};
    use nestly_testing::InMemoryRecordStore;

    fn booking(id: i64, listing: i64, start_day: u32, end_day: u32) -> Booking {
        let now = Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).single().unwrap();
        Booking {
            id: BookingId(id),
            listing_id: ListingId(listing),
            guest_id: UserId(1),
            start_date: Utc.with_ymd_and_hms(2025, 6, start_day, 0, 0, 0).single().unwrap(),
            end_date: Utc.with_ymd_and_hms(2025, 6, end_day, 0, 0, 0).single().unwrap(),
            status: BookingStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    fn period(start_day: u32, end_day: u32) -> DateRange {
        DateRange::new(
            Utc.with_ymd_and_hms(2025, 6, start_day, 0, 0, 0).single().unwrap(),
            Utc.with_ymd_and_hms(2025, 6, end_day, 0, 0, 0).single().unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn created_event_materializes_an_occupied_range() {
        let store = InMemoryRecordStore::new();
        let materializer = OccupancyMaterializer::new(store.clone());

        let event = LifecycleEvent::BookingCreated {
            booking: booking(9, 5, 1, 5),
        };
        materializer.handle(&event).await.unwrap();

        assert!(store.range_occupied(ListingId(5), period(2, 4)).await.unwrap());
        assert!(!store.range_occupied(ListingId(5), period(5, 8)).await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_delivery_materializes_exactly_one_row() {
        let store = InMemoryRecordStore::new();
        let materializer = OccupancyMaterializer::new(store.clone());

        let event = LifecycleEvent::BookingCreated {
            booking: booking(9, 5, 1, 5),
        };
        materializer.handle(&event).await.unwrap();
        materializer.handle(&event).await.unwrap();

        assert_eq!(store.occupied_row_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn canceled_event_frees_the_listing() {
        let store = InMemoryRecordStore::new();
        let materializer = OccupancyMaterializer::new(store.clone());

        let snapshot = booking(9, 5, 1, 5);
        materializer
            .handle(&LifecycleEvent::BookingCreated {
                booking: snapshot.clone(),
            })
            .await
            .unwrap();
        assert!(store.range_occupied(ListingId(5), period(1, 5)).await.unwrap());

        materializer
            .handle(&LifecycleEvent::BookingCanceled { booking: snapshot })
            .await
            .unwrap();
        assert!(!store.range_occupied(ListingId(5), period(1, 5)).await.unwrap());

        // Retraction is idempotent too.
        materializer
            .handle(&LifecycleEvent::BookingCanceled {
                booking: booking(9, 5, 1, 5),
            })
            .await
            .unwrap();
    }
}
