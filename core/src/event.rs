//! Lifecycle events and their wire envelope.
//!
//! Every state transition the pipeline cares about is one variant of
//! [`LifecycleEvent`], carrying a typed snapshot. Consumers pattern-match
//! the closed set instead of branching on topic strings with a generic
//! unmarshal. On the wire an event travels as an [`EventRecord`]: topic,
//! partition key, JSON payload, and timestamp.
//!
//! Events are append-only facts. They are never mutated or deleted by the
//! pipeline and are delivered at-least-once, so every consumer must be
//! idempotent with respect to redelivery.

use crate::error::Error;
use crate::model::{Booking, Listing, ListingId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Topic names for lifecycle events.
pub mod topics {
    /// A booking was durably created.
    pub const BOOKING_CREATED: &str = "booking.created";
    /// A booking transitioned to cancelled.
    pub const BOOKING_CANCELED: &str = "booking.canceled";
    /// A listing was created.
    pub const LISTING_CREATED: &str = "listing.created";
    /// A listing's fields changed.
    pub const LISTING_UPDATED: &str = "listing.updated";
    /// A listing was removed.
    pub const LISTING_DELETED: &str = "listing.deleted";

    /// Topics consumed by the booking side-effect consumers.
    pub const BOOKING_TOPICS: &[&str] = &[BOOKING_CREATED, BOOKING_CANCELED];
}

/// A state transition, with its full entity snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// A booking was durably created.
    BookingCreated {
        /// Snapshot of the booking at creation time.
        booking: Booking,
    },
    /// A booking transitioned to cancelled.
    BookingCanceled {
        /// Snapshot of the booking after cancellation.
        booking: Booking,
    },
    /// A listing was created.
    ListingCreated {
        /// Snapshot of the new listing.
        listing: Listing,
    },
    /// A listing's fields changed.
    ListingUpdated {
        /// Snapshot of the listing after the update.
        listing: Listing,
    },
    /// A listing was removed; its bookings cascade in the store.
    ListingDeleted {
        /// The removed listing's id.
        listing_id: ListingId,
    },
}

impl LifecycleEvent {
    /// The topic this event is published on.
    #[must_use]
    pub const fn topic(&self) -> &'static str {
        match self {
            Self::BookingCreated { .. } => topics::BOOKING_CREATED,
            Self::BookingCanceled { .. } => topics::BOOKING_CANCELED,
            Self::ListingCreated { .. } => topics::LISTING_CREATED,
            Self::ListingUpdated { .. } => topics::LISTING_UPDATED,
            Self::ListingDeleted { .. } => topics::LISTING_DELETED,
        }
    }

    /// The partition/ordering key: the business id of the entity, so all
    /// events for one booking (or listing) stay ordered.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::BookingCreated { booking } | Self::BookingCanceled { booking } => {
                booking.id.to_string()
            }
            Self::ListingCreated { listing } | Self::ListingUpdated { listing } => {
                listing.id.to_string()
            }
            Self::ListingDeleted { listing_id } => listing_id.to_string(),
        }
    }
}

/// The wire form of a lifecycle event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Destination topic.
    pub topic: String,
    /// Partition/ordering key (business id).
    pub key: String,
    /// JSON-serialized [`LifecycleEvent`].
    pub payload: Vec<u8>,
    /// When the event was produced.
    pub timestamp: DateTime<Utc>,
}

impl EventRecord {
    /// Build the wire record for an event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the payload cannot be encoded.
    pub fn from_event(event: &LifecycleEvent, timestamp: DateTime<Utc>) -> Result<Self, Error> {
        let payload =
            serde_json::to_vec(event).map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(Self {
            topic: event.topic().to_string(),
            key: event.key(),
            payload,
            timestamp,
        })
    }

    /// Decode the payload back into a typed event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the payload is not a valid
    /// [`LifecycleEvent`].
    pub fn decode(&self) -> Result<LifecycleEvent, Error> {
        serde_json::from_slice(&self.payload).map_err(|e| Error::Serialization(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{BookingId, BookingStatus, UserId};
    use chrono::TimeZone;

    fn sample_booking() -> Booking {
        let created = Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).single().unwrap();
        Booking {
            id: BookingId(9),
            listing_id: ListingId(5),
            guest_id: UserId(42),
            start_date: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).single().unwrap(),
            end_date: Utc.with_ymd_and_hms(2025, 6, 5, 0, 0, 0).single().unwrap(),
            status: BookingStatus::Pending,
            created_at: created,
            updated_at: created,
        }
    }

    #[test]
    fn record_round_trips_typed_event() {
        let event = LifecycleEvent::BookingCreated {
            booking: sample_booking(),
        };
        let record = EventRecord::from_event(&event, Utc::now()).unwrap();

        assert_eq!(record.topic, topics::BOOKING_CREATED);
        assert_eq!(record.key, "9");
        assert_eq!(record.decode().unwrap(), event);
    }

    #[test]
    fn events_partition_by_business_id() {
        let booking = sample_booking();
        let created = LifecycleEvent::BookingCreated {
            booking: booking.clone(),
        };
        let canceled = LifecycleEvent::BookingCanceled { booking };
        // Both events for one booking share a key, preserving their order.
        assert_eq!(created.key(), canceled.key());
    }

    #[test]
    fn payload_is_tagged_json() {
        let event = LifecycleEvent::ListingDeleted {
            listing_id: ListingId(7),
        };
        let record = EventRecord::from_event(&event, Utc::now()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&record.payload).unwrap();
        assert_eq!(json["kind"], "listing_deleted");
        assert_eq!(json["listing_id"], 7);
    }
}
