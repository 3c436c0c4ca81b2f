//! Event channel abstraction.
//!
//! The [`EventBus`] trait carries lifecycle events from the orchestrator to
//! the side-effect consumers with at-least-once delivery. Events are
//! persisted to the record store *before* publishing; the bus only
//! distributes them. Ordering holds within a partition key (all events for
//! one booking), not across keys.
//!
//! Implementations: `KafkaEventBus` in `nestly-kafka` for production, an
//! in-memory bus in `nestly-testing` for tests.

use crate::event::EventRecord;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors from event bus operations.
#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    /// Could not reach or configure the broker.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Publishing to a topic failed.
    #[error("publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed.
        topic: String,
        /// Why it failed.
        reason: String,
    },

    /// Subscribing to topics failed.
    #[error("subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe.
        topics: Vec<String>,
        /// Why it failed.
        reason: String,
    },

    /// A received message could not be turned into an [`EventRecord`].
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Network or transport failure while consuming.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Stream of records from a subscription.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<EventRecord, EventBusError>> + Send>>;

/// Publish/subscribe transport for lifecycle events.
///
/// Uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn` so
/// the trait stays dyn-compatible (`Arc<dyn EventBus>` in consumer
/// runners).
pub trait EventBus: Send + Sync {
    /// Publish one record to its topic, partitioned by its key.
    ///
    /// Delivery is at-least-once; consumers must tolerate duplicates.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the record could not be
    /// handed to the broker. Failures must be reported to the caller, not
    /// swallowed — the orchestrator decides how to degrade.
    fn publish(
        &self,
        record: EventRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;

    /// Subscribe to one or more topics and receive a stream of records.
    ///
    /// Implementations use a named consumer group so independent concerns
    /// (occupancy, notifications) each see every event, while instances of
    /// one concern share the workload.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if the consumer could
    /// not be created or assigned.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>>;
}
