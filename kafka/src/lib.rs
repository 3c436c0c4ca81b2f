//! Kafka event channel for Nestly.
//!
//! Implements the [`EventBus`] seam over rdkafka. Works against Apache
//! Kafka, Redpanda, or any Kafka-compatible broker.
//!
//! # Delivery semantics
//!
//! **At-least-once** with manual offset commits:
//! - Lifecycle events are persisted to the record store *before* they are
//!   published here; the channel only distributes them.
//! - Messages are partitioned by the business key (booking id, listing
//!   id), so all events for one entity stay ordered. No ordering holds
//!   across entities.
//! - Offsets are committed only after a message has been handed to the
//!   subscriber's channel; a crash before commit redelivers. Consumers
//!   must be idempotent.
//!
//! # Example
//!
//! ```no_run
//! use nestly_kafka::KafkaEventBus;
//!
//! # fn example() -> Result<(), nestly_core::EventBusError> {
//! let bus = KafkaEventBus::builder()
//!     .brokers("localhost:9092")
//!     .consumer_group("booking-occupancy")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use nestly_core::event::EventRecord;
use nestly_core::event_bus::{EventBus, EventBusError, EventStream};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Kafka-backed [`EventBus`].
///
/// Holds a shared producer; each subscription creates its own
/// `StreamConsumer` in the configured consumer group.
pub struct KafkaEventBus {
    producer: FutureProducer,
    brokers: String,
    timeout: Duration,
    consumer_group: Option<String>,
    buffer_size: usize,
    auto_offset_reset: String,
}

impl KafkaEventBus {
    /// Connect with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if the producer cannot
    /// be created.
    pub fn new(brokers: &str) -> Result<Self, EventBusError> {
        Self::builder().brokers(brokers).build()
    }

    /// Start configuring a bus.
    #[must_use]
    pub fn builder() -> KafkaEventBusBuilder {
        KafkaEventBusBuilder::default()
    }

    /// Broker addresses this bus talks to.
    #[must_use]
    pub fn brokers(&self) -> &str {
        &self.brokers
    }
}

/// Builder for [`KafkaEventBus`].
#[derive(Default)]
pub struct KafkaEventBusBuilder {
    brokers: Option<String>,
    producer_acks: Option<String>,
    timeout: Option<Duration>,
    consumer_group: Option<String>,
    buffer_size: Option<usize>,
    auto_offset_reset: Option<String>,
}

impl KafkaEventBusBuilder {
    /// Comma-separated broker addresses (e.g. "localhost:9092").
    #[must_use]
    pub fn brokers(mut self, brokers: impl Into<String>) -> Self {
        self.brokers = Some(brokers.into());
        self
    }

    /// Producer acknowledgment mode: "0", "1", or "all". Default "1".
    #[must_use]
    pub fn producer_acks(mut self, acks: impl Into<String>) -> Self {
        self.producer_acks = Some(acks.into());
        self
    }

    /// Producer send timeout. Default 5 seconds.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Consumer group for subscriptions. Each side-effect concern uses its
    /// own group ("booking-occupancy", "booking-notifications") so every
    /// concern sees every event while instances of one concern share the
    /// workload. Auto-generated from the topic set if unset.
    #[must_use]
    pub fn consumer_group(mut self, consumer_group: impl Into<String>) -> Self {
        self.consumer_group = Some(consumer_group.into());
        self
    }

    /// In-process buffer between the Kafka consumer and the subscriber.
    /// Default 1000. Must be nonzero.
    #[must_use]
    pub const fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size);
        self
    }

    /// Where a new consumer group starts reading: "earliest" or "latest".
    /// Default "latest".
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: impl Into<String>) -> Self {
        self.auto_offset_reset = Some(policy.into());
        self
    }

    /// Build the bus.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::ConnectionFailed`] if brokers are missing,
    /// the buffer size is zero, or the producer cannot be created.
    pub fn build(self) -> Result<KafkaEventBus, EventBusError> {
        let brokers = self
            .brokers
            .ok_or_else(|| EventBusError::ConnectionFailed("brokers not configured".to_string()))?;
        let buffer_size = self.buffer_size.unwrap_or(1000);
        if buffer_size == 0 {
            return Err(EventBusError::ConnectionFailed(
                "buffer_size must be greater than 0".to_string(),
            ));
        }

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", self.producer_acks.as_deref().unwrap_or("1"))
            .create()
            .map_err(|e| {
                EventBusError::ConnectionFailed(format!("failed to create producer: {e}"))
            })?;

        tracing::info!(
            brokers = %brokers,
            consumer_group = self.consumer_group.as_deref().unwrap_or("<auto>"),
            buffer_size = buffer_size,
            "Kafka event bus created"
        );

        Ok(KafkaEventBus {
            producer,
            brokers,
            timeout: self.timeout.unwrap_or(Duration::from_secs(5)),
            consumer_group: self.consumer_group,
            buffer_size,
            auto_offset_reset: self.auto_offset_reset.unwrap_or_else(|| "latest".to_string()),
        })
    }
}

fn message_timestamp(message: &rdkafka::message::BorrowedMessage<'_>) -> DateTime<Utc> {
    message
        .timestamp()
        .to_millis()
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_else(Utc::now)
}

impl EventBus for KafkaEventBus {
    fn publish(
        &self,
        record: EventRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let timeout = self.timeout;

        Box::pin(async move {
            let kafka_record = FutureRecord::to(&record.topic)
                .payload(&record.payload)
                .key(record.key.as_bytes())
                .timestamp(record.timestamp.timestamp_millis());

            match self.producer.send(kafka_record, Timeout::After(timeout)).await {
                Ok((partition, offset)) => {
                    tracing::debug!(
                        topic = %record.topic,
                        key = %record.key,
                        partition = partition,
                        offset = offset,
                        "event published"
                    );
                    Ok(())
                }
                Err((kafka_error, _)) => {
                    tracing::error!(
                        topic = %record.topic,
                        key = %record.key,
                        error = %kafka_error,
                        "event publish failed"
                    );
                    Err(EventBusError::PublishFailed {
                        topic: record.topic,
                        reason: kafka_error.to_string(),
                    })
                }
            }
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|s| (*s).to_string()).collect();
        let brokers = self.brokers.clone();
        let consumer_group = self.consumer_group.clone();
        let buffer_size = self.buffer_size;
        let auto_offset_reset = self.auto_offset_reset.clone();

        Box::pin(async move {
            let consumer_group_id = consumer_group.unwrap_or_else(|| {
                let mut sorted = topics.clone();
                sorted.sort();
                format!("nestly-{}", sorted.join("-"))
            });

            // Manual commits give at-least-once delivery.
            let consumer: StreamConsumer = ClientConfig::new()
                .set("bootstrap.servers", &brokers)
                .set("group.id", &consumer_group_id)
                .set("enable.auto.commit", "false")
                .set("auto.offset.reset", &auto_offset_reset)
                .set("session.timeout.ms", "6000")
                .set("enable.partition.eof", "false")
                .create()
                .map_err(|e| EventBusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("failed to create consumer: {e}"),
                })?;

            let topic_refs: Vec<&str> = topics.iter().map(String::as_str).collect();
            consumer
                .subscribe(&topic_refs)
                .map_err(|e| EventBusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: format!("failed to subscribe: {e}"),
                })?;

            tracing::info!(
                topics = ?topics,
                consumer_group = %consumer_group_id,
                auto_offset_reset = %auto_offset_reset,
                "subscribed to topics"
            );

            let (tx, rx) = tokio::sync::mpsc::channel(buffer_size);

            // The spawned task owns the consumer and forwards records.
            tokio::spawn(async move {
                use futures::StreamExt;
                use rdkafka::consumer::CommitMode;

                let mut stream = consumer.stream();

                while let Some(message_result) = stream.next().await {
                    match message_result {
                        Ok(message) => {
                            let record = match message.payload() {
                                Some(payload) => Ok(EventRecord {
                                    topic: message.topic().to_string(),
                                    key: message
                                        .key()
                                        .map(|k| String::from_utf8_lossy(k).into_owned())
                                        .unwrap_or_default(),
                                    payload: payload.to_vec(),
                                    timestamp: message_timestamp(&message),
                                }),
                                None => Err(EventBusError::MalformedMessage(
                                    "message has no payload".to_string(),
                                )),
                            };

                            // Commit only after the record reaches the
                            // subscriber's channel; a crash before commit
                            // redelivers.
                            if tx.send(record).await.is_err() {
                                tracing::debug!("subscriber dropped, stopping consumer task");
                                break;
                            }
                            if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                                tracing::warn!(
                                    topic = message.topic(),
                                    partition = message.partition(),
                                    offset = message.offset(),
                                    error = %e,
                                    "offset commit failed, message may be redelivered"
                                );
                            }
                        }
                        Err(e) => {
                            let err =
                                EventBusError::Transport(format!("failed to receive message: {e}"));
                            if tx.send(Err(err)).await.is_err() {
                                break;
                            }
                        }
                    }
                }

                tracing::debug!("consumer task exiting");
            });

            let stream = async_stream::stream! {
                let mut rx = rx;
                while let Some(result) = rx.recv().await {
                    yield result;
                }
            };

            Ok(Box::pin(stream) as EventStream)
        })
    }
}
