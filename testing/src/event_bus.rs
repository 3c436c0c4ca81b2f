//! In-memory event bus.

use nestly_core::event::EventRecord;
use nestly_core::event_bus::{EventBus, EventBusError, EventStream};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

struct Subscriber {
    topics: Vec<String>,
    tx: mpsc::UnboundedSender<Result<EventRecord, EventBusError>>,
}

#[derive(Default)]
struct BusState {
    published: Vec<EventRecord>,
    subscribers: Vec<Subscriber>,
}

/// In-memory [`EventBus`]: records every publish and forwards to live
/// subscriptions whose topic set matches.
#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    inner: Arc<Mutex<BusState>>,
}

impl InMemoryEventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record published so far, in order.
    #[must_use]
    pub fn published(&self) -> Vec<EventRecord> {
        self.inner
            .lock()
            .map(|state| state.published.clone())
            .unwrap_or_default()
    }

    /// Records published to one topic, in order.
    #[must_use]
    pub fn published_to(&self, topic: &str) -> Vec<EventRecord> {
        self.published()
            .into_iter()
            .filter(|record| record.topic == topic)
            .collect()
    }

    /// Number of live subscriptions, so tests can wait for a consumer to
    /// attach before publishing.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .map(|state| state.subscribers.len())
            .unwrap_or(0)
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(
        &self,
        record: EventRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let mut state = inner
                .lock()
                .map_err(|_| EventBusError::Transport("bus lock poisoned".to_string()))?;
            state.published.push(record.clone());
            // Forward to matching subscribers, discarding closed ones.
            state.subscribers.retain(|sub| {
                if sub.topics.iter().any(|t| *t == record.topic) {
                    sub.tx.send(Ok(record.clone())).is_ok()
                } else {
                    !sub.tx.is_closed()
                }
            });
            Ok(())
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|t| (*t).to_string()).collect();
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            let (tx, rx) = mpsc::unbounded_channel();
            inner
                .lock()
                .map_err(|_| EventBusError::SubscriptionFailed {
                    topics: topics.clone(),
                    reason: "bus lock poisoned".to_string(),
                })?
                .subscribers
                .push(Subscriber { topics, tx });

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

/// Bus whose publishes always fail, for exercising degraded success.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingEventBus;

impl FailingEventBus {
    /// Create the always-failing bus.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EventBus for FailingEventBus {
    fn publish(
        &self,
        record: EventRecord,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        Box::pin(async move {
            Err(EventBusError::PublishFailed {
                topic: record.topic,
                reason: "broker unreachable".to_string(),
            })
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|t| (*t).to_string()).collect();
        Box::pin(async move {
            Err(EventBusError::SubscriptionFailed {
                topics,
                reason: "broker unreachable".to_string(),
            })
        })
    }
}
