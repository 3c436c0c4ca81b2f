//! Consumer run loop.

use nestly_core::error::Result;
use nestly_core::event::LifecycleEvent;
use nestly_core::event_bus::{EventBus, EventBusError};
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// A side-effect concern driven by lifecycle events.
pub trait EventHandler: Send + Sync {
    /// Name used in logs and for the consumer group.
    fn name(&self) -> &'static str;

    /// Topics this concern subscribes to.
    fn topics(&self) -> &'static [&'static str];

    /// Apply one event. Must be idempotent: the channel redelivers.
    ///
    /// # Errors
    ///
    /// Errors are logged by the runner and the loop continues; they never
    /// stop consumption.
    fn handle(&self, event: &LifecycleEvent) -> impl Future<Output = Result<()>> + Send;
}

/// Drives one [`EventHandler`] from an event bus subscription until a
/// shutdown signal arrives.
pub struct ConsumerRunner<H> {
    handler: H,
    bus: Arc<dyn EventBus>,
    shutdown: watch::Receiver<bool>,
}

impl<H> ConsumerRunner<H>
where
    H: EventHandler,
{
    /// Create a runner and its shutdown handle. Send `true` through the
    /// returned sender to stop the loop after the in-flight message.
    #[must_use]
    pub fn new(handler: H, bus: Arc<dyn EventBus>) -> (Self, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        (
            Self {
                handler,
                bus,
                shutdown: shutdown_rx,
            },
            shutdown_tx,
        )
    }

    /// Subscribe and process events until shutdown.
    ///
    /// Malformed payloads and handler failures are logged and skipped;
    /// only a failed subscription ends the loop with an error.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if the subscription
    /// could not be established.
    pub async fn run(&mut self) -> std::result::Result<(), EventBusError> {
        let name = self.handler.name();
        let topics = self.handler.topics();
        tracing::info!(consumer = name, topics = ?topics, "starting consumer");

        let mut stream = self.bus.subscribe(topics).await?;

        while !*self.shutdown.borrow() {
            tokio::select! {
                next = stream.next() => {
                    let Some(result) = next else {
                        tracing::info!(consumer = name, "event stream ended");
                        break;
                    };
                    match result {
                        Ok(record) => match record.decode() {
                            Ok(event) => {
                                if let Err(e) = self.handler.handle(&event).await {
                                    metrics::counter!("nestly_consumer_failures_total")
                                        .increment(1);
                                    tracing::error!(
                                        consumer = name,
                                        topic = %record.topic,
                                        key = %record.key,
                                        error = %e,
                                        "event processing failed, skipping message"
                                    );
                                }
                            }
                            Err(e) => {
                                tracing::error!(
                                    consumer = name,
                                    topic = %record.topic,
                                    key = %record.key,
                                    error = %e,
                                    "undecodable event payload, skipping message"
                                );
                            }
                        },
                        Err(e) => {
                            tracing::error!(
                                consumer = name,
                                error = %e,
                                "error receiving from event channel"
                            );
                        }
                    }
                }
                _ = self.shutdown.changed() => {
                    if *self.shutdown.borrow() {
                        tracing::info!(consumer = name, "shutdown signal received");
                        break;
                    }
                }
            }
        }

        tracing::info!(consumer = name, "consumer stopped");
        Ok(())
    }
}
