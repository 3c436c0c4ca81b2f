//! Orchestrator configuration.

use std::time::Duration;

/// Tunables for the booking and listing services.
///
/// Values are provided by the process entry point, not read from the
/// environment here.
#[derive(Debug, Clone)]
pub struct BookingConfig {
    /// Expiry applied to every cache entry.
    ///
    /// Default: 24 hours.
    pub cache_ttl: Duration,

    /// Deadline applied to each store and event-channel call; exceeding it
    /// fails the call with a `Timeout` instead of hanging.
    ///
    /// Default: 5 seconds.
    pub op_deadline: Duration,

    /// Total publish attempts before reporting the event as pending.
    ///
    /// Default: 3.
    pub publish_attempts: u32,

    /// Base delay between publish attempts; doubles each retry.
    ///
    /// Default: 100 milliseconds.
    pub publish_backoff: Duration,
}

impl BookingConfig {
    /// Set the cache entry expiry.
    #[must_use]
    pub const fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the per-call operation deadline.
    #[must_use]
    pub const fn with_op_deadline(mut self, deadline: Duration) -> Self {
        self.op_deadline = deadline;
        self
    }

    /// Set the publish retry bounds.
    #[must_use]
    pub const fn with_publish_retry(mut self, attempts: u32, backoff: Duration) -> Self {
        self.publish_attempts = attempts;
        self.publish_backoff = backoff;
        self
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(24 * 60 * 60),
            op_deadline: Duration::from_secs(5),
            publish_attempts: 3,
            publish_backoff: Duration::from_millis(100),
        }
    }
}
