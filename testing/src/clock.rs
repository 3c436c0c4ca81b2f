//! Fixed clock for deterministic tests.

use chrono::{DateTime, TimeZone, Utc};
use nestly_core::Clock;

/// Clock that always returns the same instant, so date validation is
/// reproducible.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    time: DateTime<Utc>,
}

impl FixedClock {
    /// Create a fixed clock at the given instant.
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self { time }
    }

    /// A fixed clock at 2025-01-01T00:00:00Z, comfortably before the
    /// reservation dates used throughout the tests.
    ///
    /// # Panics
    ///
    /// Never in practice; the hardcoded timestamp is valid.
    #[must_use]
    #[allow(clippy::unwrap_used)]
    pub fn start_of_2025() -> Self {
        Self::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().unwrap())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.time
    }
}
