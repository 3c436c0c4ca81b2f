//! # Nestly Testing
//!
//! In-memory doubles for the Nestly trait seams: a record store, a cache
//! (working and deliberately-broken variants), an event bus, and a fixed
//! clock. Deterministic and dependency-free, so the orchestrator and the
//! consumers can be exercised without Postgres, Redis, or Kafka.

pub mod cache;
pub mod clock;
pub mod event_bus;
pub mod store;

pub use cache::{InMemoryCache, UnavailableCache};
pub use clock::FixedClock;
pub use event_bus::{FailingEventBus, InMemoryEventBus};
pub use store::InMemoryRecordStore;
