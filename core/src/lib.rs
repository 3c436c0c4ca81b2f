//! # Nestly Core
//!
//! Domain model, trait seams, and orchestration for the Nestly short-term
//! rental marketplace.
//!
//! The center of this crate is the booking consistency pipeline: a
//! reservation request is validated, checked for conflicts against the
//! durable record store, persisted, mirrored into a best-effort read
//! cache, and fanned out as a lifecycle event to asynchronous side-effect
//! consumers.
//!
//! ## Collaborators
//!
//! Three independently-failing collaborators sit behind trait seams so
//! every component is constructed with explicit handles and tests can
//! substitute in-memory doubles:
//!
//! - [`store::RecordStore`] — durable source of truth; the only component
//!   with transactional discipline (it alone enforces the no-overlap
//!   invariant).
//! - [`cache::EntityCache`] — TTL-bounded snapshots; derived, expendable,
//!   never authoritative. Comes in present and absent
//!   ([`cache::NoopCache`]) variants.
//! - [`event_bus::EventBus`] — ordered-per-key, at-least-once
//!   publish/subscribe for [`event::LifecycleEvent`]s.
//!
//! Production implementations live in `nestly-postgres`, `nestly-redis`,
//! and `nestly-kafka`; in-memory doubles in `nestly-testing`.

pub mod availability;
pub mod booking;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod event_bus;
pub mod listing;
pub mod model;
pub mod store;

pub use availability::DateRange;
pub use booking::{
    BookingRequest, BookingService, CancelledBooking, CreatedBooking, EventDispatch,
};
pub use cache::{CacheError, EntityCache, NoopCache};
pub use clock::{Clock, SystemClock};
pub use config::BookingConfig;
pub use error::{Error, Result};
pub use event::{EventRecord, LifecycleEvent};
pub use event_bus::{EventBus, EventBusError, EventStream};
pub use listing::{ListingService, ListingUpdate};
pub use model::{
    Booking, BookingId, BookingStatus, Listing, ListingId, NewBooking, NewListing, NewUser,
    OccupiedRange, Role, User, UserId,
};
pub use store::RecordStore;
