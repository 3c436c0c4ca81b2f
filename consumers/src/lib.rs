//! # Nestly Consumers
//!
//! Side-effect consumers for booking lifecycle events. Each concern runs
//! as its own consumer group, pulling events in a long-lived loop that is
//! decoupled from request latency:
//!
//! - [`OccupancyMaterializer`] keeps the occupied-date-range table in step
//!   with booking creations and cancellations;
//! - [`NotificationDispatcher`] emails guests and hosts about those same
//!   transitions.
//!
//! Delivery is at-least-once, so both handlers are idempotent: occupancy
//! writes are keyed by booking id under a uniqueness constraint, and a
//! re-sent email is accepted as the cost of never losing one. A failure on
//! one message is logged and the loop continues; it never halts the
//! consumer.

pub mod mailer;
pub mod notifications;
pub mod occupancy;
pub mod runner;

pub use mailer::{ConsoleMailer, Mailer, SmtpMailer};
pub use notifications::NotificationDispatcher;
pub use occupancy::OccupancyMaterializer;
pub use runner::{ConsumerRunner, EventHandler};
