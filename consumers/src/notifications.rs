//! Booking notification emails.

use crate::mailer::Mailer;
use crate::runner::EventHandler;
use nestly_core::error::Result;
use nestly_core::event::{LifecycleEvent, topics};
use nestly_core::model::Booking;
use nestly_core::store::RecordStore;

/// Emails guests and hosts about booking transitions.
///
/// Contact addresses are resolved through the record store at processing
/// time, not carried in the event. Redelivery re-sends the email; that is
/// the accepted cost of at-least-once delivery.
pub struct NotificationDispatcher<S, M> {
    store: S,
    mailer: M,
}

impl<S, M> NotificationDispatcher<S, M>
where
    S: RecordStore,
    M: Mailer,
{
    /// Create the dispatcher over a record store and a mailer.
    pub const fn new(store: S, mailer: M) -> Self {
        Self { store, mailer }
    }

    async fn notify_guest(&self, booking: &Booking, subject: &str, body: String) -> Result<()> {
        let guest = self.store.user(booking.guest_id).await?;
        self.mailer.send(&guest.email, subject, &body).await
    }

    async fn notify_host(&self, booking: &Booking, subject: &str, body: String) -> Result<()> {
        let listing = self.store.listing(booking.listing_id).await?;
        let host = self.store.user(listing.host_id).await?;
        self.mailer.send(&host.email, subject, &body).await
    }
}

impl<S, M> EventHandler for NotificationDispatcher<S, M>
where
    S: RecordStore,
    M: Mailer,
{
    fn name(&self) -> &'static str {
        "booking-notifications"
    }

    fn topics(&self) -> &'static [&'static str] {
        topics::BOOKING_TOPICS
    }

    async fn handle(&self, event: &LifecycleEvent) -> Result<()> {
        match event {
            LifecycleEvent::BookingCreated { booking } => {
                self.notify_guest(
                    booking,
                    "Booking confirmation",
                    format!(
                        "Your booking for listing {} from {} to {} is confirmed.",
                        booking.listing_id, booking.start_date, booking.end_date
                    ),
                )
                .await?;
                tracing::debug!(booking_id = %booking.id, "guest notified of creation");
            }
            LifecycleEvent::BookingCanceled { booking } => {
                self.notify_guest(
                    booking,
                    "Booking cancelled",
                    format!(
                        "Your booking for listing {} from {} to {} has been cancelled.",
                        booking.listing_id, booking.start_date, booking.end_date
                    ),
                )
                .await?;
                self.notify_host(
                    booking,
                    "Booking cancelled",
                    format!(
                        "The booking for your listing {} from {} to {} has been cancelled.",
                        booking.listing_id, booking.start_date, booking.end_date
                    ),
                )
                .await?;
                tracing::debug!(booking_id = %booking.id, "guest and host notified of cancellation");
            }
            _ => {}
        }
        Ok(())
    }
}
