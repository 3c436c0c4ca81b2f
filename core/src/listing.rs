//! Listing management.
//!
//! Same read/write/cache/publish shape as [`crate::booking`], applied to
//! the host's inventory. Lifecycle events for listings feed the same
//! channel; publish failures degrade the same way but are only logged
//! here, since nothing downstream gates on listing events.

use crate::cache::{EntityCache, keys};
use crate::clock::Clock;
use crate::config::BookingConfig;
use crate::error::{Error, Result};
use crate::event::LifecycleEvent;
use crate::event_bus::EventBus;
use crate::model::{Listing, ListingId, NewListing, Role};
use crate::store::RecordStore;
use crate::booking::{evict, publish_with_retry, snapshot_get, snapshot_set, with_deadline};
use std::future::Future;

/// Mutable listing fields for an update.
#[derive(Debug, Clone)]
pub struct ListingUpdate {
    /// New title.
    pub title: String,
    /// New description.
    pub description: String,
    /// New location.
    pub location: String,
    /// New nightly price.
    pub nightly_price: f64,
    /// New availability flag.
    pub available: bool,
}

/// Listing CRUD with write-through caching and lifecycle events.
pub struct ListingService<S, C, B, K> {
    store: S,
    cache: C,
    bus: B,
    clock: K,
    config: BookingConfig,
}

impl<S, C, B, K> ListingService<S, C, B, K>
where
    S: RecordStore,
    C: EntityCache,
    B: EventBus,
    K: Clock,
{
    /// Create a listing service over the given collaborators.
    pub const fn new(store: S, cache: C, bus: B, clock: K, config: BookingConfig) -> Self {
        Self {
            store,
            cache,
            bus,
            clock,
            config,
        }
    }

    /// Publish a new listing for a host.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the host does not exist,
    /// [`Error::InvalidInput`] if the owner is not a host, or
    /// [`Error::Storage`] / [`Error::Timeout`] from the record store.
    pub async fn create_listing(&self, listing: NewListing) -> Result<Listing> {
        let host = self.deadline("host lookup", self.store.user(listing.host_id)).await?;
        if host.role != Role::Host {
            return Err(Error::InvalidInput(format!(
                "user {} is not a host",
                host.id
            )));
        }

        let listing = self
            .deadline("listing insert", self.store.create_listing(listing))
            .await?;
        tracing::info!(listing_id = %listing.id, host_id = %listing.host_id, "listing created");

        snapshot_set(&self.cache, self.config.cache_ttl, &keys::listing(listing.id), &listing)
            .await;
        publish_with_retry(
            &self.bus,
            &self.clock,
            &self.config,
            &LifecycleEvent::ListingCreated {
                listing: listing.clone(),
            },
        )
        .await;

        Ok(listing)
    }

    /// Fetch a listing, read-through the cache.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if absent, or [`Error::Storage`] /
    /// [`Error::Timeout`] from the record store.
    pub async fn get_listing(&self, id: ListingId) -> Result<Listing> {
        let key = keys::listing(id);
        if let Some(cached) = snapshot_get::<_, Listing>(&self.cache, &key).await {
            return Ok(cached);
        }

        let listing = self.deadline("listing lookup", self.store.listing(id)).await?;
        snapshot_set(&self.cache, self.config.cache_ttl, &key, &listing).await;
        Ok(listing)
    }

    /// Replace a listing's mutable fields.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if absent, or [`Error::Storage`] /
    /// [`Error::Timeout`] from the record store.
    pub async fn update_listing(&self, id: ListingId, update: ListingUpdate) -> Result<Listing> {
        let mut listing = self.deadline("listing lookup", self.store.listing(id)).await?;
        listing.title = update.title;
        listing.description = update.description;
        listing.location = update.location;
        listing.nightly_price = update.nightly_price;
        listing.available = update.available;

        let listing = self
            .deadline("listing update", self.store.update_listing(&listing))
            .await?;
        tracing::info!(listing_id = %listing.id, "listing updated");

        snapshot_set(&self.cache, self.config.cache_ttl, &keys::listing(listing.id), &listing)
            .await;
        publish_with_retry(
            &self.bus,
            &self.clock,
            &self.config,
            &LifecycleEvent::ListingUpdated {
                listing: listing.clone(),
            },
        )
        .await;

        Ok(listing)
    }

    /// Remove a listing; its bookings cascade in the store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if absent, or [`Error::Storage`] /
    /// [`Error::Timeout`] from the record store.
    pub async fn delete_listing(&self, id: ListingId) -> Result<()> {
        let listing = self.deadline("listing lookup", self.store.listing(id)).await?;
        self.deadline("listing delete", self.store.delete_listing(id)).await?;
        tracing::info!(listing_id = %id, "listing deleted");

        // Cascaded bookings leave the host's collection stale as well.
        evict(
            &self.cache,
            vec![keys::listing(id), keys::host_bookings(listing.host_id)],
        )
        .await;
        publish_with_retry(
            &self.bus,
            &self.clock,
            &self.config,
            &LifecycleEvent::ListingDeleted { listing_id: id },
        )
        .await;

        Ok(())
    }

    async fn deadline<T>(
        &self,
        what: &'static str,
        fut: impl Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        with_deadline(self.config.op_deadline, what, fut).await
    }
}
