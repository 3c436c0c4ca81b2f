//! Error types for booking and listing operations.

use thiserror::Error;

/// Result type alias for marketplace operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the booking pipeline.
///
/// Validation failures are rejected before any store access; dependency
/// failures distinguish the durable store (fatal for the operation) from
/// the cache and event channel (degraded, see [`crate::booking`]).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Request failed validation before reaching any store.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced user, listing, or booking does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind ("user", "listing", "booking").
        entity: &'static str,
        /// The identifier that failed to resolve.
        id: i64,
    },

    /// The requested dates overlap an existing pending or confirmed booking.
    #[error("listing is not available for the requested dates")]
    Conflict,

    /// The booking was already cancelled by an earlier request.
    #[error("booking is already cancelled")]
    AlreadyCancelled,

    /// A non-authoritative dependency (cache, event channel) failed.
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// The record store failed; the operation was aborted.
    #[error("storage error: {0}")]
    Storage(String),

    /// Entity or event (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An I/O call exceeded the operation deadline.
    #[error("operation timed out during {0}")]
    Timeout(&'static str),
}

impl Error {
    /// Shorthand for a [`Error::NotFound`] with the given entity kind.
    #[must_use]
    pub const fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }
}
