//! Error types for `BoxOffice`.
//!
//! This module provides error types for all failure scenarios in the
//! reservation system. The error design follows these principles:
//!
//! - **Rich error information**: Include context to help diagnose issues
//! - **Type safety**: Different error types for different subsystems
//! - **Actionable**: Callers can determine how to handle each error
//! - **Composable**: Errors can be converted between layers
//!
//! # Error Categories
//!
//! - **`StorageError`**: Persistence layer failures, always transient from
//!   the caller's point of view
//! - **`ReserveError`**: Outcomes of a single `reserve` call
//! - **`CreateEventError`** / **`GetEventError`**: Catalog operation failures
//!
//! All failures are local to a single call; there is no process-wide error
//! state to reset.

use crate::model::BookingRecord;
use crate::types::{EventId, SectionId, TicketQuantity};
use thiserror::Error;

/// Errors that can occur when interacting with a storage backend.
///
/// `StorageError` represents failures at the persistence layer:
/// infrastructure problems, not business outcomes. A predicate that matches
/// nothing (unknown event, insufficient tickets) is *not* a storage error;
/// stores report that through their return values.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The storage backend is temporarily unreachable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be serialized or deserialized.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An unexpected internal error occurred.
    #[error("internal storage error: {0}")]
    Internal(String),
}

/// Result type for storage backend operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during a `reserve` call.
///
/// # Error Handling Strategy
///
/// - **`InvalidRequest`**: safe to retry after correcting the input; no
///   storage access was attempted
/// - **`InsufficientInventory`**: terminal for this attempt; the client may
///   retry with a smaller quantity or a different section
/// - **`Storage`**: transient; safe to retry the whole call, since the
///   decrement did not happen
/// - **`ReceiptLost`**: the one partial-failure hazard — see the variant
///   docs before treating it as retryable
#[derive(Debug, Error)]
pub enum ReserveError {
    /// The request was malformed (missing or invalid fields). Caught before
    /// any storage access.
    #[error("invalid reservation request: {0}")]
    InvalidRequest(String),

    /// The storage predicate matched nothing: either the event/section does
    /// not exist, or not enough tickets remain.
    ///
    /// The two causes are deliberately not distinguished. Telling them
    /// apart would require a second read that could race with concurrent
    /// reservations, so the engine reports both uniformly as a conflict.
    #[error(
        "not enough tickets available (or unknown event/section): event {event_id}, section {section_id}, requested {requested}"
    )]
    InsufficientInventory {
        /// The event the reservation targeted.
        event_id: EventId,
        /// The section the reservation targeted.
        section_id: SectionId,
        /// The quantity that could not be satisfied.
        requested: TicketQuantity,
    },

    /// The storage backend failed during the decrement step. No partial
    /// state was committed; the call is safe to retry.
    #[error("storage error during reservation: {0}")]
    Storage(#[from] StorageError),

    /// The inventory decrement committed, but the ledger append then
    /// failed.
    ///
    /// Tickets have been consumed with no receipt on record. The decrement
    /// is not rolled back. The fully-built record that failed to append is
    /// carried here so a caller or compensating process can reconcile.
    /// Blindly retrying the whole `reserve` call would consume inventory a
    /// second time.
    #[error("reservation committed but ledger append failed: {source}")]
    ReceiptLost {
        /// The booking record that was never durably appended.
        record: BookingRecord,
        /// The underlying storage failure.
        source: StorageError,
    },
}

/// Result type for reservation operations.
pub type ReserveResult<T> = Result<T, ReserveError>;

/// Errors that can occur when creating an event.
#[derive(Debug, Error)]
pub enum CreateEventError {
    /// The request was malformed; nothing was persisted.
    #[error("invalid event: {0}")]
    InvalidRequest(String),

    /// The storage backend failed while persisting the event.
    #[error("storage error while creating event: {0}")]
    Storage(#[from] StorageError),
}

/// Errors that can occur when fetching an event by id.
#[derive(Debug, Error)]
pub enum GetEventError {
    /// No event exists with the given id.
    #[error("event {0} not found")]
    NotFound(EventId),

    /// The storage backend failed during the lookup.
    #[error("storage error while fetching event: {0}")]
    Storage(#[from] StorageError),
}
