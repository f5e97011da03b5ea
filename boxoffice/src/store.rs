//! Storage port traits for the `BoxOffice` reservation library.
//!
//! This module defines the two backend-independent port interfaces:
//! [`InventoryStore`] for events and their live section counters, and
//! [`BookingLedger`] for the append-only record of successful reservations.
//! Adapters (in-memory, `PostgreSQL`) implement both.
//!
//! The inventory store's [`decrement_remaining`](InventoryStore::decrement_remaining)
//! is the single concurrency-critical operation in the whole system. Every
//! other operation is a plain read or an append.

use async_trait::async_trait;

use crate::errors::StorageResult;
use crate::model::{BookingRecord, Event};
use crate::types::{EventId, SectionId, TicketQuantity};

/// Durable storage of events, the single source of truth for availability.
///
/// Implementations own the atomicity guarantee: `decrement_remaining` must
/// make its availability check and its mutation indivisible from the
/// perspective of every concurrent caller, using the storage layer's own
/// concurrency control (a lock-scoped critical section, a conditional
/// `UPDATE`, a compare-and-swap). An engine-local lock is not an acceptable
/// implementation, because multiple engine processes may share one store.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Persists a new event together with its full section list, atomically.
    ///
    /// The event either exists with all its sections afterwards, or not at
    /// all.
    async fn insert_event(&self, event: Event) -> StorageResult<()>;

    /// Fetches an event by id, or `None` if no such event exists.
    async fn event_by_id(&self, event_id: &EventId) -> StorageResult<Option<Event>>;

    /// Atomically checks availability and decrements a section's remaining
    /// count.
    ///
    /// In one indivisible step: locate the event matching `event_id` that
    /// contains a section matching `section_id` with `remaining >= qty`,
    /// and if (and only if) that combined predicate holds, decrement that
    /// section's `remaining` by `qty`.
    ///
    /// # Returns
    /// * `Ok(Some(event))` - the predicate held and the decrement was
    ///   applied; `event` is the post-decrement state
    /// * `Ok(None)` - the predicate matched nothing. Deliberately ambiguous
    ///   between "no such event/section" and "insufficient remaining";
    ///   distinguishing them would take a second, racy read
    ///
    /// # Errors
    /// Returns a [`StorageError`](crate::errors::StorageError) only for
    /// infrastructure failures, in which case no decrement happened.
    async fn decrement_remaining(
        &self,
        event_id: &EventId,
        section_id: &SectionId,
        qty: TicketQuantity,
    ) -> StorageResult<Option<Event>>;
}

/// Append-only store of booking records.
///
/// Records are never updated or deleted; there is no uniqueness constraint
/// beyond the generated `BookingId`.
#[async_trait]
pub trait BookingLedger: Send + Sync {
    /// Durably appends a booking record.
    async fn append(&self, record: BookingRecord) -> StorageResult<()>;

    /// Returns all booking records, newest first.
    ///
    /// Each call re-queries the ledger; the result is a snapshot, not a
    /// live view.
    async fn list_all(&self) -> StorageResult<Vec<BookingRecord>>;
}
