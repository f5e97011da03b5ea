//! In-memory adapter for the `BoxOffice` reservation library
//!
//! This crate provides in-memory implementations of the `InventoryStore`
//! and `BookingLedger` traits from the boxoffice crate, useful for testing
//! and development scenarios where persistence is not required.
//!
//! The atomicity contract of `decrement_remaining` is met by performing the
//! availability check and the mutation under a single write-lock
//! acquisition: no other caller can observe or modify the section's
//! `remaining` between the two.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use boxoffice::errors::StorageResult;
use boxoffice::model::{BookingRecord, Event};
use boxoffice::store::{BookingLedger, InventoryStore};
use boxoffice::types::{EventId, SectionId, TicketQuantity};

/// Thread-safe in-memory inventory store for testing.
#[derive(Clone, Default)]
pub struct InMemoryInventoryStore {
    // Maps event IDs to their events; clones share this map
    events: Arc<RwLock<HashMap<EventId, Event>>>,
}

impl InMemoryInventoryStore {
    /// Create a new empty in-memory inventory store.
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn insert_event(&self, event: Event) -> StorageResult<()> {
        let mut events = self.events.write().expect("RwLock poisoned");

        events.insert(event.id, event);
        Ok(())
    }

    async fn event_by_id(&self, event_id: &EventId) -> StorageResult<Option<Event>> {
        let events = self.events.read().expect("RwLock poisoned");

        Ok(events.get(event_id).cloned())
    }

    async fn decrement_remaining(
        &self,
        event_id: &EventId,
        section_id: &SectionId,
        qty: TicketQuantity,
    ) -> StorageResult<Option<Event>> {
        // Check and mutate under one write lock: this is the critical
        // section that makes the conditional decrement atomic.
        let mut events = self.events.write().expect("RwLock poisoned");

        let Some(event) = events.get_mut(event_id) else {
            return Ok(None);
        };
        let Some(section) = event.sections.iter_mut().find(|s| s.id == *section_id) else {
            return Ok(None);
        };

        let requested = u32::from(qty);
        if section.remaining < requested {
            return Ok(None);
        }

        section.remaining -= requested;
        Ok(Some(event.clone()))
    }
}

/// Thread-safe in-memory booking ledger for testing.
#[derive(Clone, Default)]
pub struct InMemoryBookingLedger {
    // Append-only record list; clones share this list
    records: Arc<RwLock<Vec<BookingRecord>>>,
}

impl InMemoryBookingLedger {
    /// Create a new empty in-memory booking ledger.
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

#[async_trait]
impl BookingLedger for InMemoryBookingLedger {
    async fn append(&self, record: BookingRecord) -> StorageResult<()> {
        let mut records = self.records.write().expect("RwLock poisoned");

        records.push(record);
        Ok(())
    }

    async fn list_all(&self) -> StorageResult<Vec<BookingRecord>> {
        let records = self.records.read().expect("RwLock poisoned");

        let mut snapshot = records.clone();
        // Newest first: creation time, tie-broken by id (UUIDv7 sorts by time)
        snapshot.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(snapshot)
    }
}
