//! The booking read path: joining ledger entries back to their event and
//! section for display.
//!
//! Booking records reference events and sections by id only, and nothing
//! guarantees those ids still resolve by the time someone lists bookings.
//! The reader therefore treats both lookups as optional: a booking whose
//! event or section has gone missing is still listed, with the missing
//! context part set to `None`.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::instrument;

use crate::errors::StorageResult;
use crate::model::{BookingRecord, Event};
use crate::store::{BookingLedger, InventoryStore};
use crate::types::{EventId, EventName, Price, SectionId, SectionName};

/// The event half of a booking's display context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventSummary {
    /// The event's id.
    pub id: EventId,
    /// The event's display name.
    pub name: EventName,
}

/// The section half of a booking's display context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionSummary {
    /// The section's id.
    pub id: SectionId,
    /// The section's display name.
    pub name: SectionName,
    /// The section's ticket price.
    pub price: Price,
}

/// A booking record together with whatever display context still resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingContext {
    /// The booking itself, always present and intact.
    pub booking: BookingRecord,
    /// The owning event, if it still exists.
    pub event: Option<EventSummary>,
    /// The section within that event, if it still exists.
    pub section: Option<SectionSummary>,
}

/// Joins ledger entries to their event and section for display.
#[derive(Debug)]
pub struct BookingReader<S, L> {
    inventory: Arc<S>,
    ledger: Arc<L>,
}

impl<S, L> Clone for BookingReader<S, L> {
    fn clone(&self) -> Self {
        Self {
            inventory: Arc::clone(&self.inventory),
            ledger: Arc::clone(&self.ledger),
        }
    }
}

impl<S, L> BookingReader<S, L>
where
    S: InventoryStore,
    L: BookingLedger,
{
    /// Creates a reader over the given backends.
    pub const fn new(inventory: Arc<S>, ledger: Arc<L>) -> Self {
        Self { inventory, ledger }
    }

    /// Lists all bookings newest-first, each joined to its event and
    /// section where those still resolve.
    ///
    /// Events are fetched once per distinct event id across the whole
    /// listing, not once per booking, so a ledger full of bookings for the
    /// same event costs a single inventory lookup.
    #[instrument(name = "reader.list_with_context", skip(self))]
    pub async fn list_with_context(&self) -> StorageResult<Vec<BookingContext>> {
        let records = self.ledger.list_all().await?;

        // Per-call memo of resolved events; a miss is memoized too, so a
        // deleted event is also looked up only once.
        let mut resolved: HashMap<EventId, Option<Event>> = HashMap::new();

        let mut contexts = Vec::with_capacity(records.len());
        for booking in records {
            if !resolved.contains_key(&booking.event_id) {
                let fetched = self.inventory.event_by_id(&booking.event_id).await?;
                resolved.insert(booking.event_id, fetched);
            }
            let event = resolved
                .get(&booking.event_id)
                .and_then(Option::as_ref);

            let event_summary = event.map(|e| EventSummary {
                id: e.id,
                name: e.name.clone(),
            });
            let section_summary = event
                .and_then(|e| e.section(&booking.section_id))
                .map(|s| SectionSummary {
                    id: s.id,
                    name: s.name.clone(),
                    price: s.price,
                });

            contexts.push(BookingContext {
                booking,
                event: event_summary,
                section: section_summary,
            });
        }

        Ok(contexts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StorageResult;
    use crate::model::Section;
    use crate::types::{Capacity, TicketQuantity};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Map-backed store that counts event lookups.
    #[derive(Default)]
    struct CountingMapStore {
        events: Mutex<HashMap<EventId, Event>>,
        lookups: AtomicUsize,
    }

    impl CountingMapStore {
        fn insert(&self, event: Event) {
            self.events.lock().unwrap().insert(event.id, event);
        }

        fn lookup_count(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InventoryStore for CountingMapStore {
        async fn insert_event(&self, event: Event) -> StorageResult<()> {
            self.insert(event);
            Ok(())
        }

        async fn event_by_id(&self, event_id: &EventId) -> StorageResult<Option<Event>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.events.lock().unwrap().get(event_id).cloned())
        }

        async fn decrement_remaining(
            &self,
            _event_id: &EventId,
            _section_id: &SectionId,
            _qty: TicketQuantity,
        ) -> StorageResult<Option<Event>> {
            unreachable!("reader never decrements")
        }
    }

    /// Vec-backed ledger listing newest-first by booking id.
    #[derive(Default)]
    struct VecLedger {
        records: Mutex<Vec<BookingRecord>>,
    }

    #[async_trait]
    impl BookingLedger for VecLedger {
        async fn append(&self, record: BookingRecord) -> StorageResult<()> {
            self.records.lock().unwrap().push(record);
            Ok(())
        }

        async fn list_all(&self) -> StorageResult<Vec<BookingRecord>> {
            let mut records = self.records.lock().unwrap().clone();
            records.sort_by(|a, b| b.id.cmp(&a.id));
            Ok(records)
        }
    }

    fn sample_event() -> Event {
        let section = Section::new(
            SectionName::try_new("Floor").unwrap(),
            Price::from_cents(4500).unwrap(),
            Capacity::try_new(100).unwrap(),
        );
        Event::create(EventName::try_new("Concert").unwrap(), vec![section]).unwrap()
    }

    fn reader() -> (
        BookingReader<CountingMapStore, VecLedger>,
        Arc<CountingMapStore>,
        Arc<VecLedger>,
    ) {
        let store = Arc::new(CountingMapStore::default());
        let ledger = Arc::new(VecLedger::default());
        (
            BookingReader::new(Arc::clone(&store), Arc::clone(&ledger)),
            store,
            ledger,
        )
    }

    fn qty(n: u32) -> TicketQuantity {
        TicketQuantity::try_new(n).unwrap()
    }

    #[tokio::test]
    async fn resolves_event_and_section_for_live_references() {
        let (reader, store, ledger) = reader();
        let event = sample_event();
        let section_id = event.sections[0].id;
        store.insert(event.clone());

        ledger
            .append(BookingRecord::new(event.id, section_id, qty(2)))
            .await
            .unwrap();

        let contexts = reader.list_with_context().await.unwrap();
        assert_eq!(contexts.len(), 1);

        let context = &contexts[0];
        assert_eq!(context.event.as_ref().unwrap().id, event.id);
        assert_eq!(context.event.as_ref().unwrap().name, event.name);
        let section = context.section.as_ref().unwrap();
        assert_eq!(section.id, section_id);
        assert_eq!(section.price, Price::from_cents(4500).unwrap());
    }

    #[tokio::test]
    async fn booking_with_missing_event_is_listed_with_null_context() {
        let (reader, _, ledger) = reader();

        // Event was never stored (or has been deleted since)
        let record = BookingRecord::new(EventId::new(), SectionId::new(), qty(1));
        ledger.append(record.clone()).await.unwrap();

        let contexts = reader.list_with_context().await.unwrap();
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].booking.id, record.id);
        assert!(contexts[0].event.is_none());
        assert!(contexts[0].section.is_none());
    }

    #[tokio::test]
    async fn booking_with_missing_section_keeps_event_context() {
        let (reader, store, ledger) = reader();
        let event = sample_event();
        store.insert(event.clone());

        // Section id that is not in the event's section list
        ledger
            .append(BookingRecord::new(event.id, SectionId::new(), qty(1)))
            .await
            .unwrap();

        let contexts = reader.list_with_context().await.unwrap();
        assert_eq!(contexts.len(), 1);
        assert!(contexts[0].event.is_some());
        assert!(contexts[0].section.is_none());
    }

    #[tokio::test]
    async fn bookings_are_listed_newest_first() {
        let (reader, store, ledger) = reader();
        let event = sample_event();
        let section_id = event.sections[0].id;
        store.insert(event.clone());

        let first = BookingRecord::new(event.id, section_id, qty(1));
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = BookingRecord::new(event.id, section_id, qty(2));
        ledger.append(first.clone()).await.unwrap();
        ledger.append(second.clone()).await.unwrap();

        let contexts = reader.list_with_context().await.unwrap();
        assert_eq!(contexts[0].booking.id, second.id);
        assert_eq!(contexts[1].booking.id, first.id);
    }

    #[tokio::test]
    async fn each_distinct_event_is_fetched_once_per_listing() {
        let (reader, store, ledger) = reader();
        let event = sample_event();
        let section_id = event.sections[0].id;
        store.insert(event.clone());
        let ghost_event = EventId::new();

        for _ in 0..5 {
            ledger
                .append(BookingRecord::new(event.id, section_id, qty(1)))
                .await
                .unwrap();
            ledger
                .append(BookingRecord::new(ghost_event, SectionId::new(), qty(1)))
                .await
                .unwrap();
        }

        let contexts = reader.list_with_context().await.unwrap();
        assert_eq!(contexts.len(), 10);
        // One lookup for the live event, one memoized miss for the ghost
        assert_eq!(store.lookup_count(), 2);
    }

    #[tokio::test]
    async fn listing_twice_with_no_writes_returns_the_same_records() {
        let (reader, store, ledger) = reader();
        let event = sample_event();
        let section_id = event.sections[0].id;
        store.insert(event.clone());

        for n in 1..=3 {
            ledger
                .append(BookingRecord::new(event.id, section_id, qty(n)))
                .await
                .unwrap();
        }

        let first = reader.list_with_context().await.unwrap();
        let second = reader.list_with_context().await.unwrap();
        assert_eq!(first, second);
    }
}
