//! The reservation engine: the atomic "check availability and decrement"
//! path that concurrent booking requests race against.
//!
//! The engine itself holds no mutable state and takes no locks. Its job is
//! to validate raw input before storage is touched, issue exactly one call
//! to the store's atomic conditional decrement, and append the booking
//! receipt on success. All cross-request coordination lives inside the
//! [`InventoryStore`] implementation.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::errors::{ReserveError, ReserveResult};
use crate::model::BookingRecord;
use crate::store::{BookingLedger, InventoryStore};
use crate::types::{EventId, SectionId, TicketQuantity};

/// A raw reservation request as it arrives from the transport layer.
///
/// The transport layer is responsible for shape (field presence and JSON
/// types); everything domain-level — id format, positive quantity — is
/// validated here, before any storage access.
#[derive(Debug, Clone, Deserialize)]
pub struct ReserveRequest {
    /// The target event id, as a string.
    pub event_id: String,
    /// The target section id, as a string.
    pub section_id: String,
    /// The number of tickets requested.
    pub qty: i64,
}

/// A fully validated reservation command.
///
/// Existence of a value of this type means the request was well-formed;
/// whether the tickets are actually available is decided by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveCommand {
    /// The target event.
    pub event_id: EventId,
    /// The target section within the event.
    pub section_id: SectionId,
    /// How many tickets to reserve. At least 1.
    pub qty: TicketQuantity,
}

impl TryFrom<ReserveRequest> for ReserveCommand {
    type Error = ReserveError;

    fn try_from(request: ReserveRequest) -> Result<Self, Self::Error> {
        let qty = u32::try_from(request.qty)
            .ok()
            .and_then(|q| TicketQuantity::try_new(q).ok())
            .ok_or_else(|| {
                ReserveError::InvalidRequest(format!("qty must be >= 1, got {}", request.qty))
            })?;

        let event_id = parse_id(&request.event_id, EventId::try_new)
            .ok_or_else(|| invalid_id("event_id", &request.event_id))?;
        let section_id = parse_id(&request.section_id, SectionId::try_new)
            .ok_or_else(|| invalid_id("section_id", &request.section_id))?;

        Ok(Self {
            event_id,
            section_id,
            qty,
        })
    }
}

fn parse_id<T, E>(raw: &str, construct: impl FnOnce(Uuid) -> Result<T, E>) -> Option<T> {
    raw.trim().parse::<Uuid>().ok().and_then(|u| construct(u).ok())
}

fn invalid_id(field: &str, raw: &str) -> ReserveError {
    ReserveError::InvalidRequest(format!("{field} is not a valid id: {raw:?}"))
}

/// Executes reservations against an inventory store and a booking ledger.
///
/// Cheap to clone; clones share the same backends.
#[derive(Debug)]
pub struct ReservationEngine<S, L> {
    inventory: Arc<S>,
    ledger: Arc<L>,
}

impl<S, L> Clone for ReservationEngine<S, L> {
    fn clone(&self) -> Self {
        Self {
            inventory: Arc::clone(&self.inventory),
            ledger: Arc::clone(&self.ledger),
        }
    }
}

impl<S, L> ReservationEngine<S, L>
where
    S: InventoryStore,
    L: BookingLedger,
{
    /// Creates an engine over the given backends.
    pub const fn new(inventory: Arc<S>, ledger: Arc<L>) -> Self {
        Self { inventory, ledger }
    }

    /// Reserves tickets from a raw request.
    ///
    /// Validates the request, then delegates to [`reserve_command`](Self::reserve_command).
    /// Validation failures return [`ReserveError::InvalidRequest`] without
    /// touching storage.
    pub async fn reserve(&self, request: ReserveRequest) -> ReserveResult<BookingRecord> {
        let command = ReserveCommand::try_from(request)?;
        self.reserve_command(command).await
    }

    /// Reserves tickets from an already-validated command.
    ///
    /// Exactly one durable side effect on the inventory (the conditional
    /// decrement) and, on success, exactly one ledger append. A rejected
    /// call leaves no trace in either store.
    #[instrument(name = "engine.reserve", skip(self))]
    pub async fn reserve_command(&self, command: ReserveCommand) -> ReserveResult<BookingRecord> {
        let ReserveCommand {
            event_id,
            section_id,
            qty,
        } = command;

        // The one concurrency-critical step. Check and mutation are a
        // single atomic operation inside the store; no remaining value is
        // read here that another caller could have invalidated.
        let updated = self
            .inventory
            .decrement_remaining(&event_id, &section_id, qty)
            .await?;

        if updated.is_none() {
            warn!(
                event_id = %event_id,
                section_id = %section_id,
                qty = %qty,
                "reservation rejected: predicate matched nothing"
            );
            return Err(ReserveError::InsufficientInventory {
                event_id,
                section_id,
                requested: qty,
            });
        }

        let record = BookingRecord::new(event_id, section_id, qty);
        match self.ledger.append(record.clone()).await {
            Ok(()) => Ok(record),
            Err(source) => {
                // The decrement is already committed and is not rolled
                // back: inventory is consumed with no receipt on record.
                tracing::error!(
                    booking_id = %record.id,
                    error = %source,
                    "ledger append failed after committed decrement"
                );
                Err(ReserveError::ReceiptLost { record, source })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{StorageError, StorageResult};
    use crate::model::{Event, Section};
    use crate::types::{Capacity, EventName, Price, SectionName};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn sample_event() -> Event {
        let section = Section::new(
            SectionName::try_new("Floor").unwrap(),
            Price::from_cents(4500).unwrap(),
            Capacity::try_new(5).unwrap(),
        );
        Event::create(EventName::try_new("Concert").unwrap(), vec![section]).unwrap()
    }

    /// What the fake store should answer to a decrement call.
    enum DecrementBehavior {
        Applied(Box<Event>),
        PredicateFalse,
        Fail,
    }

    /// Inventory store fake that records how often the decrement primitive
    /// was invoked.
    struct CountingStore {
        behavior: DecrementBehavior,
        decrement_calls: AtomicUsize,
    }

    impl CountingStore {
        fn new(behavior: DecrementBehavior) -> Self {
            Self {
                behavior,
                decrement_calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.decrement_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InventoryStore for CountingStore {
        async fn insert_event(&self, _event: Event) -> StorageResult<()> {
            Ok(())
        }

        async fn event_by_id(&self, _event_id: &EventId) -> StorageResult<Option<Event>> {
            Ok(None)
        }

        async fn decrement_remaining(
            &self,
            _event_id: &EventId,
            _section_id: &SectionId,
            _qty: TicketQuantity,
        ) -> StorageResult<Option<Event>> {
            self.decrement_calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                DecrementBehavior::Applied(event) => Ok(Some((**event).clone())),
                DecrementBehavior::PredicateFalse => Ok(None),
                DecrementBehavior::Fail => {
                    Err(StorageError::Unavailable("inventory down".into()))
                }
            }
        }
    }

    /// Ledger fake that stores appends in memory, or fails every append.
    struct FakeLedger {
        records: Mutex<Vec<BookingRecord>>,
        fail_appends: bool,
    }

    impl FakeLedger {
        fn new() -> Self {
            Self {
                records: Mutex::new(Vec::new()),
                fail_appends: false,
            }
        }

        fn failing() -> Self {
            Self {
                records: Mutex::new(Vec::new()),
                fail_appends: true,
            }
        }

        fn appended(&self) -> Vec<BookingRecord> {
            self.records.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BookingLedger for FakeLedger {
        async fn append(&self, record: BookingRecord) -> StorageResult<()> {
            if self.fail_appends {
                return Err(StorageError::Unavailable("ledger down".into()));
            }
            self.records.lock().unwrap().push(record);
            Ok(())
        }

        async fn list_all(&self) -> StorageResult<Vec<BookingRecord>> {
            let mut records = self.appended();
            records.reverse();
            Ok(records)
        }
    }

    fn engine(
        behavior: DecrementBehavior,
        ledger: FakeLedger,
    ) -> (
        ReservationEngine<CountingStore, FakeLedger>,
        Arc<CountingStore>,
        Arc<FakeLedger>,
    ) {
        let store = Arc::new(CountingStore::new(behavior));
        let ledger = Arc::new(ledger);
        (
            ReservationEngine::new(Arc::clone(&store), Arc::clone(&ledger)),
            store,
            ledger,
        )
    }

    fn raw_request(qty: i64) -> ReserveRequest {
        ReserveRequest {
            event_id: EventId::new().to_string(),
            section_id: SectionId::new().to_string(),
            qty,
        }
    }

    #[tokio::test]
    async fn zero_qty_is_rejected_without_storage_access() {
        let (engine, store, ledger) =
            engine(DecrementBehavior::PredicateFalse, FakeLedger::new());

        let result = engine.reserve(raw_request(0)).await;

        assert!(matches!(result, Err(ReserveError::InvalidRequest(_))));
        assert_eq!(store.calls(), 0);
        assert!(ledger.appended().is_empty());
    }

    #[tokio::test]
    async fn negative_qty_is_rejected_without_storage_access() {
        let (engine, store, _) = engine(DecrementBehavior::PredicateFalse, FakeLedger::new());

        let result = engine.reserve(raw_request(-3)).await;

        assert!(matches!(result, Err(ReserveError::InvalidRequest(_))));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn malformed_event_id_is_rejected_without_storage_access() {
        let (engine, store, _) = engine(DecrementBehavior::PredicateFalse, FakeLedger::new());

        let request = ReserveRequest {
            event_id: "not-a-uuid".to_string(),
            section_id: SectionId::new().to_string(),
            qty: 1,
        };
        let result = engine.reserve(request).await;

        assert!(matches!(result, Err(ReserveError::InvalidRequest(_))));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn predicate_false_reports_insufficient_inventory_uniformly() {
        let (engine, store, ledger) =
            engine(DecrementBehavior::PredicateFalse, FakeLedger::new());

        let result = engine.reserve(raw_request(1)).await;

        // Unknown event and sold-out section are indistinguishable here.
        assert!(matches!(
            result,
            Err(ReserveError::InsufficientInventory { .. })
        ));
        assert_eq!(store.calls(), 1);
        assert!(ledger.appended().is_empty());
    }

    #[tokio::test]
    async fn successful_reserve_appends_exactly_one_record() {
        let event = sample_event();
        let (engine, store, ledger) = engine(
            DecrementBehavior::Applied(Box::new(event.clone())),
            FakeLedger::new(),
        );

        let request = ReserveRequest {
            event_id: event.id.to_string(),
            section_id: event.sections[0].id.to_string(),
            qty: 3,
        };
        let record = engine.reserve(request).await.unwrap();

        assert_eq!(record.event_id, event.id);
        assert_eq!(record.section_id, event.sections[0].id);
        assert_eq!(u32::from(record.qty), 3);
        assert_eq!(store.calls(), 1);

        let appended = ledger.appended();
        assert_eq!(appended.len(), 1);
        assert_eq!(appended[0].id, record.id);
    }

    #[tokio::test]
    async fn storage_failure_during_decrement_leaves_no_trace() {
        let (engine, _, ledger) = engine(DecrementBehavior::Fail, FakeLedger::new());

        let result = engine.reserve(raw_request(1)).await;

        assert!(matches!(result, Err(ReserveError::Storage(_))));
        assert!(ledger.appended().is_empty());
    }

    #[tokio::test]
    async fn ledger_failure_after_decrement_surfaces_receipt_lost() {
        let event = sample_event();
        let (engine, store, _) = engine(
            DecrementBehavior::Applied(Box::new(event.clone())),
            FakeLedger::failing(),
        );

        let request = ReserveRequest {
            event_id: event.id.to_string(),
            section_id: event.sections[0].id.to_string(),
            qty: 2,
        };
        let result = engine.reserve(request).await;

        // The decrement happened and is not rolled back.
        assert_eq!(store.calls(), 1);
        match result {
            Err(ReserveError::ReceiptLost { record, .. }) => {
                assert_eq!(record.event_id, event.id);
                assert_eq!(u32::from(record.qty), 2);
            }
            other => panic!("expected ReceiptLost, got {other:?}"),
        }
    }

    #[test]
    fn reserve_request_deserializes_from_transport_json() {
        let json = r#"{"event_id":"0191e9a0-0000-7000-8000-000000000000","section_id":"0191e9a0-0000-7000-8000-000000000001","qty":2}"#;
        let request: ReserveRequest = serde_json::from_str(json).unwrap();
        let command = ReserveCommand::try_from(request).unwrap();
        assert_eq!(u32::from(command.qty), 2);
    }
}
