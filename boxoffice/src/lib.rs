//! `BoxOffice` - concurrency-safe ticket reservation core
//!
//! This library lets an operator define ticketed events with multiple sale
//! sections of fixed capacity, and lets many concurrent clients reserve
//! tickets without ever overselling. The core is the reservation engine's
//! atomic "check availability and decrement" operation; storage backends
//! implement it behind the [`store::InventoryStore`] port so that the
//! atomicity lives in the storage layer, never in application memory.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod engine;
pub mod errors;
pub mod model;
pub mod reader;
pub mod store;
pub mod types;

pub use catalog::{CreateEventRequest, EventCatalog, SectionRequest};
pub use engine::{ReservationEngine, ReserveCommand, ReserveRequest};
pub use errors::{CreateEventError, GetEventError, ReserveError, StorageError};
pub use model::{BookingRecord, Event, Section};
pub use reader::{BookingContext, BookingReader, EventSummary, SectionSummary};
pub use store::{BookingLedger, InventoryStore};
