//! Event authoring: creating an event with its fixed section list, and
//! fetching it back by id.
//!
//! Creation is the only moment sections come into existence; afterwards the
//! reservation engine relies on the section list never changing shape. The
//! catalog establishes the invariants the engine depends on: at least one
//! section, positive capacities, and `remaining <= capacity` from birth.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::{CreateEventError, GetEventError};
use crate::model::{Event, Section};
use crate::store::InventoryStore;
use crate::types::{Capacity, EventId, EventName, Price, SectionName};

/// A raw create-event request as it arrives from the transport layer.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEventRequest {
    /// Display name of the event.
    pub name: String,
    /// The sections to create the event with. At least one required.
    pub sections: Vec<SectionRequest>,
}

/// One section of a raw create-event request.
#[derive(Debug, Clone, Deserialize)]
pub struct SectionRequest {
    /// Display name of the section.
    pub name: String,
    /// Ticket price. Non-negative, at most 2 decimal places.
    pub price: Decimal,
    /// Fixed capacity. At least 1.
    pub capacity: u32,
    /// Optional starting remaining count; defaults to `capacity`.
    #[serde(default)]
    pub remaining: Option<u32>,
}

/// Creates and fetches events against an inventory store.
#[derive(Debug)]
pub struct EventCatalog<S> {
    inventory: Arc<S>,
}

impl<S> Clone for EventCatalog<S> {
    fn clone(&self) -> Self {
        Self {
            inventory: Arc::clone(&self.inventory),
        }
    }
}

impl<S> EventCatalog<S>
where
    S: InventoryStore,
{
    /// Creates a catalog over the given inventory store.
    pub const fn new(inventory: Arc<S>) -> Self {
        Self { inventory }
    }

    /// Validates and persists a new event with its full section list.
    ///
    /// Capacities are copied into each section's starting `remaining`
    /// unless the request supplies an explicit count (bounded by
    /// capacity). On any validation failure nothing is persisted.
    #[instrument(name = "catalog.create_event", skip(self, request))]
    pub async fn create_event(
        &self,
        request: CreateEventRequest,
    ) -> Result<Event, CreateEventError> {
        let name = EventName::try_new(request.name)
            .map_err(|_| CreateEventError::InvalidRequest("event name is required".into()))?;

        if request.sections.is_empty() {
            return Err(CreateEventError::InvalidRequest(
                "at least 1 section is required".into(),
            ));
        }

        let mut sections = Vec::with_capacity(request.sections.len());
        for (index, raw) in request.sections.into_iter().enumerate() {
            sections.push(validate_section(index, raw)?);
        }

        let event = Event::create(name, sections)
            .map_err(|e| CreateEventError::InvalidRequest(e.to_string()))?;

        self.inventory.insert_event(event.clone()).await?;

        tracing::info!(
            event_id = %event.id,
            sections = event.sections.len(),
            "event created"
        );
        Ok(event)
    }

    /// Fetches an event by id.
    ///
    /// Unlike the reservation path, a missing event here is a plain
    /// [`GetEventError::NotFound`]; no availability question is involved,
    /// so there is nothing to keep ambiguous.
    #[instrument(name = "catalog.get_event", skip(self))]
    pub async fn get_event(&self, event_id: &EventId) -> Result<Event, GetEventError> {
        self.inventory
            .event_by_id(event_id)
            .await?
            .ok_or(GetEventError::NotFound(*event_id))
    }
}

fn validate_section(index: usize, raw: SectionRequest) -> Result<Section, CreateEventError> {
    let name = SectionName::try_new(raw.name).map_err(|_| {
        CreateEventError::InvalidRequest(format!("section {index}: name is required"))
    })?;

    let price = Price::new(raw.price)
        .map_err(|e| CreateEventError::InvalidRequest(format!("section {index}: {e}")))?;

    let capacity = Capacity::try_new(raw.capacity).map_err(|_| {
        CreateEventError::InvalidRequest(format!(
            "section {index}: capacity must be >= 1, got {}",
            raw.capacity
        ))
    })?;

    match raw.remaining {
        None => Ok(Section::new(name, price, capacity)),
        Some(remaining) => Section::with_starting_remaining(name, price, capacity, remaining)
            .map_err(|e| CreateEventError::InvalidRequest(format!("section {index}: {e}"))),
    }
}

/// Parses a raw event id string, for transport layers that receive ids as
/// path parameters.
pub fn parse_event_id(raw: &str) -> Option<EventId> {
    raw.trim()
        .parse::<Uuid>()
        .ok()
        .and_then(|u| EventId::try_new(u).ok())
}
