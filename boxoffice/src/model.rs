//! The data model: events, their embedded sections, and booking records.
//!
//! An [`Event`] owns a fixed, ordered collection of [`Section`]s created
//! together with it. After creation the only field that ever changes is a
//! section's `remaining` counter, and only downward, only through a store's
//! atomic conditional decrement. A [`BookingRecord`] is the immutable
//! receipt of one successful reservation and references its event and
//! section by id alone.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{
    BookingId, Capacity, EventId, EventName, Price, SectionId, SectionName, TicketQuantity,
    Timestamp,
};

/// A starting `remaining` value exceeded the section's capacity.
///
/// `0 <= remaining <= capacity` must hold from the moment a section exists;
/// a section born oversold would break every guarantee downstream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("starting remaining {remaining} exceeds capacity {capacity}")]
pub struct RemainingExceedsCapacity {
    /// The requested starting remaining count.
    pub remaining: u32,
    /// The section's fixed capacity.
    pub capacity: Capacity,
}

/// An event must be created with at least one section.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("an event requires at least one section")]
pub struct EventWithoutSections;

/// A sub-inventory of an event with fixed capacity and a live remaining
/// count.
///
/// Sections are embedded in their owning event and are not independently
/// addressable; a `SectionId` only means something together with the parent
/// `EventId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Identifier, unique within the owning event.
    pub id: SectionId,
    /// Display name of the section.
    pub name: SectionName,
    /// Ticket price for this section.
    pub price: Price,
    /// Fixed capacity, set at creation.
    pub capacity: Capacity,
    /// Tickets still available. Invariant: `0 <= remaining <= capacity`.
    pub remaining: u32,
}

impl Section {
    /// Creates a section with all tickets available (`remaining == capacity`).
    pub fn new(name: SectionName, price: Price, capacity: Capacity) -> Self {
        Self {
            id: SectionId::new(),
            name,
            price,
            capacity,
            remaining: capacity.into(),
        }
    }

    /// Creates a section with an explicit starting `remaining` count.
    ///
    /// Used when an operator migrates an event with sales already on the
    /// books. The count must not exceed capacity.
    pub fn with_starting_remaining(
        name: SectionName,
        price: Price,
        capacity: Capacity,
        remaining: u32,
    ) -> Result<Self, RemainingExceedsCapacity> {
        if remaining > capacity.into() {
            return Err(RemainingExceedsCapacity {
                remaining,
                capacity,
            });
        }
        Ok(Self {
            id: SectionId::new(),
            name,
            price,
            capacity,
            remaining,
        })
    }

    /// Returns whether this section can satisfy a reservation of `qty`.
    ///
    /// Advisory only: the answer is stale the moment it is returned. The
    /// authoritative check happens inside the store's atomic decrement.
    pub fn can_satisfy(&self, qty: TicketQuantity) -> bool {
        self.remaining >= u32::from(qty)
    }
}

/// A sellable occasion with one or more sections.
///
/// Created once with its full section list; immutable thereafter except
/// for section `remaining` counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier.
    pub id: EventId,
    /// Display name.
    pub name: EventName,
    /// The fixed, ordered section list. Never empty.
    pub sections: Vec<Section>,
    /// When the event was created.
    pub created_at: Timestamp,
}

impl Event {
    /// Creates an event with its full section list.
    pub fn create(name: EventName, sections: Vec<Section>) -> Result<Self, EventWithoutSections> {
        if sections.is_empty() {
            return Err(EventWithoutSections);
        }
        Ok(Self {
            id: EventId::new(),
            name,
            sections,
            created_at: Timestamp::now(),
        })
    }

    /// Reassembles an event from stored parts (for storage adapters).
    pub const fn from_parts(
        id: EventId,
        name: EventName,
        sections: Vec<Section>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            name,
            sections,
            created_at,
        }
    }

    /// Looks up a section by id within this event's section list.
    pub fn section(&self, section_id: &SectionId) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == *section_id)
    }
}

/// An immutable receipt of a successful reservation.
///
/// References its event and section by id only. The record stays meaningful
/// even if those ids no longer resolve; the read path handles that, not the
/// record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    /// Unique identifier.
    pub id: BookingId,
    /// The event the tickets were reserved from.
    pub event_id: EventId,
    /// The section the tickets were reserved from.
    pub section_id: SectionId,
    /// How many tickets were reserved.
    pub qty: TicketQuantity,
    /// When the reservation succeeded.
    pub created_at: Timestamp,
}

impl BookingRecord {
    /// Creates a record for a reservation that just succeeded.
    pub fn new(event_id: EventId, section_id: SectionId, qty: TicketQuantity) -> Self {
        Self {
            id: BookingId::new(),
            event_id,
            section_id,
            qty,
            created_at: Timestamp::now(),
        }
    }

    /// Reassembles a record from stored parts (for storage adapters).
    pub const fn from_parts(
        id: BookingId,
        event_id: EventId,
        section_id: SectionId,
        qty: TicketQuantity,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            event_id,
            section_id,
            qty,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section_name(s: &str) -> SectionName {
        SectionName::try_new(s).unwrap()
    }

    fn capacity(c: u32) -> Capacity {
        Capacity::try_new(c).unwrap()
    }

    #[test]
    fn new_section_starts_with_full_remaining() {
        let section = Section::new(section_name("Floor"), Price::from_cents(4500).unwrap(), capacity(100));
        assert_eq!(section.remaining, 100);
    }

    #[test]
    fn starting_remaining_within_capacity_is_accepted() {
        let section = Section::with_starting_remaining(
            section_name("Balcony"),
            Price::from_cents(3000).unwrap(),
            capacity(50),
            20,
        )
        .unwrap();
        assert_eq!(section.remaining, 20);
        assert_eq!(u32::from(section.capacity), 50);
    }

    #[test]
    fn starting_remaining_of_zero_is_accepted() {
        let section = Section::with_starting_remaining(
            section_name("Pit"),
            Price::zero(),
            capacity(10),
            0,
        )
        .unwrap();
        assert_eq!(section.remaining, 0);
    }

    #[test]
    fn starting_remaining_above_capacity_is_rejected() {
        let result = Section::with_starting_remaining(
            section_name("Balcony"),
            Price::from_cents(3000).unwrap(),
            capacity(50),
            51,
        );
        assert_eq!(
            result,
            Err(RemainingExceedsCapacity {
                remaining: 51,
                capacity: capacity(50),
            })
        );
    }

    #[test]
    fn event_requires_at_least_one_section() {
        let result = Event::create(EventName::try_new("Concert").unwrap(), vec![]);
        assert_eq!(result, Err(EventWithoutSections));
    }

    #[test]
    fn event_section_lookup_finds_embedded_section() {
        let section = Section::new(section_name("Floor"), Price::from_cents(4500).unwrap(), capacity(100));
        let section_id = section.id;
        let event = Event::create(EventName::try_new("Concert").unwrap(), vec![section]).unwrap();

        assert!(event.section(&section_id).is_some());
        assert!(event.section(&SectionId::new()).is_none());
    }

    #[test]
    fn section_can_satisfy_is_bounded_by_remaining() {
        let mut section =
            Section::new(section_name("Floor"), Price::from_cents(4500).unwrap(), capacity(5));
        assert!(section.can_satisfy(TicketQuantity::try_new(5).unwrap()));
        section.remaining = 2;
        assert!(!section.can_satisfy(TicketQuantity::try_new(3).unwrap()));
        assert!(section.can_satisfy(TicketQuantity::try_new(2).unwrap()));
    }

    #[test]
    fn booking_record_references_by_id_only() {
        let event_id = EventId::new();
        let section_id = SectionId::new();
        let record = BookingRecord::new(event_id, section_id, TicketQuantity::try_new(2).unwrap());

        assert_eq!(record.event_id, event_id);
        assert_eq!(record.section_id, section_id);
        assert_eq!(u32::from(record.qty), 2);
    }
}
