//! Race-condition demo: many concurrent callers against a small section.
//!
//! Creates an event with a single 5-seat section, then fires 10 concurrent
//! `reserve` calls of 1 ticket each. Exactly 5 succeed and the section
//! drains to 0, no matter how the calls interleave.
//!
//! Run with: `cargo run --example oversell_race`

use std::sync::Arc;

use boxoffice::catalog::{CreateEventRequest, EventCatalog, SectionRequest};
use boxoffice::engine::{ReservationEngine, ReserveRequest};
use boxoffice::errors::ReserveError;
use boxoffice::reader::BookingReader;
use boxoffice_memory::{InMemoryBookingLedger, InMemoryInventoryStore};
use rust_decimal::Decimal;
use tracing::info;

const TOTAL_REQUESTS: usize = 10;
const QTY_PER_REQUEST: i64 = 1;
const CAPACITY: u32 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let store = Arc::new(InMemoryInventoryStore::new());
    let ledger = Arc::new(InMemoryBookingLedger::new());
    let catalog = EventCatalog::new(Arc::clone(&store));
    let engine = ReservationEngine::new(Arc::clone(&store), Arc::clone(&ledger));
    let reader = BookingReader::new(Arc::clone(&store), Arc::clone(&ledger));

    let event = catalog
        .create_event(CreateEventRequest {
            name: "Concert".to_string(),
            sections: vec![SectionRequest {
                name: "General Admission".to_string(),
                price: Decimal::new(2500, 2),
                capacity: CAPACITY,
                remaining: None,
            }],
        })
        .await?;
    let section_id = event.sections[0].id;

    info!(
        event_id = %event.id,
        capacity = CAPACITY,
        requests = TOTAL_REQUESTS,
        "starting race"
    );

    let handles: Vec<_> = (0..TOTAL_REQUESTS)
        .map(|i| {
            let engine = engine.clone();
            let request = ReserveRequest {
                event_id: event.id.to_string(),
                section_id: section_id.to_string(),
                qty: QTY_PER_REQUEST,
            };
            tokio::spawn(async move { (i, engine.reserve(request).await) })
        })
        .collect();

    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        let (i, outcome) = handle.await?;
        match outcome {
            Ok(record) => {
                successes += 1;
                info!(caller = i, booking_id = %record.id, "reserved");
            }
            Err(ReserveError::InsufficientInventory { .. }) => {
                conflicts += 1;
                info!(caller = i, "rejected: sold out");
            }
            Err(other) => return Err(other.into()),
        }
    }

    let remaining = catalog.get_event(&event.id).await?.sections[0].remaining;
    println!("\n===== RESULTS =====");
    println!("successes: {successes}");
    println!("conflicts: {conflicts}");
    println!("remaining: {remaining}");

    println!("\nledger (newest first):");
    for context in reader.list_with_context().await? {
        let event_name = context
            .event
            .map_or_else(|| "<missing>".to_string(), |e| e.name.to_string());
        let section_name = context
            .section
            .map_or_else(|| "<missing>".to_string(), |s| s.name.to_string());
        println!(
            "  {} | {} / {} | qty {}",
            context.booking.id, event_name, section_name, context.booking.qty
        );
    }

    assert_eq!(successes, 5);
    assert_eq!(conflicts, 5);
    assert_eq!(remaining, 0);
    Ok(())
}
