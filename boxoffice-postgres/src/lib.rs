//! PostgreSQL adapter for the `BoxOffice` reservation library.
//!
//! Implements the `InventoryStore` and `BookingLedger` ports on top of a
//! shared `sqlx` connection pool. The conditional decrement is a single
//! `UPDATE .. WHERE .. AND remaining >= $qty` statement, so the
//! check-and-decrement is atomic inside the database itself: correct even
//! with many engine processes sharing one database, exactly as the port
//! contract requires.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::time::Duration;

use async_trait::async_trait;
use boxoffice::errors::{StorageError, StorageResult};
use boxoffice::model::{BookingRecord, Event, Section};
use boxoffice::types::{
    BookingId, Capacity, EventId, EventName, Price, SectionId, SectionName, TicketQuantity,
    Timestamp,
};
use chrono::{DateTime, Utc};
use nutype::nutype;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, Pool, Postgres, Row, query};
use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

/// Errors from constructing a [`PostgresStore`].
#[derive(Debug, Error)]
pub enum PostgresStoreError {
    /// Failed to create the postgres connection pool.
    #[error("failed to create postgres connection pool")]
    ConnectionFailed(#[source] sqlx::Error),

    /// Failed to run the schema migrations.
    #[error("failed to run postgres migrations")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),
}

/// Maximum number of database connections in the pool.
///
/// Must be at least 1, enforced by using `NonZeroU32` as the underlying
/// type.
#[nutype(derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRef, Into))]
pub struct MaxConnections(std::num::NonZeroU32);

/// Configuration for the `PostgresStore` connection pool.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Maximum number of connections in the pool (default: 10)
    pub max_connections: MaxConnections,
    /// Timeout for acquiring a connection from the pool (default: 30 seconds)
    pub acquire_timeout: Duration,
    /// Idle timeout for connections in the pool (default: 10 minutes)
    pub idle_timeout: Duration,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        const DEFAULT_MAX_CONNECTIONS: std::num::NonZeroU32 = match std::num::NonZeroU32::new(10) {
            Some(v) => v,
            None => unreachable!(),
        };

        Self {
            max_connections: MaxConnections::new(DEFAULT_MAX_CONNECTIONS),
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600), // 10 minutes
        }
    }
}

/// PostgreSQL-backed inventory store and booking ledger over one shared
/// pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Creates a `PostgresStore` with default configuration.
    pub async fn new<S: Into<String>>(connection_string: S) -> Result<Self, PostgresStoreError> {
        Self::with_config(connection_string, PostgresConfig::default()).await
    }

    /// Creates a `PostgresStore` with custom configuration.
    pub async fn with_config<S: Into<String>>(
        connection_string: S,
        config: PostgresConfig,
    ) -> Result<Self, PostgresStoreError> {
        let connection_string = connection_string.into();
        let max_connections: std::num::NonZeroU32 = config.max_connections.into();
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.get())
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(config.idle_timeout)
            .connect(&connection_string)
            .await
            .map_err(PostgresStoreError::ConnectionFailed)?;
        Ok(Self { pool })
    }

    /// Creates a `PostgresStore` from an existing connection pool.
    ///
    /// Use this when you need full control over pool configuration or want
    /// to share a pool across multiple components.
    pub const fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Verifies the database is reachable.
    pub async fn ping(&self) -> StorageResult<()> {
        query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|error| map_sqlx_error("ping", error))?;
        Ok(())
    }

    /// Runs the schema migrations.
    pub async fn migrate(&self) -> Result<(), PostgresStoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(PostgresStoreError::MigrationFailed)
    }
}

#[async_trait]
impl boxoffice::store::InventoryStore for PostgresStore {
    #[instrument(name = "postgres.insert_event", skip(self, event), fields(event_id = %event.id))]
    async fn insert_event(&self, event: Event) -> StorageResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| map_sqlx_error("insert_event.begin", error))?;

        query("INSERT INTO boxoffice_events (id, name, created_at) VALUES ($1, $2, $3)")
            .bind(*event.id.as_ref())
            .bind(event.name.as_ref())
            .bind(event.created_at.into_datetime())
            .execute(&mut *tx)
            .await
            .map_err(|error| map_sqlx_error("insert_event.event", error))?;

        for (position, section) in (0i64..).zip(event.sections.iter()) {
            query(
                "INSERT INTO boxoffice_sections \
                 (id, event_id, position, name, price, capacity, remaining) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(*section.id.as_ref())
            .bind(*event.id.as_ref())
            .bind(position)
            .bind(section.name.as_ref())
            .bind(section.price.amount())
            .bind(i64::from(u32::from(section.capacity)))
            .bind(i64::from(section.remaining))
            .execute(&mut *tx)
            .await
            .map_err(|error| map_sqlx_error("insert_event.section", error))?;
        }

        tx.commit()
            .await
            .map_err(|error| map_sqlx_error("insert_event.commit", error))?;

        info!(event_id = %event.id, sections = event.sections.len(), "event persisted");
        Ok(())
    }

    #[instrument(name = "postgres.event_by_id", skip(self))]
    async fn event_by_id(&self, event_id: &EventId) -> StorageResult<Option<Event>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|error| map_sqlx_error("event_by_id.acquire", error))?;

        load_event(&mut conn, *event_id.as_ref()).await
    }

    #[instrument(name = "postgres.decrement_remaining", skip(self))]
    async fn decrement_remaining(
        &self,
        event_id: &EventId,
        section_id: &SectionId,
        qty: TicketQuantity,
    ) -> StorageResult<Option<Event>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| map_sqlx_error("decrement.begin", error))?;

        // The atomic step: the row is located, checked, and decremented by
        // one statement. Concurrent callers serialize on the row lock; a
        // caller that finds the predicate false changes nothing.
        let updated = query(
            "UPDATE boxoffice_sections \
             SET remaining = remaining - $3 \
             WHERE event_id = $1 AND id = $2 AND remaining >= $3",
        )
        .bind(*event_id.as_ref())
        .bind(*section_id.as_ref())
        .bind(i64::from(u32::from(qty)))
        .execute(&mut *tx)
        .await
        .map_err(|error| map_sqlx_error("decrement.update", error))?;

        if updated.rows_affected() == 0 {
            // Unknown event, unknown section, or not enough remaining:
            // reported uniformly, and nothing to commit.
            tx.rollback()
                .await
                .map_err(|error| map_sqlx_error("decrement.rollback", error))?;
            return Ok(None);
        }

        // Re-read inside the same transaction so the returned snapshot is
        // the post-decrement state, not a later one.
        let event = load_event(&mut tx, *event_id.as_ref()).await?;

        tx.commit()
            .await
            .map_err(|error| map_sqlx_error("decrement.commit", error))?;

        Ok(event)
    }
}

#[async_trait]
impl boxoffice::store::BookingLedger for PostgresStore {
    #[instrument(name = "postgres.append_booking", skip(self, record), fields(booking_id = %record.id))]
    async fn append(&self, record: BookingRecord) -> StorageResult<()> {
        query(
            "INSERT INTO boxoffice_bookings (id, event_id, section_id, qty, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(*record.id.as_ref())
        .bind(*record.event_id.as_ref())
        .bind(*record.section_id.as_ref())
        .bind(i64::from(u32::from(record.qty)))
        .bind(record.created_at.into_datetime())
        .execute(&self.pool)
        .await
        .map_err(|error| map_sqlx_error("append_booking", error))?;

        Ok(())
    }

    #[instrument(name = "postgres.list_bookings", skip(self))]
    async fn list_all(&self) -> StorageResult<Vec<BookingRecord>> {
        let rows = query(
            "SELECT id, event_id, section_id, qty, created_at \
             FROM boxoffice_bookings \
             ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| map_sqlx_error("list_bookings", error))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(booking_from_row(&row)?);
        }
        Ok(records)
    }
}

/// Loads an event with its ordered section list through one connection.
async fn load_event(conn: &mut PgConnection, event_id: Uuid) -> StorageResult<Option<Event>> {
    let Some(event_row) = query("SELECT id, name, created_at FROM boxoffice_events WHERE id = $1")
        .bind(event_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|error| map_sqlx_error("load_event.event", error))?
    else {
        return Ok(None);
    };

    let section_rows = query(
        "SELECT id, name, price, capacity, remaining \
         FROM boxoffice_sections WHERE event_id = $1 ORDER BY position ASC",
    )
    .bind(event_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|error| map_sqlx_error("load_event.sections", error))?;

    let mut sections = Vec::with_capacity(section_rows.len());
    for row in &section_rows {
        sections.push(section_from_row(row)?);
    }

    let id: Uuid = try_get(&event_row, "id")?;
    let name: String = try_get(&event_row, "name")?;
    let created_at: DateTime<Utc> = try_get(&event_row, "created_at")?;

    let event = Event::from_parts(
        EventId::try_new(id).map_err(|e| decode_error("event id", &e))?,
        EventName::try_new(name).map_err(|e| decode_error("event name", &e))?,
        sections,
        Timestamp::new(created_at),
    );
    Ok(Some(event))
}

fn section_from_row(row: &sqlx::postgres::PgRow) -> StorageResult<Section> {
    let id: Uuid = try_get(row, "id")?;
    let name: String = try_get(row, "name")?;
    let price: Decimal = try_get(row, "price")?;
    let capacity: i64 = try_get(row, "capacity")?;
    let remaining: i64 = try_get(row, "remaining")?;

    let capacity = u32::try_from(capacity)
        .ok()
        .and_then(|c| Capacity::try_new(c).ok())
        .ok_or_else(|| StorageError::Serialization(format!("invalid capacity: {capacity}")))?;
    let remaining = u32::try_from(remaining)
        .map_err(|_| StorageError::Serialization(format!("invalid remaining: {remaining}")))?;

    Ok(Section {
        id: SectionId::try_new(id).map_err(|e| decode_error("section id", &e))?,
        name: SectionName::try_new(name).map_err(|e| decode_error("section name", &e))?,
        price: Price::new(price).map_err(|e| decode_error("section price", &e))?,
        capacity,
        remaining,
    })
}

fn booking_from_row(row: &sqlx::postgres::PgRow) -> StorageResult<BookingRecord> {
    let id: Uuid = try_get(row, "id")?;
    let event_id: Uuid = try_get(row, "event_id")?;
    let section_id: Uuid = try_get(row, "section_id")?;
    let qty: i64 = try_get(row, "qty")?;
    let created_at: DateTime<Utc> = try_get(row, "created_at")?;

    let qty = u32::try_from(qty)
        .ok()
        .and_then(|q| TicketQuantity::try_new(q).ok())
        .ok_or_else(|| StorageError::Serialization(format!("invalid qty: {qty}")))?;

    Ok(BookingRecord::from_parts(
        BookingId::try_new(id).map_err(|e| decode_error("booking id", &e))?,
        EventId::try_new(event_id).map_err(|e| decode_error("booking event id", &e))?,
        SectionId::try_new(section_id).map_err(|e| decode_error("booking section id", &e))?,
        qty,
        Timestamp::new(created_at),
    ))
}

fn try_get<'r, T>(row: &'r sqlx::postgres::PgRow, column: &str) -> StorageResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|error| map_sqlx_error("decode", error))
}

fn decode_error(what: &str, error: &dyn std::fmt::Display) -> StorageError {
    StorageError::Serialization(format!("stored {what} is invalid: {error}"))
}

fn map_sqlx_error(operation: &'static str, error: sqlx::Error) -> StorageError {
    match error {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StorageError::Unavailable(format!("{operation}: {error}"))
        }
        sqlx::Error::Io(io) => StorageError::Io(io),
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::TypeNotFound { .. } => {
            StorageError::Serialization(format!("{operation}: {error}"))
        }
        other => StorageError::Internal(format!("{operation}: {other}")),
    }
}
