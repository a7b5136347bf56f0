//! Postgres-backed event store implementation.
//!
//! Persists event streams in an append-only log table, with optimistic
//! concurrency and the identity-to-type registry enforced at the database
//! level.
//!
//! ## Schema
//!
//! ```sql
//! CREATE TABLE aggregates (
//!     aggregate_id   UUID PRIMARY KEY,
//!     aggregate_type TEXT NOT NULL
//! );
//!
//! CREATE TABLE events (
//!     aggregate_id    UUID        NOT NULL,
//!     sequence_number BIGINT      NOT NULL CHECK (sequence_number >= 0),
//!     event_type      TEXT        NOT NULL,
//!     payload         JSONB       NOT NULL,
//!     recorded_at     TIMESTAMPTZ NOT NULL,
//!     PRIMARY KEY (aggregate_id, sequence_number)
//! );
//! ```
//!
//! The primary key on `(aggregate_id, sequence_number)` is what makes the
//! expected-count check enforceable under concurrent writers: even if two
//! transactions pass the in-transaction pre-check with the same count, only
//! one can insert a given sequence number; the other fails with a unique
//! violation and surfaces as a concurrency conflict.
//!
//! ## Error mapping
//!
//! | SQLx error | Postgres code | EventStoreError | Scenario |
//! |------------|---------------|-----------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Concurrent append detected |
//! | Database (check violation) | `23514` | `InvalidAppend` | Invalid data (e.g. negative sequence) |
//! | Database (other) | any | `InvalidAppend` | Other database errors |
//! | Io / PoolClosed / PoolTimedOut | N/A | `Unavailable` | Transport/connection failure |
//! | other | N/A | `Unavailable` | Treated as transient |
//!
//! ## Thread safety
//!
//! `PostgresEventStore` is `Send + Sync`; all operations go through the SQLx
//! connection pool, and every append runs in a single transaction.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::instrument;

use wordtrail_core::AggregateId;

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// Postgres-backed append-only event store.
#[derive(Debug, Clone)]
pub struct PostgresEventStore {
    pool: Arc<PgPool>,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Load all events for an aggregate, ascending by sequence number.
    ///
    /// Returns an empty vector if the identity has never been written.
    #[instrument(skip(self), fields(aggregate_id = %aggregate_id), err)]
    pub async fn load_events(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let registered: Option<String> =
            sqlx::query_scalar("SELECT aggregate_type FROM aggregates WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("load_registration", e))?;

        match registered {
            None => return Ok(vec![]),
            Some(registered) if registered != aggregate_type => {
                return Err(EventStoreError::TypeMismatch(format!(
                    "aggregate {aggregate_id} is registered as '{registered}', requested as '{aggregate_type}'"
                )));
            }
            Some(_) => {}
        }

        let rows = sqlx::query(
            r#"
            SELECT
                aggregate_id,
                sequence_number,
                event_type,
                payload,
                recorded_at
            FROM events
            WHERE aggregate_id = $1
            ORDER BY sequence_number ASC
            "#,
        )
        .bind(aggregate_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_events", e))?;

        let mut stored = Vec::with_capacity(rows.len());
        for row in rows {
            stored.push(stored_event_from_row(&row, aggregate_type)?);
        }
        Ok(stored)
    }

    /// Append events to a stream with the expected-count check.
    ///
    /// Runs in one transaction:
    /// 1. read the currently persisted count and the registered type
    /// 2. reject on type mismatch or count mismatch (whole batch, no partial writes)
    /// 3. register the identity's type on first write
    /// 4. insert all events with sequence numbers `expected_count..`
    ///
    /// A concurrent committer slipping between steps 1 and 4 trips the
    /// `(aggregate_id, sequence_number)` unique constraint, which is mapped
    /// to [`EventStoreError::Conflict`].
    #[instrument(
        skip(self, new_events),
        fields(aggregate_id = %aggregate_id, event_count = new_events.len(), expected_count),
        err
    )]
    pub async fn append_events(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
        expected_count: u64,
        new_events: Vec<UncommittedEvent>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if new_events.is_empty() {
            return Ok(vec![]);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let current: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("count_events", e))?;

        let registered: Option<String> =
            sqlx::query_scalar("SELECT aggregate_type FROM aggregates WHERE aggregate_id = $1")
                .bind(aggregate_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("load_registration", e))?;

        if let Some(ref registered) = registered {
            if registered != aggregate_type {
                tx.rollback()
                    .await
                    .map_err(|e| map_sqlx_error("rollback", e))?;
                return Err(EventStoreError::TypeMismatch(format!(
                    "aggregate {aggregate_id} is registered as '{registered}', attempted append as '{aggregate_type}'"
                )));
            }
        }

        if current as u64 != expected_count {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(EventStoreError::Conflict(format!(
                "expected {expected_count} events for {aggregate_id}, found {current}"
            )));
        }

        if registered.is_none() {
            // First write registers the identity's type (first-write-wins).
            sqlx::query(
                r#"
                INSERT INTO aggregates (aggregate_id, aggregate_type)
                VALUES ($1, $2)
                ON CONFLICT (aggregate_id) DO NOTHING
                "#,
            )
            .bind(aggregate_id.as_uuid())
            .bind(aggregate_type)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("register_aggregate", e))?;
        }

        // One commit timestamp per batch.
        let recorded_at = Utc::now();

        let mut stored = Vec::with_capacity(new_events.len());
        for (offset, event) in new_events.into_iter().enumerate() {
            let sequence_number = expected_count + offset as u64;

            sqlx::query(
                r#"
                INSERT INTO events (
                    aggregate_id,
                    sequence_number,
                    event_type,
                    payload,
                    recorded_at
                )
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(aggregate_id.as_uuid())
            .bind(sequence_number as i64)
            .bind(&event.event_type)
            .bind(&event.payload)
            .bind(recorded_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    EventStoreError::Conflict(format!(
                        "concurrent append detected: sequence number {sequence_number} already exists for {aggregate_id}"
                    ))
                } else {
                    map_sqlx_error("insert_event", e)
                }
            })?;

            stored.push(StoredEvent {
                aggregate_id,
                aggregate_type: aggregate_type.to_string(),
                sequence_number,
                event_type: event.event_type,
                payload: event.payload,
                recorded_at,
            });
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(stored)
    }
}

impl EventStore for PostgresEventStore {
    // The EventStore trait is synchronous, but Postgres operations require
    // async. tokio::runtime::Handle bridges the two when called from within a
    // tokio runtime context.

    fn load(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let handle = runtime_handle()?;
        handle.block_on(self.load_events(aggregate_type, aggregate_id))
    }

    fn append(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
        expected_count: u64,
        new_events: Vec<UncommittedEvent>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let handle = runtime_handle()?;
        handle.block_on(self.append_events(
            aggregate_type,
            aggregate_id,
            expected_count,
            new_events,
        ))
    }
}

fn runtime_handle() -> Result<tokio::runtime::Handle, EventStoreError> {
    tokio::runtime::Handle::try_current().map_err(|_| {
        EventStoreError::Unavailable(
            "PostgresEventStore requires an async runtime (tokio); call from within a runtime context".to_string(),
        )
    })
}

fn stored_event_from_row(
    row: &sqlx::postgres::PgRow,
    aggregate_type: &str,
) -> Result<StoredEvent, EventStoreError> {
    let read = |what: &str, e: sqlx::Error| {
        EventStoreError::Integrity(format!("failed to read event row column '{what}': {e}"))
    };

    let aggregate_id: uuid::Uuid = row
        .try_get("aggregate_id")
        .map_err(|e| read("aggregate_id", e))?;
    let sequence_number: i64 = row
        .try_get("sequence_number")
        .map_err(|e| read("sequence_number", e))?;
    let event_type: String = row.try_get("event_type").map_err(|e| read("event_type", e))?;
    let payload: serde_json::Value = row.try_get("payload").map_err(|e| read("payload", e))?;
    let recorded_at: DateTime<Utc> = row
        .try_get("recorded_at")
        .map_err(|e| read("recorded_at", e))?;

    Ok(StoredEvent {
        aggregate_id: AggregateId::from_uuid(aggregate_id),
        aggregate_type: aggregate_type.to_string(),
        sequence_number: sequence_number as u64,
        event_type,
        payload,
        recorded_at,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> EventStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => EventStoreError::Conflict(msg),
                _ => EventStoreError::InvalidAppend(msg),
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            EventStoreError::Unavailable(format!("connection pool unavailable in {operation}"))
        }
        sqlx::Error::Io(e) => EventStoreError::Unavailable(format!("io error in {operation}: {e}")),
        sqlx::Error::RowNotFound => {
            EventStoreError::Integrity(format!("unexpected missing row in {operation}"))
        }
        other => EventStoreError::Unavailable(format!("sqlx error in {operation}: {other}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}
