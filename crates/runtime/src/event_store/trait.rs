use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;

use wordtrail_core::AggregateId;

/// An event ready to be appended to a stream (not yet assigned a sequence
/// number).
///
/// ## Event lifecycle
///
/// 1. **Domain event**: produced by an aggregate's `handle()`
/// 2. **UncommittedEvent**: serialized payload + type discriminator
/// 3. **StoredEvent**: persisted with an assigned sequence number and commit
///    timestamp
/// 4. **EventEnvelope**: published to subscribers
///
/// Use [`UncommittedEvent::from_typed`] to build one from a typed domain
/// event; the store supplies everything else at append time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_type: String,
    pub payload: JsonValue,
}

impl UncommittedEvent {
    /// Serialize a typed domain event into its storable form.
    pub fn from_typed<E>(event: &E) -> Result<Self, EventStoreError>
    where
        E: wordtrail_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            EventStoreError::InvalidAppend(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_type: event.event_type().to_string(),
            payload,
        })
    }
}

/// A stored event in an append-only stream.
///
/// ## Sequence numbers
///
/// Sequence numbers are assigned by the event store during append and are:
/// - **Contiguous from 0**: an aggregate's history is numbered `0..n`, with
///   no gaps; a gap observed on load is a fatal integrity violation
/// - **Stream-scoped**: numbering is per aggregate identity
/// - **Immutable**: once assigned, sequence numbers never change
///
/// `recorded_at` is the commit timestamp, assigned at persistence time (one
/// timestamp per committed batch). It is a store responsibility, not an
/// aggregate responsibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Monotonically increasing position in the aggregate stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub payload: JsonValue,
    pub recorded_at: DateTime<Utc>,
}

impl StoredEvent {
    /// Convert a stored event into an envelope for publication to subscribers.
    pub fn to_envelope(&self) -> wordtrail_events::EventEnvelope<JsonValue> {
        wordtrail_events::EventEnvelope::new(
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.sequence_number,
            self.event_type.clone(),
            self.recorded_at,
            self.payload.clone(),
        )
    }
}

/// Event store operation error.
///
/// These are **infrastructure errors** (storage, concurrency, isolation) as
/// opposed to domain errors (validation, invariants).
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// Another writer committed events for this identity between the
    /// caller's load and append. Retryable: reload history and re-run the
    /// command against fresh state, not by resubmitting the stale events.
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    /// Transport/connection failure. Transient and retryable with backoff;
    /// never to be interpreted as "aggregate does not exist".
    #[error("event store unavailable: {0}")]
    Unavailable(String),

    /// The identity is registered under a different aggregate type.
    #[error("aggregate type mismatch: {0}")]
    TypeMismatch(String),

    /// The persisted stream is corrupt (gap, duplicate, malformed record).
    /// Fatal, non-recoverable locally.
    #[error("stream integrity violation: {0}")]
    Integrity(String),

    /// Invalid event data or batch shape.
    #[error("invalid append: {0}")]
    InvalidAppend(String),
}

/// Append-only event log, keyed by aggregate identity.
///
/// ## Append semantics
///
/// `append()` must, atomically with the write:
/// - verify the currently persisted count for the identity still equals
///   `expected_count` (the count the caller observed at load time)
/// - assign sequence numbers `expected_count .. expected_count + n - 1`
/// - stamp one commit timestamp for the batch
/// - write all events, plus the identity → type registration record on the
///   first write for the identity (first-write-wins)
///
/// If the check fails, the whole append is rejected with
/// [`EventStoreError::Conflict`] and nothing is written; a store must never
/// persist a subset of `new_events`.
///
/// ## Load semantics
///
/// `load()` returns the full stream in ascending sequence order, empty if
/// the aggregate has no history. It must never omit or reorder events, and
/// concurrent loads observe either the pre- or post-append state of a batch
/// in full, never a partially written batch.
///
/// ## Contention
///
/// The per-identity append path is the sole serialization point: concurrent
/// appends for the *same* identity are linearized (exactly one wins when
/// both observed the same `expected_count`), while appends to *different*
/// identities proceed without blocking each other.
pub trait EventStore: Send + Sync {
    /// Load the full stream for an aggregate, ascending by sequence number.
    fn load(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Append events to an aggregate stream under an optimistic
    /// expected-count check.
    fn append(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
        expected_count: u64,
        new_events: Vec<UncommittedEvent>,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn load(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load(aggregate_type, aggregate_id)
    }

    fn append(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
        expected_count: u64,
        new_events: Vec<UncommittedEvent>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(aggregate_type, aggregate_id, expected_count, new_events)
    }
}
