use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;

use wordtrail_core::AggregateId;

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug)]
struct Stream {
    aggregate_type: String,
    events: Vec<StoredEvent>,
}

/// In-memory append-only event store.
///
/// Suitable for tests and single-process deployments. Contention is scoped
/// per identity: the outer map lock is held only long enough to locate (or
/// create) a stream; appends serialize on that stream's own lock, so writers
/// to different identities never block each other.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<AggregateId, Arc<Mutex<Stream>>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn existing_stream(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Option<Arc<Mutex<Stream>>>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;
        Ok(streams.get(&aggregate_id).cloned())
    }
}

impl EventStore for InMemoryEventStore {
    fn load(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let Some(stream) = self.existing_stream(aggregate_id)? else {
            return Ok(vec![]);
        };

        let stream = stream
            .lock()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        if stream.aggregate_type != aggregate_type {
            return Err(EventStoreError::TypeMismatch(format!(
                "aggregate {aggregate_id} is registered as '{}', requested as '{aggregate_type}'",
                stream.aggregate_type
            )));
        }

        Ok(stream.events.clone())
    }

    fn append(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
        expected_count: u64,
        new_events: Vec<UncommittedEvent>,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        if new_events.is_empty() {
            return Ok(vec![]);
        }

        let stream = match self.existing_stream(aggregate_id)? {
            Some(stream) => stream,
            None if expected_count != 0 => {
                return Err(EventStoreError::Conflict(format!(
                    "expected {expected_count} events for {aggregate_id}, found 0"
                )));
            }
            None => {
                // First write for this identity registers its type. Two racing
                // first writers both land here; the entry() call makes one of
                // them the registrar and the count check below rejects the other.
                let mut streams = self
                    .streams
                    .write()
                    .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;
                streams
                    .entry(aggregate_id)
                    .or_insert_with(|| {
                        Arc::new(Mutex::new(Stream {
                            aggregate_type: aggregate_type.to_string(),
                            events: Vec::new(),
                        }))
                    })
                    .clone()
            }
        };

        let mut stream = stream
            .lock()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        if stream.aggregate_type != aggregate_type {
            return Err(EventStoreError::TypeMismatch(format!(
                "aggregate {aggregate_id} is registered as '{}', attempted append as '{aggregate_type}'",
                stream.aggregate_type
            )));
        }

        let current = stream.events.len() as u64;
        if current != expected_count {
            return Err(EventStoreError::Conflict(format!(
                "expected {expected_count} events for {aggregate_id}, found {current}"
            )));
        }

        // One commit timestamp per batch.
        let recorded_at = Utc::now();

        let mut committed = Vec::with_capacity(new_events.len());
        for (offset, event) in new_events.into_iter().enumerate() {
            let stored = StoredEvent {
                aggregate_id,
                aggregate_type: aggregate_type.to_string(),
                sequence_number: expected_count + offset as u64,
                event_type: event.event_type,
                payload: event.payload,
                recorded_at,
            };
            stream.events.push(stored.clone());
            committed.push(stored);
        }

        Ok(committed)
    }
}
