//! Command execution pipeline (application-level orchestration).
//!
//! The dispatcher implements the full lifecycle for event-sourced
//! aggregates:
//!
//! ```text
//! Command
//!   ↓
//! 1. Resolve the aggregate type registered for this command type
//!   ↓
//! 2. Load history from the event store and verify stream integrity
//!   ↓
//! 3. Hydrate a fresh aggregate and replay its history
//!   ↓
//! 4. Handle the command (pure decision logic, produces events)
//!   ↓
//! 5. Apply the decided events to the local instance, then append them
//!    with the loaded count as the optimistic expected count
//!   ↓
//! 6. Publish committed events to subscribers, in commit order
//! ```
//!
//! Routing uses a static registration table built at process startup: each
//! aggregate type registers an execution route under the `TypeId` of its
//! command type. Exactly one aggregate may handle a given command type;
//! registering a second is caught at registration time, not at dispatch
//! time. There is no implicit global instance: construct a dispatcher
//! explicitly and hand it to whatever needs it.
//!
//! Aggregates are rebuilt from the store on every `send`; no aggregate
//! state is cached or shared across concurrent commands. The store's
//! per-identity append path is the sole serialization point.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;

use wordtrail_core::{Aggregate, AggregateId, DomainError};
use wordtrail_events::{Command, Event, EventEnvelope, EventSubscriber};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
use crate::subscriptions::SubscriptionRegistry;

/// Configuration error raised while building the routing table.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// Exactly one aggregate may handle a given command type.
    #[error("command type '{command}' is already routed to aggregate '{existing}'")]
    DuplicateRoute {
        command: &'static str,
        existing: &'static str,
    },
}

/// Failure of a single `send` call.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No aggregate is registered for this command type.
    #[error("no aggregate registered for command type '{0}'")]
    Unrouted(&'static str),

    /// Domain validation failure (deterministic; nothing was persisted).
    #[error("validation failed: {0}")]
    Validation(String),

    /// Domain invariant failure (deterministic; nothing was persisted).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// Domain-level conflict with existing state (e.g. already created).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Domain-level not found.
    #[error("not found")]
    NotFound,

    /// Another writer committed to the same identity between load and
    /// append. Retry by reloading and re-running the command against fresh
    /// state, never by resubmitting the stale events. The dispatcher does
    /// not retry on its own.
    #[error("optimistic concurrency conflict: {0}")]
    Concurrency(String),

    /// The store is unreachable; transient and retryable with backoff.
    #[error("event store unavailable: {0}")]
    Unavailable(String),

    /// Sequence gap, duplicate, or unknown event type during replay.
    /// Indicates a store or registration bug, not a caller error.
    #[error("stream integrity violation: {0}")]
    Integrity(String),

    /// Other event store failure.
    #[error(transparent)]
    Store(EventStoreError),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Conflict(msg) => DispatchError::Concurrency(msg),
            EventStoreError::Unavailable(msg) => DispatchError::Unavailable(msg),
            EventStoreError::Integrity(msg) | EventStoreError::TypeMismatch(msg) => {
                DispatchError::Integrity(msg)
            }
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Conflict(msg),
            DomainError::NotFound => DispatchError::NotFound,
            DomainError::InvalidId(msg) => DispatchError::Validation(msg),
        }
    }
}

/// Routes commands to aggregates and fans committed events out to
/// subscribers.
///
/// ## Execution guarantees
///
/// - Events are applied to the local instance before the append, so an
///   internally inconsistent batch fails before anything is committed
/// - Events are persisted before publication; if the append fails, nothing
///   is published
/// - Subscriber failures are isolated and never roll back the committed
///   write (at-least-once delivery)
///
/// ## Generic parameters
///
/// - `S`: event store implementation; use [`crate::InMemoryEventStore`] in
///   tests and [`crate::PostgresEventStore`] in production.
pub struct MessageDispatcher<S> {
    store: S,
    routes: HashMap<TypeId, Box<dyn CommandRoute<S>>>,
    subscriptions: SubscriptionRegistry,
}

impl<S> MessageDispatcher<S>
where
    S: EventStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            routes: HashMap::new(),
            subscriptions: SubscriptionRegistry::new(),
        }
    }

    /// Register an aggregate type as the handler for its command type.
    ///
    /// Part of the startup registration phase; returns an error if another
    /// aggregate already claimed the command type.
    pub fn register_aggregate<A>(&mut self) -> Result<(), RegistrationError>
    where
        A: Aggregate<Error = DomainError> + 'static,
        A::Command: Command,
        A::Event: Event + Serialize + DeserializeOwned,
    {
        let key = TypeId::of::<A::Command>();
        if let Some(existing) = self.routes.get(&key) {
            return Err(RegistrationError::DuplicateRoute {
                command: std::any::type_name::<A::Command>(),
                existing: existing.aggregate_kind(),
            });
        }

        self.routes.insert(
            key,
            Box::new(AggregateRoute::<A> {
                _aggregate: PhantomData,
            }),
        );
        Ok(())
    }

    /// Register a read-side subscriber under each event type it declares.
    pub fn subscribe(&mut self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscriptions.register(subscriber);
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.subscriptions
    }

    /// Execute one command end to end.
    ///
    /// Returns the committed events (with assigned sequence numbers) on
    /// success. A handler that decides zero events commits nothing and
    /// publishes nothing.
    pub fn send<C>(&self, command: C) -> Result<Vec<StoredEvent>, DispatchError>
    where
        C: Command,
    {
        let route = self
            .routes
            .get(&TypeId::of::<C>())
            .ok_or_else(|| DispatchError::Unrouted(std::any::type_name::<C>()))?;

        debug!(
            command = std::any::type_name::<C>(),
            aggregate = route.aggregate_kind(),
            aggregate_id = %command.target_aggregate_id(),
            "dispatching command"
        );

        let committed = route.execute(&self.store, &command)?;

        // Durability is settled; fan out in commit order.
        for stored in &committed {
            self.publish(&stored.to_envelope());
        }

        Ok(committed)
    }

    fn publish(&self, envelope: &EventEnvelope<JsonValue>) {
        self.subscriptions.deliver(envelope);
    }
}

impl<S> core::fmt::Debug for MessageDispatcher<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MessageDispatcher")
            .field("routes", &self.routes.len())
            .field("subscriptions", &self.subscriptions)
            .finish_non_exhaustive()
    }
}

/// One entry in the routing table: executes commands of a single command
/// type against its aggregate.
trait CommandRoute<S>: Send + Sync {
    fn aggregate_kind(&self) -> &'static str;

    fn execute(&self, store: &S, command: &dyn Any) -> Result<Vec<StoredEvent>, DispatchError>;
}

struct AggregateRoute<A> {
    _aggregate: PhantomData<fn() -> A>,
}

impl<S, A> CommandRoute<S> for AggregateRoute<A>
where
    S: EventStore,
    A: Aggregate<Error = DomainError> + 'static,
    A::Command: Command,
    A::Event: Event + Serialize + DeserializeOwned,
{
    fn aggregate_kind(&self) -> &'static str {
        A::KIND
    }

    fn execute(&self, store: &S, command: &dyn Any) -> Result<Vec<StoredEvent>, DispatchError> {
        // The table is keyed by TypeId::of::<A::Command>, so this downcast
        // only fails on a routing-table bug.
        let command = command.downcast_ref::<A::Command>().ok_or_else(|| {
            DispatchError::Integrity(format!(
                "route for aggregate '{}' received a foreign command type",
                A::KIND
            ))
        })?;

        let aggregate_id = command.target_aggregate_id();

        // 1) Load history and verify its integrity.
        let history = store.load(A::KIND, aggregate_id)?;
        verify_stream(aggregate_id, &history)?;

        // 2) Rehydrate a fresh instance.
        let mut aggregate = A::hydrate(aggregate_id);
        replay::<A>(&mut aggregate, &history)?;

        // 3) Decide (no mutation).
        let decided = aggregate.handle(command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        // 4) Apply locally before committing, keeping the in-process
        //    instance consistent with what is about to be persisted.
        for event in &decided {
            aggregate.apply(event);
        }

        // 5) Persist under the optimistic expected-count check.
        let uncommitted = decided
            .iter()
            .map(UncommittedEvent::from_typed)
            .collect::<Result<Vec<_>, _>>()?;

        let committed = store.append(A::KIND, aggregate_id, history.len() as u64, uncommitted)?;
        Ok(committed)
    }
}

/// A loaded stream must belong to the requested identity and be contiguous
/// from sequence number 0. Anything else is a fatal integrity violation.
fn verify_stream(aggregate_id: AggregateId, stream: &[StoredEvent]) -> Result<(), DispatchError> {
    for (idx, event) in stream.iter().enumerate() {
        if event.aggregate_id != aggregate_id {
            return Err(DispatchError::Integrity(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if event.sequence_number != idx as u64 {
            return Err(DispatchError::Integrity(format!(
                "sequence gap in loaded stream (expected {idx}, found {})",
                event.sequence_number
            )));
        }
    }
    Ok(())
}

fn replay<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let event: A::Event = serde_json::from_value(stored.payload.clone()).map_err(|e| {
            DispatchError::Integrity(format!(
                "unknown or malformed event '{}' at sequence {}: {e}",
                stored.event_type, stored.sequence_number
            ))
        })?;
        aggregate.apply(&event);
    }
    Ok(())
}
