//! Aggregate traits for event-sourced domain models.

use crate::id::AggregateId;

/// Aggregate root marker + minimal interface.
///
/// An aggregate's durable form is its event history; the in-memory object is
/// a transient projection of that history, rebuilt per command execution and
/// never shared across concurrent commands.
pub trait AggregateRoot {
    /// Strongly-typed aggregate identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the aggregate identifier.
    fn id(&self) -> &Self::Id;

    /// Number of events applied to this instance so far.
    ///
    /// Folding a stream of `n` events from empty state leaves the aggregate
    /// at version `n`.
    fn version(&self) -> u64;
}

/// Aggregate execution semantics (pure, deterministic).
///
/// - **Decision logic**: `handle(&self, cmd)` returns the events that *would*
///   occur, or a domain error. It must not mutate state and must not call
///   `apply`; the dispatcher owns the apply step, so "decide" and "mutate"
///   stay independently testable.
/// - **State mutation**: `apply(&mut self, event)` evolves state. It never
///   fails, never validates, and never produces further events.
///
/// Two invariants bind every implementation:
///
/// - *Determinism*: replaying the same event sequence from empty state always
///   yields identical state.
/// - *Total order*: events are applied strictly in ascending sequence order,
///   exactly once each.
pub trait Aggregate: AggregateRoot + Sized + Send + Sync {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    /// Stable aggregate type discriminator, persisted alongside the stream.
    const KIND: &'static str;

    /// Construct the empty, pre-creation state for the given identity.
    ///
    /// The returned instance reports `identity_assigned() == false` until a
    /// creation event has been applied.
    fn hydrate(id: AggregateId) -> Self;

    /// True once a creation event has been processed.
    ///
    /// This is the aggregate's only externally meaningful state machine:
    /// Uninitialized → Created → (Updated | Deleted)*. Handlers use it to
    /// distinguish "not yet created" from "already exists"; whether a deleted
    /// aggregate may be recreated is up to the implementation, not the runtime.
    fn identity_assigned(&self) -> bool;

    /// Evolve in-memory state from a single event.
    fn apply(&mut self, event: &Self::Event);

    /// Decide which events to emit given the current state and a command.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}
