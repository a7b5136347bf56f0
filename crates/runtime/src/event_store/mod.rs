//! Append-only event log boundary.
//!
//! This module defines the storage abstraction for per-aggregate event
//! streams without making any storage assumptions, plus two conforming
//! implementations: a process-local in-memory store and a Postgres-backed
//! durable store.

pub mod in_memory;
pub mod postgres;
pub mod r#trait;

pub use in_memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
