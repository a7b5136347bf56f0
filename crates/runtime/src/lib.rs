//! Infrastructure layer: event log storage, command dispatch, subscriptions.

pub mod dispatcher;
pub mod event_store;
pub mod subscriptions;

#[cfg(test)]
mod integration_tests;

pub use dispatcher::{DispatchError, MessageDispatcher, RegistrationError};
pub use event_store::{
    EventStore, EventStoreError, InMemoryEventStore, PostgresEventStore, StoredEvent,
    UncommittedEvent,
};
pub use subscriptions::SubscriptionRegistry;
