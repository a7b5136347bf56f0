use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::envelope::EventEnvelope;

/// Error surfaced by a subscriber while consuming a committed event.
///
/// By the time a subscriber runs, the triggering write is already durable.
/// A subscriber failure is therefore reported, never propagated into the
/// write path, and never prevents delivery to other subscribers.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct SubscriberError(String);

impl SubscriberError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// A read-side consumer of committed events.
///
/// Subscribers declare the event types they want up front; the runtime
/// indexes them under each declared type during its single registration
/// phase. Delivery is synchronous with the triggering command, in commit
/// order per aggregate stream, with no cross-aggregate ordering guarantee.
///
/// Delivery is at-least-once: implementations must be side-effect
/// idempotent (e.g. by tracking the last sequence number seen per stream).
pub trait EventSubscriber: Send + Sync {
    /// Stable name used in failure reports and logs.
    fn name(&self) -> &str;

    /// Event types this subscriber wants delivered.
    fn subscribed_to(&self) -> &'static [&'static str];

    /// Consume one committed event.
    fn on_event(&self, event: &EventEnvelope<JsonValue>) -> Result<(), SubscriberError>;
}
