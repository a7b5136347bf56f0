//! Subscription registry: event type → ordered subscriber callbacks.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::error;

use wordtrail_events::{EventEnvelope, EventSubscriber};

/// Index of subscribers by event type.
///
/// Populated during the single registration phase at startup; there is no
/// removal operation. Delivery to the subscribers of one event type happens
/// in registration order, and the dispatcher publishes committed events in
/// commit order, so each subscriber observes one aggregate's events in
/// non-decreasing sequence order. No cross-aggregate ordering is guaranteed.
#[derive(Default)]
pub struct SubscriptionRegistry {
    by_type: HashMap<&'static str, Vec<Arc<dyn EventSubscriber>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a subscriber under each event type it declares.
    pub fn register(&mut self, subscriber: Arc<dyn EventSubscriber>) {
        for event_type in subscriber.subscribed_to() {
            self.by_type
                .entry(event_type)
                .or_default()
                .push(Arc::clone(&subscriber));
        }
    }

    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.by_type.get(event_type).map_or(0, Vec::len)
    }

    /// Deliver one committed event to every subscriber of its type.
    ///
    /// Failures are isolated per subscriber: the event is already durable,
    /// so a failing subscriber is reported and delivery continues to the
    /// rest. Side effects here are at-least-once, not transactional with
    /// the write.
    pub fn deliver(&self, envelope: &EventEnvelope<JsonValue>) {
        let Some(subscribers) = self.by_type.get(envelope.event_type()) else {
            return;
        };

        for subscriber in subscribers {
            if let Err(e) = subscriber.on_event(envelope) {
                error!(
                    subscriber = subscriber.name(),
                    event_type = envelope.event_type(),
                    aggregate_id = %envelope.aggregate_id(),
                    sequence_number = envelope.sequence_number(),
                    error = %e,
                    "subscriber failed; continuing delivery"
                );
            }
        }
    }
}

impl core::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut map = f.debug_map();
        for (event_type, subscribers) in &self.by_type {
            map.entry(event_type, &subscribers.len());
        }
        map.finish()
    }
}
