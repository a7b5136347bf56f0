use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use wordtrail_core::AggregateId;
use wordtrail_domain::writer::{WriterEvent, WriterId};
use wordtrail_events::{EventEnvelope, EventSubscriber, SubscriberError};

/// Current details for one writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterDetails {
    pub writer_id: WriterId,
    pub user_name: String,
    pub name: String,
    pub bio: String,
}

#[derive(Debug, Default)]
struct Inner {
    by_user_name: HashMap<String, WriterDetails>,
    user_names: HashMap<WriterId, String>,
    // Last sequence number applied per stream; events at or below it are
    // duplicates under at-least-once delivery and get skipped.
    cursors: HashMap<AggregateId, u64>,
}

/// Writer directory read model, keyed by **user name**.
///
/// Subscribes to writer registration and profile updates and answers
/// "current writer details" lookups by the business key rather than the
/// aggregate identity.
#[derive(Debug, Default)]
pub struct WriterDirectory {
    inner: RwLock<Inner>,
}

impl WriterDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writer_details(&self, user_name: &str) -> Option<WriterDetails> {
        let inner = self.inner.read().ok()?;
        inner.by_user_name.get(user_name).cloned()
    }
}

impl EventSubscriber for WriterDirectory {
    fn name(&self) -> &str {
        "readmodels.writer_directory"
    }

    fn subscribed_to(&self) -> &'static [&'static str] {
        &["writer.registered", "writer.updated"]
    }

    fn on_event(&self, event: &EventEnvelope<JsonValue>) -> Result<(), SubscriberError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| SubscriberError::new("writer directory lock poisoned"))?;

        // The writer stream also carries project-catalogue events we are not
        // subscribed to, so cursors only require "strictly newer", not "next".
        if let Some(&last) = inner.cursors.get(&event.aggregate_id()) {
            if event.sequence_number() <= last {
                return Ok(());
            }
        }

        let payload: WriterEvent = serde_json::from_value(event.payload().clone())
            .map_err(|e| SubscriberError::new(format!("malformed writer event: {e}")))?;

        match payload {
            WriterEvent::WriterRegistered(e) => {
                inner.user_names.insert(e.writer_id, e.user_name.clone());
                inner.by_user_name.insert(
                    e.user_name.clone(),
                    WriterDetails {
                        writer_id: e.writer_id,
                        user_name: e.user_name,
                        name: e.name,
                        bio: String::new(),
                    },
                );
            }
            WriterEvent::WriterUpdated(e) => {
                let user_name = inner.user_names.get(&e.writer_id).cloned().ok_or_else(|| {
                    SubscriberError::new(format!(
                        "update for writer {} arrived before its registration",
                        e.writer_id
                    ))
                })?;
                if let Some(details) = inner.by_user_name.get_mut(&user_name) {
                    details.name = e.name;
                    details.bio = e.bio;
                }
            }
            // Project-catalogue events are not subscribed to; nothing else
            // should reach us.
            _ => {}
        }

        inner
            .cursors
            .insert(event.aggregate_id(), event.sequence_number());
        Ok(())
    }
}
