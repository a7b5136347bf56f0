use wordtrail_core::{AggregateId, CommandId};

/// A command targets a specific aggregate (command abstraction).
///
/// Commands represent **intent**: a request to perform an action on an
/// aggregate. They are **transient** (never persisted) and are transformed
/// into events (which are persisted) when accepted.
///
/// ## Command vs Event
///
/// - **Command**: intent to do something (e.g. "update the word count")
/// - **Event**: fact that something happened (e.g. "WordCountUpdated")
///
/// Commands are rejected if invalid; events represent accepted changes.
///
/// ## Aggregate targeting
///
/// `target_aggregate_id()` names the aggregate instance the command operates
/// on. For creation commands this is the identity the new aggregate will be
/// created under (author-assigned). Each command operates on exactly one
/// aggregate; that is the transaction boundary, and it is what lets
/// different aggregates process commands concurrently.
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Correlation identifier, carried into every event this command produces.
    fn command_id(&self) -> CommandId;

    fn target_aggregate_id(&self) -> AggregateId;
}
