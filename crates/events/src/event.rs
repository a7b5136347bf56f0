use wordtrail_core::CommandId;

/// A domain-agnostic event.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - designed to be **append-only**
///
/// Commit timestamps are deliberately absent here: they are assigned by the
/// event store at persistence time, not by the event's producer.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "writer.registered").
    fn event_type(&self) -> &'static str;

    /// Correlation identifier of the command that produced this event.
    fn command_id(&self) -> CommandId;
}
