/// Execute an aggregate command deterministically (no IO, no persistence).
///
/// The canonical event-sourced lifecycle in one step:
///
/// 1. **Decide**: `aggregate.handle(command)` produces events (pure, no mutation)
/// 2. **Evolve**: each event is applied in order via `aggregate.apply(event)`
///
/// Useful in tests and inline flows that skip persistence; production paths
/// go through the dispatcher, which additionally persists and publishes.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: wordtrail_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
