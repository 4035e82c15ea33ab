use sahakari_core::Aggregate;

/// Decide and apply a command in one step, without a store or bus.
///
/// Mutates `aggregate` in place and returns the events it absorbed. Used by
/// domain unit tests and anywhere a command must be checked inline; the
/// persisted path goes through the infra `CommandDispatcher`.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: Aggregate,
{
    let events = aggregate.handle(command)?;
    for ev in &events {
        aggregate.apply(ev);
    }
    Ok(events)
}
