use chrono::{DateTime, Utc};

/// A fact recorded by a society aggregate.
///
/// Events are immutable, versioned for schema evolution, and only ever appended.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable type name, e.g. `"passbook.member.entry_recorded"`.
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// Business time the event refers to.
    fn occurred_at(&self) -> DateTime<Utc>;
}
