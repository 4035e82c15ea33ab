//! Command execution pipeline.
//!
//! ```text
//! command
//!   → load stream (tenant-scoped) and check it
//!   → rehydrate aggregate
//!   → handle (pure decision)
//!   → append with ExpectedVersion::Exact(loaded revision)
//!   → publish committed envelopes
//! ```
//!
//! Publication happens only after a successful append. If publishing fails
//! the events are still stored; projections catch up on the next rebuild.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use sahakari_core::{Aggregate, AggregateId, DomainError, ExpectedVersion, TenantId};
use sahakari_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The stream moved between load and append.
    #[error("concurrency conflict: {0}")]
    Concurrency(String),
    /// Business-level conflict (duplicate id, repeated reversal, ...).
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invariant violated: {0}")]
    InvariantViolation(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    /// Stored payloads no longer match the aggregate's event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),
    #[error(transparent)]
    Store(EventStoreError),
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            EventStoreError::TenantIsolation(msg) => DispatchError::TenantIsolation(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl From<DomainError> for DispatchError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => DispatchError::Validation(msg),
            DomainError::InvariantViolation(msg) => DispatchError::InvariantViolation(msg),
            DomainError::Conflict(msg) => DispatchError::Conflict(msg),
            DomainError::Unauthorized => DispatchError::Unauthorized,
            DomainError::NotFound => DispatchError::NotFound,
        }
    }
}

/// Runs commands for any event-sourced aggregate against a store and a bus.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Execute `command` against the `(tenant_id, aggregate_id)` stream.
    ///
    /// `make_aggregate` builds the empty aggregate that history is folded into.
    /// Returns the committed events; an empty vec means the command decided
    /// nothing.
    #[instrument(
        skip(self, command, make_aggregate),
        fields(tenant_id = %tenant_id, aggregate_id = %aggregate_id, aggregate_type = %aggregate_type),
        err
    )]
    pub fn dispatch<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: sahakari_events::Event + Serialize + DeserializeOwned,
    {
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        let mut aggregate = make_aggregate(tenant_id, aggregate_id);
        apply_history(&mut aggregate, &history)?;

        let decided = aggregate.handle(&command)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(tenant_id, aggregate_id, aggregate_type, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;
        debug!(count = committed.len(), version = stream_version(&committed), "events appended");

        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }

    /// Load and rehydrate an aggregate without handling a command.
    pub fn load<A>(
        &self,
        tenant_id: TenantId,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(TenantId, AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(tenant_id, aggregate_id)?;
        validate_loaded_stream(tenant_id, aggregate_id, &history)?;

        let mut aggregate = make_aggregate(tenant_id, aggregate_id);
        apply_history(&mut aggregate, &history)?;
        Ok(aggregate)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

/// A backend must never hand back another tenant's events or a stream with
/// holes; refuse to rehydrate from one that does.
fn validate_loaded_stream(
    tenant_id: TenantId,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.tenant_id != tenant_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong tenant_id at index {idx}"
            )));
        }
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::TenantIsolation(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            )));
        }
        if e.sequence_number != last + 1 {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-contiguous sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveDate, Utc};
    use sahakari_core::{AggregateRoot, Money, PaymentMode};
    use sahakari_events::InMemoryEventBus;
    use sahakari_passbook::{
        passbook_stream_id, EntryKind, Passbook, PassbookCommand, RecordEntry, PASSBOOK_AGGREGATE_TYPE,
    };
    use sahakari_members::MemberId;

    use super::*;
    use crate::event_store::InMemoryEventStore;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

    fn dispatcher() -> (CommandDispatcher<Arc<InMemoryEventStore>, Bus>, Bus) {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        (CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), bus.clone()), bus)
    }

    fn deposit(tenant_id: TenantId, member_id: MemberId, paise: i64, kind: EntryKind) -> PassbookCommand {
        PassbookCommand::RecordEntry(RecordEntry {
            tenant_id,
            member_id,
            entry_id: Uuid::now_v7(),
            kind,
            amount: Money::from_paise(paise),
            mode: PaymentMode::Cash,
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            note: None,
            occurred_at: Utc::now(),
        })
    }

    fn run(
        d: &CommandDispatcher<Arc<InMemoryEventStore>, Bus>,
        t: TenantId,
        m: MemberId,
        cmd: PassbookCommand,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        d.dispatch::<Passbook>(t, passbook_stream_id(m), PASSBOOK_AGGREGATE_TYPE, cmd, |_, _| Passbook::empty(m))
    }

    #[test]
    fn dispatch_appends_then_publishes() {
        let (d, bus) = dispatcher();
        let sub = bus.subscribe();
        let (t, m) = (TenantId::new(), MemberId::new(AggregateId::new()));

        let committed = run(&d, t, m, deposit(t, m, 1_000, EntryKind::Deposit)).unwrap();
        assert_eq!(committed[0].sequence_number, 1);
        assert_eq!(committed[0].event_type, "passbook.member.entry_recorded");

        let env = sub.try_recv().unwrap();
        assert_eq!(env.sequence_number(), 1);
        assert_eq!(env.aggregate_type(), PASSBOOK_AGGREGATE_TYPE);
    }

    #[test]
    fn domain_errors_are_mapped_and_nothing_is_stored() {
        let (d, _bus) = dispatcher();
        let (t, m) = (TenantId::new(), MemberId::new(AggregateId::new()));

        let err = run(&d, t, m, deposit(t, m, 1, EntryKind::Withdrawal)).unwrap_err();
        assert!(matches!(err, DispatchError::InvariantViolation(_)));
        assert!(d.store().load_stream(t, passbook_stream_id(m)).unwrap().is_empty());
    }

    #[test]
    fn history_is_rehydrated_between_commands() {
        let (d, _bus) = dispatcher();
        let (t, m) = (TenantId::new(), MemberId::new(AggregateId::new()));

        run(&d, t, m, deposit(t, m, 5_000, EntryKind::Deposit)).unwrap();
        run(&d, t, m, deposit(t, m, 2_000, EntryKind::Withdrawal)).unwrap();
        assert!(run(&d, t, m, deposit(t, m, 3_001, EntryKind::Withdrawal)).is_err());

        let pb: Passbook = d.load(t, passbook_stream_id(m), |_, _| Passbook::empty(m)).unwrap();
        assert_eq!(pb.savings_balance(), Money::from_paise(3_000));
        assert_eq!(pb.version(), 2);
    }
}
