use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use sahakari_core::{Money, PaymentMode, TenantId};
use sahakari_events::EventEnvelope;
use sahakari_members::MemberId;
use sahakari_passbook::{passbook_stream_id, EntryKind, PassbookEvent, PASSBOOK_AGGREGATE_TYPE};

use super::cursor::StreamCursors;
use super::{decode, replay_order, ProjectionError};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassbookEntryRow {
    pub entry_id: Uuid,
    pub kind: EntryKind,
    pub amount: Money,
    pub mode: PaymentMode,
    pub entry_date: NaiveDate,
    pub note: Option<String>,
    pub reversed: bool,
    pub reversal_reason: Option<String>,
}

/// A member's passbook: live lines plus reversed ones (flagged).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassbookReadModel {
    pub member_id: MemberId,
    pub entries: Vec<PassbookEntryRow>,
    pub savings_balance: Money,
    pub total_interest: Money,
    pub total_fines: Money,
    pub updated_at: DateTime<Utc>,
}

impl PassbookReadModel {
    fn empty(member_id: MemberId, at: DateTime<Utc>) -> Self {
        Self {
            member_id,
            entries: Vec::new(),
            savings_balance: Money::ZERO,
            total_interest: Money::ZERO,
            total_fines: Money::ZERO,
            updated_at: at,
        }
    }

    fn book(&mut self, kind: EntryKind, amount: Money) {
        self.savings_balance += kind.savings_effect(amount);
        match kind {
            EntryKind::Interest => self.total_interest += amount,
            EntryKind::Fine => self.total_fines += amount,
            EntryKind::Deposit | EntryKind::Withdrawal => {}
        }
    }
}

#[derive(Debug)]
pub struct PassbookProjection<S>
where
    S: TenantStore<MemberId, PassbookReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> PassbookProjection<S>
where
    S: TenantStore<MemberId, PassbookReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, member_id: &MemberId) -> Option<PassbookReadModel> {
        self.store.get(tenant_id, member_id)
    }

    pub fn list(&self, tenant_id: TenantId) -> Vec<PassbookReadModel> {
        self.store.list(tenant_id)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != PASSBOOK_AGGREGATE_TYPE {
            return Ok(());
        }
        let tenant_id = envelope.tenant_id();

        self.cursors
            .advance_with(tenant_id, envelope.aggregate_id(), envelope.sequence_number(), || {
                let event: PassbookEvent = decode(envelope)?;
                if event.tenant_id() != tenant_id {
                    return Err(ProjectionError::tenant_mismatch());
                }
                if passbook_stream_id(event.member_id()) != envelope.aggregate_id() {
                    return Err(ProjectionError::TenantIsolation(
                        "member_id does not match the passbook stream".to_string(),
                    ));
                }
                self.apply(tenant_id, event);
                Ok(())
            })?;

        Ok(())
    }

    fn apply(&self, tenant_id: TenantId, event: PassbookEvent) {
        match event {
            PassbookEvent::EntryRecorded(e) => {
                let mut rm = self
                    .store
                    .get(tenant_id, &e.member_id)
                    .unwrap_or_else(|| PassbookReadModel::empty(e.member_id, e.occurred_at));
                rm.book(e.kind, e.amount);
                rm.entries.push(PassbookEntryRow {
                    entry_id: e.entry_id,
                    kind: e.kind,
                    amount: e.amount,
                    mode: e.mode,
                    entry_date: e.entry_date,
                    note: e.note,
                    reversed: false,
                    reversal_reason: None,
                });
                rm.updated_at = e.occurred_at;
                self.store.upsert(tenant_id, e.member_id, rm);
            }
            PassbookEvent::EntryReversed(e) => {
                let Some(mut rm) = self.store.get(tenant_id, &e.member_id) else {
                    return;
                };
                if let Some(row) = rm.entries.iter_mut().find(|r| r.entry_id == e.entry_id && !r.reversed) {
                    row.reversed = true;
                    row.reversal_reason = e.reason;
                    rm.book(e.kind, -e.amount);
                }
                rm.updated_at = e.occurred_at;
                self.store.upsert(tenant_id, e.member_id, rm);
            }
        }
    }

    /// Drop the tenant's view and replay `envelopes` into it.
    pub fn rebuild_from_scratch(
        &self,
        tenant_id: TenantId,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ProjectionError> {
        self.reset_tenant(tenant_id);
        for env in replay_order(tenant_id, envelopes) {
            self.apply_envelope(&env)?;
        }
        Ok(())
    }

    pub fn reset_tenant(&self, tenant_id: TenantId) {
        self.store.clear_tenant(tenant_id);
        self.cursors.clear_tenant(tenant_id);
    }
}
