use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use sahakari_core::TenantId;
use sahakari_events::EventEnvelope;
use sahakari_members::{MemberEvent, MemberId, MemberStatus, MEMBER_AGGREGATE_TYPE};

use super::cursor::StreamCursors;
use super::{decode, replay_order, ProjectionError};
use crate::read_model::TenantStore;

/// Member directory row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberReadModel {
    pub member_id: MemberId,
    pub membership_no: String,
    pub name: String,
    pub phone: Option<String>,
    pub joined_on: NaiveDate,
    pub status: MemberStatus,
    pub status_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct MemberDirectoryProjection<S>
where
    S: TenantStore<MemberId, MemberReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> MemberDirectoryProjection<S>
where
    S: TenantStore<MemberId, MemberReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, member_id: &MemberId) -> Option<MemberReadModel> {
        self.store.get(tenant_id, member_id)
    }

    /// All members ordered by membership number.
    pub fn list(&self, tenant_id: TenantId) -> Vec<MemberReadModel> {
        let mut members = self.store.list(tenant_id);
        members.sort_by(|a, b| a.membership_no.cmp(&b.membership_no));
        members
    }

    pub fn active_count(&self, tenant_id: TenantId) -> usize {
        self.store
            .list(tenant_id)
            .iter()
            .filter(|m| m.status == MemberStatus::Active)
            .count()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != MEMBER_AGGREGATE_TYPE {
            return Ok(());
        }
        let tenant_id = envelope.tenant_id();

        self.cursors
            .advance_with(tenant_id, envelope.aggregate_id(), envelope.sequence_number(), || {
                let event: MemberEvent = decode(envelope)?;
                if event.tenant_id() != tenant_id {
                    return Err(ProjectionError::tenant_mismatch());
                }
                if event.member_id().0 != envelope.aggregate_id() {
                    return Err(ProjectionError::TenantIsolation(
                        "member_id does not match envelope aggregate_id".to_string(),
                    ));
                }
                self.apply(tenant_id, event);
                Ok(())
            })?;

        Ok(())
    }

    fn apply(&self, tenant_id: TenantId, event: MemberEvent) {
        match event {
            MemberEvent::Registered(e) => {
                self.store.upsert(
                    tenant_id,
                    e.member_id,
                    MemberReadModel {
                        member_id: e.member_id,
                        membership_no: e.membership_no,
                        name: e.name,
                        phone: e.phone,
                        joined_on: e.joined_on,
                        status: MemberStatus::Active,
                        status_reason: None,
                        updated_at: e.occurred_at,
                    },
                );
            }
            MemberEvent::Updated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.member_id) {
                    rm.name = e.name;
                    rm.phone = e.phone;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.member_id, rm);
                }
            }
            MemberEvent::Deactivated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.member_id) {
                    rm.status = MemberStatus::Inactive;
                    rm.status_reason = e.reason;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.member_id, rm);
                }
            }
            MemberEvent::Reactivated(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.member_id) {
                    rm.status = MemberStatus::Active;
                    rm.status_reason = None;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.member_id, rm);
                }
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
