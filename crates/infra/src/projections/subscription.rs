use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use sahakari_billing::{
    status_at, Plan, SubscriptionEvent, SubscriptionStatus, SUBSCRIPTION_AGGREGATE_TYPE, SUBSCRIPTION_ID,
};
use sahakari_core::{AggregateId, Money, TenantId};
use sahakari_events::EventEnvelope;

use super::cursor::StreamCursors;
use super::{decode, replay_order, ProjectionError};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionPayment {
    pub plan: Plan,
    pub amount: Money,
    pub paid_at: DateTime<Utc>,
    pub payment_reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionReadModel {
    pub plan: Plan,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancel_reason: Option<String>,
    pub total_paid: Money,
    pub payments: Vec<SubscriptionPayment>,
}

impl SubscriptionReadModel {
    pub fn status(&self, now: DateTime<Utc>) -> SubscriptionStatus {
        status_at(Some(self.expires_at), self.cancelled_at, now)
    }
}

#[derive(Debug)]
pub struct SubscriptionProjection<S>
where
    S: TenantStore<AggregateId, SubscriptionReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> SubscriptionProjection<S>
where
    S: TenantStore<AggregateId, SubscriptionReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId) -> Option<SubscriptionReadModel> {
        self.store.get(tenant_id, &SUBSCRIPTION_ID)
    }

    /// `None` status when the society never subscribed.
    pub fn status(&self, tenant_id: TenantId, now: DateTime<Utc>) -> SubscriptionStatus {
        self.get(tenant_id)
            .map(|s| s.status(now))
            .unwrap_or(SubscriptionStatus::None)
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != SUBSCRIPTION_AGGREGATE_TYPE {
            return Ok(());
        }
        let tenant_id = envelope.tenant_id();

        self.cursors
            .advance_with(tenant_id, envelope.aggregate_id(), envelope.sequence_number(), || {
                let event: SubscriptionEvent = decode(envelope)?;
                if event.tenant_id() != tenant_id {
                    return Err(ProjectionError::tenant_mismatch());
                }
                self.apply(tenant_id, event);
                Ok(())
            })?;

        Ok(())
    }

    fn apply(&self, tenant_id: TenantId, event: SubscriptionEvent) {
        let current = self.store.get(tenant_id, &SUBSCRIPTION_ID);
        let next = match (current, event) {
            (current, SubscriptionEvent::Started(e)) => {
                let mut payments = current.map(|c| c.payments).unwrap_or_default();
                payments.push(SubscriptionPayment {
                    plan: e.plan,
                    amount: e.amount,
                    paid_at: e.started_at,
                    payment_reference: e.payment_reference,
                });
                SubscriptionReadModel {
                    plan: e.plan,
                    started_at: e.started_at,
                    expires_at: e.expires_at,
                    cancelled_at: None,
                    cancel_reason: None,
                    total_paid: payments.iter().map(|p| p.amount).sum(),
                    payments,
                }
            }
            (Some(mut rm), SubscriptionEvent::Renewed(e)) => {
                rm.plan = e.plan;
                rm.expires_at = e.expires_at;
                rm.total_paid += e.amount;
                rm.payments.push(SubscriptionPayment {
                    plan: e.plan,
                    amount: e.amount,
                    paid_at: e.renewed_at,
                    payment_reference: e.payment_reference,
                });
                rm
            }
            (Some(mut rm), SubscriptionEvent::Cancelled(e)) => {
                rm.cancelled_at = Some(e.cancelled_at);
                rm.cancel_reason = e.reason;
                rm
            }
            (None, _) => return,
        };
        self.store.upsert(tenant_id, SUBSCRIPTION_ID, next);
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
