use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use sahakari_core::{Money, PaymentMode, TenantId};
use sahakari_events::EventEnvelope;
use sahakari_loans::{monthly_interest, LoanEvent, LoanId, LoanStatus, LOAN_AGGREGATE_TYPE};
use sahakari_members::MemberId;

use super::cursor::StreamCursors;
use super::{decode, replay_order, ProjectionError};
use crate::read_model::TenantStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepaymentRow {
    pub repayment_id: Uuid,
    pub principal: Money,
    pub interest: Money,
    pub mode: PaymentMode,
    pub paid_on: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanReadModel {
    pub loan_id: LoanId,
    pub member_id: MemberId,
    pub principal: Money,
    pub annual_rate_bp: u32,
    pub tenure_months: u32,
    pub mode: PaymentMode,
    pub issued_on: NaiveDate,
    pub status: LoanStatus,
    pub closed_on: Option<NaiveDate>,
    pub repayments: Vec<RepaymentRow>,
    pub principal_repaid: Money,
    pub interest_paid: Money,
    pub outstanding: Money,
    pub monthly_interest_due: Money,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct LoanBookProjection<S>
where
    S: TenantStore<LoanId, LoanReadModel>,
{
    store: S,
    cursors: StreamCursors,
}

impl<S> LoanBookProjection<S>
where
    S: TenantStore<LoanId, LoanReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, loan_id: &LoanId) -> Option<LoanReadModel> {
        self.store.get(tenant_id, loan_id)
    }

    /// All loans, oldest issue date first.
    pub fn list(&self, tenant_id: TenantId) -> Vec<LoanReadModel> {
        let mut loans = self.store.list(tenant_id);
        loans.sort_by(|a, b| a.issued_on.cmp(&b.issued_on).then(a.loan_id.cmp(&b.loan_id)));
        loans
    }

    pub fn for_member(&self, tenant_id: TenantId, member_id: MemberId) -> Vec<LoanReadModel> {
        self.list(tenant_id)
            .into_iter()
            .filter(|l| l.member_id == member_id)
            .collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != LOAN_AGGREGATE_TYPE {
            return Ok(());
        }
        let tenant_id = envelope.tenant_id();

        self.cursors
            .advance_with(tenant_id, envelope.aggregate_id(), envelope.sequence_number(), || {
                let event: LoanEvent = decode(envelope)?;
                if event.tenant_id() != tenant_id {
                    return Err(ProjectionError::tenant_mismatch());
                }
                if event.loan_id().0 != envelope.aggregate_id() {
                    return Err(ProjectionError::TenantIsolation(
                        "loan_id does not match envelope aggregate_id".to_string(),
                    ));
                }
                self.apply(tenant_id, event);
                Ok(())
            })?;

        Ok(())
    }

    fn apply(&self, tenant_id: TenantId, event: LoanEvent) {
        match event {
            LoanEvent::Issued(e) => {
                self.store.upsert(
                    tenant_id,
                    e.loan_id,
                    LoanReadModel {
                        loan_id: e.loan_id,
                        member_id: e.member_id,
                        principal: e.principal,
                        annual_rate_bp: e.annual_rate_bp,
                        tenure_months: e.tenure_months,
                        mode: e.mode,
                        issued_on: e.issued_on,
                        status: LoanStatus::Open,
                        closed_on: None,
                        repayments: Vec::new(),
                        principal_repaid: Money::ZERO,
                        interest_paid: Money::ZERO,
                        outstanding: e.principal,
                        monthly_interest_due: monthly_interest(e.principal, e.annual_rate_bp),
                        updated_at: e.occurred_at,
                    },
                );
            }
            LoanEvent::RepaymentRecorded(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.loan_id) {
                    rm.principal_repaid += e.principal;
                    rm.interest_paid += e.interest;
                    rm.outstanding = rm.principal - rm.principal_repaid;
                    rm.monthly_interest_due = monthly_interest(rm.outstanding, rm.annual_rate_bp);
                    rm.repayments.push(RepaymentRow {
                        repayment_id: e.repayment_id,
                        principal: e.principal,
                        interest: e.interest,
                        mode: e.mode,
                        paid_on: e.paid_on,
                    });
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.loan_id, rm);
                }
            }
            LoanEvent::Closed(e) => {
                if let Some(mut rm) = self.store.get(tenant_id, &e.loan_id) {
                    rm.status = LoanStatus::Closed;
                    rm.closed_on = Some(e.closed_on);
                    rm.monthly_interest_due = Money::ZERO;
                    rm.updated_at = e.occurred_at;
                    self.store.upsert(tenant_id, e.loan_id, rm);
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
