//! Society ledger: every money movement of a tenant flattened into
//! [`LedgerRecord`]s, the input of all reports.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use sahakari_core::TenantId;
use sahakari_events::EventEnvelope;
use sahakari_loans::{LoanEvent, LOAN_AGGREGATE_TYPE};
use sahakari_passbook::{PassbookEvent, PASSBOOK_AGGREGATE_TYPE};
use sahakari_reports::{FundDirection, LedgerDetail, LedgerRecord};
use sahakari_treasury::{
    AdminFundEvent, ExpenseEvent, ADMIN_FUND_AGGREGATE_TYPE, EXPENSE_LEDGER_AGGREGATE_TYPE,
};

use super::cursor::StreamCursors;
use super::{decode, replay_order, ProjectionError};

#[derive(Debug, Clone)]
struct Row {
    occurred_at: DateTime<Utc>,
    record: LedgerRecord,
}

#[derive(Debug, Default)]
pub struct SocietyLedgerProjection {
    rows: RwLock<HashMap<TenantId, Vec<Row>>>,
    cursors: StreamCursors,
}

impl SocietyLedgerProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live records ordered by date, then by the time they were recorded.
    pub fn records(&self, tenant_id: TenantId) -> Vec<LedgerRecord> {
        let Ok(rows) = self.rows.read() else {
            return vec![];
        };
        let mut out: Vec<&Row> = rows.get(&tenant_id).map(|r| r.iter().collect()).unwrap_or_default();
        out.sort_by(|a, b| {
            a.record
                .date
                .cmp(&b.record.date)
                .then(a.occurred_at.cmp(&b.occurred_at))
        });
        out.into_iter().map(|r| r.record.clone()).collect()
    }

    pub fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        let tenant_id = envelope.tenant_id();
        let relevant = matches!(
            envelope.aggregate_type(),
            PASSBOOK_AGGREGATE_TYPE
                | LOAN_AGGREGATE_TYPE
                | EXPENSE_LEDGER_AGGREGATE_TYPE
                | ADMIN_FUND_AGGREGATE_TYPE
        );
        if !relevant {
            return Ok(());
        }

        self.cursors
            .advance_with(tenant_id, envelope.aggregate_id(), envelope.sequence_number(), || {
                let change = match envelope.aggregate_type() {
                    PASSBOOK_AGGREGATE_TYPE => {
                        let event: PassbookEvent = decode(envelope)?;
                        check_tenant(event.tenant_id(), tenant_id)?;
                        from_passbook(event)
                    }
                    LOAN_AGGREGATE_TYPE => {
                        let event: LoanEvent = decode(envelope)?;
                        check_tenant(event.tenant_id(), tenant_id)?;
                        from_loan(event)
                    }
                    EXPENSE_LEDGER_AGGREGATE_TYPE => {
                        let event: ExpenseEvent = decode(envelope)?;
                        check_tenant(event.tenant_id(), tenant_id)?;
                        from_expense(event)
                    }
                    _ => {
                        let event: AdminFundEvent = decode(envelope)?;
                        check_tenant(event.tenant_id(), tenant_id)?;
                        from_admin_fund(event)
                    }
                };

                let mut rows = self.rows.write().map_err(|_| ProjectionError::Poisoned)?;
                let tenant_rows = rows.entry(tenant_id).or_default();
                match change {
                    Change::Add(row) => tenant_rows.push(row),
                    Change::Remove(id) => tenant_rows.retain(|r| r.record.record_id() != id),
                    Change::Nothing => {}
                }
                Ok(())
            })?;

        Ok(())
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
        if let Ok(mut rows) = self.rows.write() {
            rows.remove(&tenant_id);
        }
        self.cursors.clear_tenant(tenant_id);
    }
}

enum Change {
    Add(Row),
    Remove(Uuid),
    Nothing,
}

fn check_tenant(event_tenant: TenantId, envelope_tenant: TenantId) -> Result<(), ProjectionError> {
    if event_tenant != envelope_tenant {
        return Err(ProjectionError::tenant_mismatch());
    }
    Ok(())
}

fn add(occurred_at: DateTime<Utc>, record: LedgerRecord) -> Change {
    Change::Add(Row { occurred_at, record })
}

fn from_passbook(event: PassbookEvent) -> Change {
    match event {
        PassbookEvent::EntryRecorded(e) => add(
            e.occurred_at,
            LedgerRecord::new(
                e.entry_date,
                e.amount,
                LedgerDetail::Passbook {
                    member_id: e.member_id,
                    entry_id: e.entry_id,
                    kind: e.kind,
                    mode: e.mode,
                },
            )
            .with_note(e.note),
        ),
        PassbookEvent::EntryReversed(e) => Change::Remove(e.entry_id),
    }
}

fn from_expense(event: ExpenseEvent) -> Change {
    match event {
        ExpenseEvent::Recorded(e) => add(
            e.occurred_at,
            LedgerRecord::new(
                e.spent_on,
                e.amount,
                LedgerDetail::Expense {
                    expense_id: e.expense_id,
                    category: e.category,
                    mode: e.mode,
                },
            )
            .with_note(e.description),
        ),
        ExpenseEvent::Reversed(e) => Change::Remove(e.expense_id),
    }
}

fn from_admin_fund(event: AdminFundEvent) -> Change {
    let movement = |e: sahakari_treasury::FundMovement, direction| {
        add(
            e.occurred_at,
            LedgerRecord::new(
                e.on,
                e.amount,
                LedgerDetail::AdminFund {
                    movement_id: e.movement_id,
                    direction,
                    mode: e.mode,
                },
            )
            .with_note(e.note),
        )
    };

    match event {
        AdminFundEvent::FundsInjected(e) => movement(e, FundDirection::Inject),
        AdminFundEvent::FundsWithdrawn(e) => movement(e, FundDirection::Withdraw),
        AdminFundEvent::FundsTransferred(e) => add(
            e.occurred_at,
            LedgerRecord::new(
                e.on,
                e.amount,
                LedgerDetail::Transfer {
                    movement_id: e.movement_id,
                    from: e.from,
                    to: e.to,
                },
            )
            .with_note(e.note),
        ),
    }
}

fn from_loan(event: LoanEvent) -> Change {
    match event {
        LoanEvent::Issued(e) => add(
            e.occurred_at,
            LedgerRecord::new(
                e.issued_on,
                e.principal,
                LedgerDetail::LoanDisbursed {
                    loan_id: e.loan_id,
                    member_id: e.member_id,
                    mode: e.mode,
                },
            ),
        ),
        LoanEvent::RepaymentRecorded(e) => add(
            e.occurred_at,
            LedgerRecord::new(
                e.paid_on,
                e.principal + e.interest,
                LedgerDetail::LoanRepaid {
                    loan_id: e.loan_id,
                    member_id: e.member_id,
                    repayment_id: e.repayment_id,
                    principal: e.principal,
                    interest: e.interest,
                    mode: e.mode,
                },
            ),
        ),
        LoanEvent::Closed(_) => Change::Nothing,
    }
}
