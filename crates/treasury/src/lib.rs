//! Treasury module (event-sourced): society expenses and the admin's own
//! funds. Both are per-society singleton streams.

use sahakari_core::{DomainError, TenantId};

pub mod admin_fund;
pub mod expenses;

pub use admin_fund::{
    AdminFund, AdminFundCommand, AdminFundEvent, FundMovement, TransferFunds,
    ADMIN_FUND_AGGREGATE_TYPE, ADMIN_FUND_ID,
};
pub use expenses::{
    ExpenseCommand, ExpenseEvent, ExpenseLedger, ExpenseLine, ExpenseRecorded, ExpenseReversed,
    RecordExpense, ReverseExpense, EXPENSE_LEDGER_AGGREGATE_TYPE, EXPENSE_LEDGER_ID,
};

/// A singleton stream is claimed by the first tenant that writes to it.
pub(crate) fn ensure_tenant(owner: Option<TenantId>, tenant_id: TenantId) -> Result<(), DomainError> {
    match owner {
        Some(t) if t != tenant_id => Err(DomainError::invariant("tenant mismatch")),
        _ => Ok(()),
    }
}
