//! Society-wide dashboard figures.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use sahakari_core::{basis_points, Money};
use sahakari_passbook::EntryKind;

use crate::liquidity::{liquidity_snapshot, LiquiditySnapshot};
use crate::loan_book::{loan_book, LoanBookTotals};
use crate::profit::{profit_and_loss, Period, ProfitAndLoss};
use crate::record::{FundDirection, LedgerDetail, LedgerRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocietySummary {
    pub as_of: Option<NaiveDate>,
    pub member_count: usize,
    pub total_deposits: Money,
    pub total_withdrawals: Money,
    pub net_savings: Money,
    pub liquidity: LiquiditySnapshot,
    pub loans: LoanBookTotals,
    pub profit: ProfitAndLoss,
    pub admin_injected: Money,
    pub admin_withdrawn: Money,
    pub admin_net_contribution: Money,
    /// Outstanding loans over net savings, in basis points.
    pub loan_to_deposit_bp: Option<i64>,
    /// Principal repaid over principal disbursed, in basis points.
    pub recovery_rate_bp: Option<i64>,
    /// Net profit over income, in basis points.
    pub profit_margin_bp: Option<i64>,
}

/// Every figure is computed over records dated on or before `as_of`.
pub fn society_summary(
    records: &[LedgerRecord],
    member_count: usize,
    as_of: Option<NaiveDate>,
) -> SocietySummary {
    let in_scope: Vec<LedgerRecord> = match as_of {
        Some(cutoff) => records.iter().filter(|r| r.date <= cutoff).cloned().collect(),
        None => records.to_vec(),
    };

    let mut total_deposits = Money::ZERO;
    let mut total_withdrawals = Money::ZERO;
    let mut admin_injected = Money::ZERO;
    let mut admin_withdrawn = Money::ZERO;

    for record in &in_scope {
        match &record.detail {
            LedgerDetail::Passbook { kind, .. } => match kind {
                EntryKind::Deposit => total_deposits += record.amount,
                EntryKind::Withdrawal => total_withdrawals += record.amount,
                EntryKind::Interest | EntryKind::Fine => {}
            },
            LedgerDetail::AdminFund { direction, .. } => match direction {
                FundDirection::Inject => admin_injected += record.amount,
                FundDirection::Withdraw => admin_withdrawn += record.amount,
            },
            _ => {}
        }
    }

    let net_savings = total_deposits - total_withdrawals;
    let loans = loan_book(&in_scope).totals;
    let profit = profit_and_loss(&in_scope, as_of.map_or_else(Period::all_time, Period::until));

    SocietySummary {
        as_of,
        member_count,
        total_deposits,
        total_withdrawals,
        net_savings,
        liquidity: liquidity_snapshot(&in_scope, as_of),
        loan_to_deposit_bp: basis_points(loans.outstanding, net_savings),
        recovery_rate_bp: basis_points(loans.principal_repaid, loans.disbursed),
        profit_margin_bp: basis_points(profit.net_profit, profit.total_income),
        loans,
        profit,
        admin_injected,
        admin_withdrawn,
        admin_net_contribution: admin_injected - admin_withdrawn,
    }
}
