//! Income, expenses and net profit over a period.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use sahakari_core::Money;
use sahakari_passbook::EntryKind;

use crate::error::ReportError;
use crate::record::{LedgerDetail, LedgerRecord};

/// Inclusive date range; an open end is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl Period {
    pub fn new(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Self, ReportError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(ReportError::InvalidPeriod { from, to });
            }
        }
        Ok(Self { from, to })
    }

    pub fn all_time() -> Self {
        Self::default()
    }

    pub fn until(to: NaiveDate) -> Self {
        Self { from: None, to: Some(to) }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|f| date >= f) && self.to.is_none_or(|t| date <= t)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfitAndLoss {
    pub period: Period,
    /// Interest members paid through their passbooks.
    pub passbook_interest: Money,
    pub fines: Money,
    pub loan_interest: Money,
    pub total_income: Money,
    pub expenses_by_category: BTreeMap<String, Money>,
    pub total_expenses: Money,
    pub net_profit: Money,
}

pub fn profit_and_loss(records: &[LedgerRecord], period: Period) -> ProfitAndLoss {
    let mut passbook_interest = Money::ZERO;
    let mut fines = Money::ZERO;
    let mut loan_interest = Money::ZERO;
    let mut expenses_by_category: BTreeMap<String, Money> = BTreeMap::new();

    for record in records.iter().filter(|r| period.contains(r.date)) {
        match &record.detail {
            LedgerDetail::Passbook {
                kind: EntryKind::Interest,
                ..
            } => passbook_interest += record.amount,
            LedgerDetail::Passbook {
                kind: EntryKind::Fine,
                ..
            } => fines += record.amount,
            LedgerDetail::LoanRepaid { interest, .. } => loan_interest += *interest,
            LedgerDetail::Expense { category, .. } => {
                *expenses_by_category.entry(category.clone()).or_default() += record.amount;
            }
            _ => {}
        }
    }

    let total_income = passbook_interest + fines + loan_interest;
    let total_expenses: Money = expenses_by_category.values().sum();

    ProfitAndLoss {
        period,
        passbook_interest,
        fines,
        loan_interest,
        total_income,
        expenses_by_category,
        total_expenses,
        net_profit: total_income - total_expenses,
    }
}
