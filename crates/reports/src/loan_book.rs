//! Outstanding loans built from disbursement and repayment records.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use sahakari_core::Money;
use sahakari_loans::LoanId;
use sahakari_members::MemberId;

use crate::record::{LedgerDetail, LedgerRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanPosition {
    pub loan_id: LoanId,
    pub member_id: MemberId,
    pub disbursed_on: Option<NaiveDate>,
    pub disbursed: Money,
    pub principal_repaid: Money,
    pub interest_collected: Money,
    pub outstanding: Money,
    pub last_payment_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanBookTotals {
    pub loan_count: usize,
    pub disbursed: Money,
    pub principal_repaid: Money,
    pub interest_collected: Money,
    pub outstanding: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanBook {
    /// Ordered by disbursement date, then loan id.
    pub loans: Vec<LoanPosition>,
    pub totals: LoanBookTotals,
}

pub fn loan_book(records: &[LedgerRecord]) -> LoanBook {
    let mut by_loan: BTreeMap<LoanId, LoanPosition> = BTreeMap::new();

    for record in records {
        match &record.detail {
            LedgerDetail::LoanDisbursed {
                loan_id, member_id, ..
            } => {
                let pos = by_loan
                    .entry(*loan_id)
                    .or_insert_with(|| empty_position(*loan_id, *member_id));
                pos.disbursed += record.amount;
                pos.disbursed_on = Some(pos.disbursed_on.map_or(record.date, |d| d.min(record.date)));
            }
            LedgerDetail::LoanRepaid {
                loan_id,
                member_id,
                principal,
                interest,
                ..
            } => {
                let pos = by_loan
                    .entry(*loan_id)
                    .or_insert_with(|| empty_position(*loan_id, *member_id));
                pos.principal_repaid += *principal;
                pos.interest_collected += *interest;
                pos.last_payment_on = Some(pos.last_payment_on.map_or(record.date, |d| d.max(record.date)));
            }
            _ => {}
        }
    }

    let mut loans: Vec<LoanPosition> = by_loan
        .into_values()
        .map(|mut pos| {
            pos.outstanding = pos.disbursed - pos.principal_repaid;
            pos
        })
        .collect();
    loans.sort_by(|a, b| (a.disbursed_on, a.loan_id).cmp(&(b.disbursed_on, b.loan_id)));

    let totals = loans.iter().fold(
        LoanBookTotals {
            loan_count: loans.len(),
            ..LoanBookTotals::default()
        },
        |mut t, pos| {
            t.disbursed += pos.disbursed;
            t.principal_repaid += pos.principal_repaid;
            t.interest_collected += pos.interest_collected;
            t.outstanding += pos.outstanding;
            t
        },
    );

    LoanBook { loans, totals }
}

fn empty_position(loan_id: LoanId, member_id: MemberId) -> LoanPosition {
    LoanPosition {
        loan_id,
        member_id,
        disbursed_on: None,
        disbursed: Money::ZERO,
        principal_repaid: Money::ZERO,
        interest_collected: Money::ZERO,
        outstanding: Money::ZERO,
        last_payment_on: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sahakari_core::{AggregateId, PaymentMode};
    use uuid::Uuid;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, d).unwrap()
    }

    fn disbursed(loan_id: LoanId, member_id: MemberId, d: u32, paise: i64) -> LedgerRecord {
        LedgerRecord::new(
            day(d),
            Money::from_paise(paise),
            LedgerDetail::LoanDisbursed {
                loan_id,
                member_id,
                mode: PaymentMode::Bank,
            },
        )
    }

    fn repaid(loan_id: LoanId, member_id: MemberId, d: u32, principal: i64, interest: i64) -> LedgerRecord {
        LedgerRecord::new(
            day(d),
            Money::from_paise(principal + interest),
            LedgerDetail::LoanRepaid {
                loan_id,
                member_id,
                repayment_id: Uuid::now_v7(),
                principal: Money::from_paise(principal),
                interest: Money::from_paise(interest),
                mode: PaymentMode::Cash,
            },
        )
    }

    #[test]
    fn outstanding_per_loan_and_totals() {
        let m = MemberId::new(AggregateId::new());
        let a = LoanId::new(AggregateId::new());
        let b = LoanId::new(AggregateId::new());

        let records = vec![
            disbursed(b, m, 10, 50_000),
            disbursed(a, m, 3, 100_000),
            repaid(a, m, 12, 25_000, 1_000),
            repaid(a, m, 20, 25_000, 750),
            repaid(b, m, 21, 0, 400),
        ];

        let book = loan_book(&records);
        assert_eq!(book.loans.len(), 2);
        assert_eq!(book.loans[0].loan_id, a);
        assert_eq!(book.loans[0].outstanding, Money::from_paise(50_000));
        assert_eq!(book.loans[0].last_payment_on, Some(day(20)));
        assert_eq!(book.loans[1].outstanding, Money::from_paise(50_000));

        assert_eq!(book.totals.loan_count, 2);
        assert_eq!(book.totals.disbursed, Money::from_paise(150_000));
        assert_eq!(book.totals.principal_repaid, Money::from_paise(50_000));
        assert_eq!(book.totals.interest_collected, Money::from_paise(2_150));
        assert_eq!(book.totals.outstanding, Money::from_paise(100_000));
    }

    #[test]
    fn no_loans_gives_empty_book() {
        let book = loan_book(&[]);
        assert!(book.loans.is_empty());
        assert_eq!(book.totals, LoanBookTotals::default());
    }
}
