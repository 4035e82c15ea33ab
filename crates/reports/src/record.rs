//! Normalized ledger records: every money movement in a society, flattened
//! into one shape the reports can fold over.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sahakari_core::{Money, PaymentMode};
use sahakari_loans::LoanId;
use sahakari_members::MemberId;
use sahakari_passbook::EntryKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FundDirection {
    Inject,
    Withdraw,
}

/// What kind of movement a record is, with the facts specific to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerDetail {
    Passbook {
        member_id: MemberId,
        entry_id: Uuid,
        kind: EntryKind,
        mode: PaymentMode,
    },
    Expense {
        expense_id: Uuid,
        category: String,
        mode: PaymentMode,
    },
    AdminFund {
        movement_id: Uuid,
        direction: FundDirection,
        mode: PaymentMode,
    },
    Transfer {
        movement_id: Uuid,
        from: PaymentMode,
        to: PaymentMode,
    },
    LoanDisbursed {
        loan_id: LoanId,
        member_id: MemberId,
        mode: PaymentMode,
    },
    LoanRepaid {
        loan_id: LoanId,
        member_id: MemberId,
        repayment_id: Uuid,
        principal: Money,
        interest: Money,
        mode: PaymentMode,
    },
}

/// One money movement. `amount` is always positive; direction comes from the
/// detail. For `LoanRepaid` it is `principal + interest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub date: NaiveDate,
    pub amount: Money,
    pub note: Option<String>,
    #[serde(flatten)]
    pub detail: LedgerDetail,
}

impl LedgerRecord {
    pub fn new(date: NaiveDate, amount: Money, detail: LedgerDetail) -> Self {
        Self {
            date,
            amount,
            note: None,
            detail,
        }
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }

    /// Identifier of the underlying entry, expense, movement or repayment.
    pub fn record_id(&self) -> Uuid {
        match &self.detail {
            LedgerDetail::Passbook { entry_id, .. } => *entry_id,
            LedgerDetail::Expense { expense_id, .. } => *expense_id,
            LedgerDetail::AdminFund { movement_id, .. } => *movement_id,
            LedgerDetail::Transfer { movement_id, .. } => *movement_id,
            LedgerDetail::LoanDisbursed { loan_id, .. } => *loan_id.0.as_uuid(),
            LedgerDetail::LoanRepaid { repayment_id, .. } => *repayment_id,
        }
    }

    pub fn member_id(&self) -> Option<MemberId> {
        match &self.detail {
            LedgerDetail::Passbook { member_id, .. }
            | LedgerDetail::LoanDisbursed { member_id, .. }
            | LedgerDetail::LoanRepaid { member_id, .. } => Some(*member_id),
            _ => None,
        }
    }

    /// Short label used in exports.
    pub fn type_label(&self) -> &'static str {
        match &self.detail {
            LedgerDetail::Passbook { kind, .. } => kind.as_str(),
            LedgerDetail::Expense { .. } => "expense",
            LedgerDetail::AdminFund {
                direction: FundDirection::Inject,
                ..
            } => "admin_injection",
            LedgerDetail::AdminFund {
                direction: FundDirection::Withdraw,
                ..
            } => "admin_withdrawal",
            LedgerDetail::Transfer { .. } => "transfer",
            LedgerDetail::LoanDisbursed { .. } => "loan_disbursed",
            LedgerDetail::LoanRepaid { .. } => "loan_repaid",
        }
    }

    /// Signed effect on each payment mode's pool. Transfers touch two modes.
    pub fn flows(&self) -> Flows {
        let inflow = |mode| Flows::one(mode, self.amount);
        let outflow = |mode| Flows::one(mode, -self.amount);

        match &self.detail {
            LedgerDetail::Passbook { kind, mode, .. } => match kind {
                EntryKind::Withdrawal => outflow(*mode),
                EntryKind::Deposit | EntryKind::Interest | EntryKind::Fine => inflow(*mode),
            },
            LedgerDetail::Expense { mode, .. } => outflow(*mode),
            LedgerDetail::AdminFund { direction, mode, .. } => match direction {
                FundDirection::Inject => inflow(*mode),
                FundDirection::Withdraw => outflow(*mode),
            },
            LedgerDetail::Transfer { from, to, .. } => Flows {
                first: Some((*from, -self.amount)),
                second: Some((*to, self.amount)),
            },
            LedgerDetail::LoanDisbursed { mode, .. } => outflow(*mode),
            LedgerDetail::LoanRepaid { mode, .. } => inflow(*mode),
        }
    }
}

/// Up to two signed `(mode, amount)` movements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flows {
    first: Option<(PaymentMode, Money)>,
    second: Option<(PaymentMode, Money)>,
}

impl Flows {
    fn one(mode: PaymentMode, amount: Money) -> Self {
        Self {
            first: Some((mode, amount)),
            second: None,
        }
    }
}

impl Iterator for Flows {
    type Item = (PaymentMode, Money);

    fn next(&mut self) -> Option<Self::Item> {
        self.first.take().or_else(|| self.second.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sahakari_core::AggregateId;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn transfer_flows_cancel_out() {
        let r = LedgerRecord::new(
            date(),
            Money::from_paise(700),
            LedgerDetail::Transfer {
                movement_id: Uuid::now_v7(),
                from: PaymentMode::Cash,
                to: PaymentMode::Bank,
            },
        );
        let flows: Vec<_> = r.flows().collect();
        assert_eq!(
            flows,
            vec![
                (PaymentMode::Cash, Money::from_paise(-700)),
                (PaymentMode::Bank, Money::from_paise(700)),
            ]
        );
        assert_eq!(flows.iter().map(|(_, m)| *m).sum::<Money>(), Money::ZERO);
    }

    #[test]
    fn serializes_flat_with_type_tag() {
        let member_id = MemberId::new(AggregateId::new());
        let r = LedgerRecord::new(
            date(),
            Money::from_paise(100),
            LedgerDetail::Passbook {
                member_id,
                entry_id: Uuid::now_v7(),
                kind: EntryKind::Fine,
                mode: PaymentMode::Upi,
            },
        );
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["type"], "passbook");
        assert_eq!(json["kind"], "fine");
        assert_eq!(json["amount"], 100);
        assert_eq!(r.type_label(), "fine");
        assert_eq!(r.member_id(), Some(member_id));
    }
}
