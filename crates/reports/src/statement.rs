//! Member passbook statement with running balances.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sahakari_core::{Money, PaymentMode};
use sahakari_members::MemberId;
use sahakari_passbook::EntryKind;

use crate::record::{LedgerDetail, LedgerRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementRow {
    pub date: NaiveDate,
    pub entry_id: Uuid,
    pub kind: EntryKind,
    pub mode: PaymentMode,
    pub amount: Money,
    pub note: Option<String>,
    pub savings_balance: Money,
    pub cumulative_interest: Money,
    pub cumulative_fines: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassbookStatement {
    pub member_id: MemberId,
    pub rows: Vec<StatementRow>,
    pub savings_balance: Money,
    pub total_interest: Money,
    pub total_fines: Money,
}

/// Chronological statement of one member's passbook lines.
///
/// Rows are sorted by date; lines on the same date keep their record order.
pub fn running_balance(records: &[LedgerRecord], member_id: MemberId) -> PassbookStatement {
    let mut lines: Vec<_> = records
        .iter()
        .filter_map(|r| match &r.detail {
            LedgerDetail::Passbook {
                member_id: m,
                entry_id,
                kind,
                mode,
            } if *m == member_id => Some((r, *entry_id, *kind, *mode)),
            _ => None,
        })
        .collect();
    lines.sort_by_key(|(r, ..)| r.date);

    let mut savings = Money::ZERO;
    let mut interest = Money::ZERO;
    let mut fines = Money::ZERO;

    let rows = lines
        .into_iter()
        .map(|(record, entry_id, kind, mode)| {
            match kind {
                EntryKind::Deposit => savings += record.amount,
                EntryKind::Withdrawal => savings -= record.amount,
                EntryKind::Interest => interest += record.amount,
                EntryKind::Fine => fines += record.amount,
            }
            StatementRow {
                date: record.date,
                entry_id,
                kind,
                mode,
                amount: record.amount,
                note: record.note.clone(),
                savings_balance: savings,
                cumulative_interest: interest,
                cumulative_fines: fines,
            }
        })
        .collect();

    PassbookStatement {
        member_id,
        rows,
        savings_balance: savings,
        total_interest: interest,
        total_fines: fines,
    }
}
