//! CSV exports. Amounts are written as decimal rupees, dates as ISO-8601.

use std::io::Write;

use crate::error::ReportError;
use crate::loan_book::LoanBook;
use crate::record::{LedgerDetail, LedgerRecord};
use crate::statement::PassbookStatement;

const LEDGER_HEADER: [&str; 9] = [
    "date",
    "type",
    "reference",
    "member_id",
    "mode",
    "counter_mode",
    "category",
    "amount",
    "note",
];

const STATEMENT_HEADER: [&str; 8] = [
    "date",
    "entry_id",
    "kind",
    "mode",
    "amount",
    "savings_balance",
    "cumulative_interest",
    "cumulative_fines",
];

const LOAN_BOOK_HEADER: [&str; 8] = [
    "loan_id",
    "member_id",
    "disbursed_on",
    "disbursed",
    "principal_repaid",
    "interest_collected",
    "outstanding",
    "last_payment_on",
];

/// One row per ledger record, in the order given.
pub fn write_ledger<W: Write>(out: W, records: &[LedgerRecord]) -> Result<(), ReportError> {
    let mut wtr = ::csv::Writer::from_writer(out);
    wtr.write_record(LEDGER_HEADER)?;

    for record in records {
        let (mode, counter_mode, category) = match &record.detail {
            LedgerDetail::Passbook { mode, .. }
            | LedgerDetail::AdminFund { mode, .. }
            | LedgerDetail::LoanDisbursed { mode, .. }
            | LedgerDetail::LoanRepaid { mode, .. } => (mode.as_str(), "", ""),
            LedgerDetail::Expense { mode, category, .. } => (mode.as_str(), "", category.as_str()),
            LedgerDetail::Transfer { from, to, .. } => (from.as_str(), to.as_str(), ""),
        };

        wtr.write_record([
            record.date.to_string(),
            record.type_label().to_string(),
            record.record_id().to_string(),
            record.member_id().map(|m| m.to_string()).unwrap_or_default(),
            mode.to_string(),
            counter_mode.to_string(),
            category.to_string(),
            record.amount.to_string(),
            record.note.clone().unwrap_or_default(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_statement<W: Write>(out: W, statement: &PassbookStatement) -> Result<(), ReportError> {
    let mut wtr = ::csv::Writer::from_writer(out);
    wtr.write_record(STATEMENT_HEADER)?;

    for row in &statement.rows {
        wtr.write_record([
            row.date.to_string(),
            row.entry_id.to_string(),
            row.kind.as_str().to_string(),
            row.mode.as_str().to_string(),
            row.amount.to_string(),
            row.savings_balance.to_string(),
            row.cumulative_interest.to_string(),
            row.cumulative_fines.to_string(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn write_loan_book<W: Write>(out: W, book: &LoanBook) -> Result<(), ReportError> {
    let mut wtr = ::csv::Writer::from_writer(out);
    wtr.write_record(LOAN_BOOK_HEADER)?;

    let date = |d: Option<chrono::NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
    for pos in &book.loans {
        wtr.write_record([
            pos.loan_id.to_string(),
            pos.member_id.to_string(),
            date(pos.disbursed_on),
            pos.disbursed.to_string(),
            pos.principal_repaid.to_string(),
            pos.interest_collected.to_string(),
            pos.outstanding.to_string(),
            date(pos.last_payment_on),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loan_book::loan_book;
    use crate::statement::running_balance;
    use chrono::NaiveDate;
    use sahakari_core::{AggregateId, Money, PaymentMode};
    use sahakari_loans::LoanId;
    use sahakari_members::MemberId;
    use sahakari_passbook::EntryKind;
    use uuid::Uuid;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
    }

    fn lines(buf: Vec<u8>) -> Vec<String> {
        String::from_utf8(buf).unwrap().lines().map(str::to_string).collect()
    }

    #[test]
    fn ledger_export_has_header_and_decimal_amounts() {
        let records = vec![
            LedgerRecord::new(
                day(1),
                Money::from_paise(125_050),
                LedgerDetail::Expense {
                    expense_id: Uuid::nil(),
                    category: "rent, office".into(),
                    mode: PaymentMode::Bank,
                },
            )
            .with_note(Some("September".into())),
            LedgerRecord::new(
                day(2),
                Money::from_paise(500),
                LedgerDetail::Transfer {
                    movement_id: Uuid::nil(),
                    from: PaymentMode::Cash,
                    to: PaymentMode::Upi,
                },
            ),
        ];

        let mut buf = Vec::new();
        write_ledger(&mut buf, &records).unwrap();
        let out = lines(buf);

        assert_eq!(out[0], "date,type,reference,member_id,mode,counter_mode,category,amount,note");
        assert_eq!(
            out[1],
            "2024-09-01,expense,00000000-0000-0000-0000-000000000000,,bank,,\"rent, office\",1250.50,September"
        );
        assert_eq!(
            out[2],
            "2024-09-02,transfer,00000000-0000-0000-0000-000000000000,,cash,upi,,5.00,"
        );
    }

    #[test]
    fn statement_export_carries_running_balance() {
        let m = MemberId::new(AggregateId::new());
        let records = vec![
            LedgerRecord::new(
                day(3),
                Money::from_paise(10_000),
                LedgerDetail::Passbook {
                    member_id: m,
                    entry_id: Uuid::now_v7(),
                    kind: EntryKind::Deposit,
                    mode: PaymentMode::Cash,
                },
            ),
            LedgerRecord::new(
                day(4),
                Money::from_paise(2_500),
                LedgerDetail::Passbook {
                    member_id: m,
                    entry_id: Uuid::now_v7(),
                    kind: EntryKind::Withdrawal,
                    mode: PaymentMode::Upi,
                },
            ),
        ];

        let mut buf = Vec::new();
        write_statement(&mut buf, &running_balance(&records, m)).unwrap();
        let out = lines(buf);

        assert_eq!(out.len(), 3);
        assert!(out[2].starts_with("2024-09-04,"));
        assert!(out[2].ends_with(",withdrawal,upi,25.00,75.00,0.00,0.00"));
    }

    #[test]
    fn loan_book_export_lists_open_loans() {
        let loan_id = LoanId::new(AggregateId::new());
        let member_id = MemberId::new(AggregateId::new());
        let records = vec![LedgerRecord::new(
            day(5),
            Money::from_paise(1_000_000),
            LedgerDetail::LoanDisbursed {
                loan_id,
                member_id,
                mode: PaymentMode::Bank,
            },
        )];

        let mut buf = Vec::new();
        write_loan_book(&mut buf, &loan_book(&records)).unwrap();
        let out = lines(buf);

        assert_eq!(out[0], LOAN_BOOK_HEADER.join(","));
        assert_eq!(
            out[1],
            format!("{loan_id},{member_id},2024-09-05,10000.00,0.00,0.00,10000.00,")
        );
    }
}
