use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::NaiveDate;
use sahakari_core::{AggregateId, Money, PaymentMode};
use sahakari_loans::LoanId;
use sahakari_members::MemberId;
use sahakari_passbook::EntryKind;
use sahakari_reports::{liquidity_snapshot, society_summary, LedgerDetail, LedgerRecord};
use uuid::Uuid;

/// A year of activity for a society of `members` members: monthly deposits,
/// a fine now and then, one loan per ten members with monthly repayments, and
/// a couple of expenses a month.
fn synthetic_ledger(members: usize) -> Vec<LedgerRecord> {
    let mut records = Vec::new();
    let modes = PaymentMode::ALL;
    let member_ids: Vec<_> = (0..members).map(|_| MemberId::new(AggregateId::new())).collect();

    for month in 1..=12u32 {
        let date = NaiveDate::from_ymd_opt(2024, month, 5).unwrap();

        for (i, member_id) in member_ids.iter().enumerate() {
            records.push(LedgerRecord::new(
                date,
                Money::from_paise(50_000),
                LedgerDetail::Passbook {
                    member_id: *member_id,
                    entry_id: Uuid::now_v7(),
                    kind: EntryKind::Deposit,
                    mode: modes[i % 3],
                },
            ));
            if i % 7 == 0 {
                records.push(LedgerRecord::new(
                    date,
                    Money::from_paise(1_000),
                    LedgerDetail::Passbook {
                        member_id: *member_id,
                        entry_id: Uuid::now_v7(),
                        kind: EntryKind::Fine,
                        mode: PaymentMode::Cash,
                    },
                ));
            }
        }

        for (i, member_id) in member_ids.iter().enumerate().step_by(10) {
            let loan_id = LoanId::new(AggregateId::well_known(i as u128 + 1));
            if month == 1 {
                records.push(LedgerRecord::new(
                    date,
                    Money::from_paise(1_200_000),
                    LedgerDetail::LoanDisbursed {
                        loan_id,
                        member_id: *member_id,
                        mode: PaymentMode::Bank,
                    },
                ));
            } else {
                records.push(LedgerRecord::new(
                    date,
                    Money::from_paise(110_000),
                    LedgerDetail::LoanRepaid {
                        loan_id,
                        member_id: *member_id,
                        repayment_id: Uuid::now_v7(),
                        principal: Money::from_paise(100_000),
                        interest: Money::from_paise(10_000),
                        mode: PaymentMode::Upi,
                    },
                ));
            }
        }

        for category in ["rent", "stationery"] {
            records.push(LedgerRecord::new(
                date,
                Money::from_paise(75_000),
                LedgerDetail::Expense {
                    expense_id: Uuid::now_v7(),
                    category: category.to_string(),
                    mode: PaymentMode::Cash,
                },
            ));
        }
    }

    records
}

fn bench_liquidity(c: &mut Criterion) {
    let mut group = c.benchmark_group("liquidity_snapshot");

    for members in [50usize, 500, 5_000] {
        let records = synthetic_ledger(members);
        group.throughput(Throughput::Elements(records.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(members), &records, |b, records| {
            b.iter(|| liquidity_snapshot(black_box(records), None));
        });
    }

    group.finish();
}

fn bench_summary(c: &mut Criterion) {
    let mut group = c.benchmark_group("society_summary");

    for members in [50usize, 500] {
        let records = synthetic_ledger(members);
        group.throughput(Throughput::Elements(records.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(members), &records, |b, records| {
            b.iter(|| society_summary(black_box(records), members, None));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_liquidity, bench_summary);
criterion_main!(benches);
