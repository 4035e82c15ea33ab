//! End-to-end pipeline tests:
//! command → event store → bus → projection hub → read models.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use sahakari_core::{AggregateId, ExpectedVersion, Money, PaymentMode, TenantId};
use sahakari_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription};
use sahakari_loans::{IssueLoan, Loan, LoanCommand, LoanId, RecordRepayment, LOAN_AGGREGATE_TYPE};
use sahakari_members::{Member, MemberCommand, MemberId, RegisterMember, MEMBER_AGGREGATE_TYPE};
use sahakari_passbook::{
    passbook_stream_id, EntryKind, Passbook, PassbookCommand, RecordEntry, ReverseEntry,
    PASSBOOK_AGGREGATE_TYPE,
};
use sahakari_reports::liquidity_snapshot;
use sahakari_treasury::{
    ExpenseCommand, ExpenseLedger, RecordExpense, EXPENSE_LEDGER_AGGREGATE_TYPE, EXPENSE_LEDGER_ID,
};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::{EventStore, InMemoryEventStore, UncommittedEvent};
use crate::projections::ProjectionHub;

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Dispatcher = CommandDispatcher<Arc<InMemoryEventStore>, Bus>;

struct Harness {
    dispatcher: Dispatcher,
    hub: ProjectionHub,
    sub: Subscription<EventEnvelope<JsonValue>>,
}

impl Harness {
    fn new() -> Self {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let sub = bus.subscribe();
        Self {
            dispatcher: CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), bus),
            hub: ProjectionHub::new(),
            sub,
        }
    }

    /// Deliver everything published so far.
    fn drain(&self) {
        while let Ok(env) = self.sub.try_recv() {
            self.hub.apply_published(&env, self.dispatcher.store()).unwrap();
        }
    }

    fn register(&self, t: TenantId, no: &str) -> MemberId {
        let member_id = MemberId::new(AggregateId::new());
        let cmd = MemberCommand::Register(RegisterMember {
            tenant_id: t,
            member_id,
            membership_no: no.to_string(),
            name: format!("Member {no}"),
            phone: None,
            joined_on: day(1),
            occurred_at: Utc::now(),
        });
        self.dispatcher
            .dispatch::<Member>(t, member_id.0, MEMBER_AGGREGATE_TYPE, cmd, |_, id| {
                Member::empty(MemberId::new(id))
            })
            .unwrap();
        member_id
    }

    fn entry(&self, t: TenantId, m: MemberId, kind: EntryKind, paise: i64) -> Result<Uuid, DispatchError> {
        record_entry(&self.dispatcher, t, m, kind, paise)
    }

    fn passbook(&self, t: TenantId, m: MemberId, cmd: PassbookCommand) -> Result<(), DispatchError> {
        run_passbook(&self.dispatcher, t, m, cmd)
    }

    fn loan(&self, t: TenantId, loan_id: LoanId, cmd: LoanCommand) {
        self.dispatcher
            .dispatch::<Loan>(t, loan_id.0, LOAN_AGGREGATE_TYPE, cmd, |_, id| Loan::empty(LoanId::new(id)))
            .unwrap();
    }
}

fn record_entry(d: &Dispatcher, t: TenantId, m: MemberId, kind: EntryKind, paise: i64) -> Result<Uuid, DispatchError> {
    let entry_id = Uuid::now_v7();
    let cmd = PassbookCommand::RecordEntry(RecordEntry {
        tenant_id: t,
        member_id: m,
        entry_id,
        kind,
        amount: Money::from_paise(paise),
        mode: PaymentMode::Cash,
        entry_date: day(2),
        note: None,
        occurred_at: Utc::now(),
    });
    run_passbook(d, t, m, cmd).map(|_| entry_id)
}

fn run_passbook(d: &Dispatcher, t: TenantId, m: MemberId, cmd: PassbookCommand) -> Result<(), DispatchError> {
    d.dispatch::<Passbook>(t, passbook_stream_id(m), PASSBOOK_AGGREGATE_TYPE, cmd, |_, _| Passbook::empty(m))
        .map(|_| ())
}

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
}

#[test]
fn commands_flow_into_every_read_model() {
    let h = Harness::new();
    let t = TenantId::new();
    let m = h.register(t, "M-001");

    h.entry(t, m, EntryKind::Deposit, 500_000).unwrap();
    h.entry(t, m, EntryKind::Fine, 2_000).unwrap();

    let loan_id = LoanId::new(AggregateId::new());
    h.loan(
        t,
        loan_id,
        LoanCommand::Issue(IssueLoan {
            tenant_id: t,
            loan_id,
            member_id: m,
            principal: Money::from_paise(300_000),
            annual_rate_bp: 1_200,
            tenure_months: 12,
            mode: PaymentMode::Bank,
            issued_on: day(3),
            occurred_at: Utc::now(),
        }),
    );
    h.loan(
        t,
        loan_id,
        LoanCommand::RecordRepayment(RecordRepayment {
            tenant_id: t,
            loan_id,
            repayment_id: Uuid::now_v7(),
            principal: Money::from_paise(100_000),
            interest: Money::from_paise(3_000),
            mode: PaymentMode::Upi,
            paid_on: day(20),
            occurred_at: Utc::now(),
        }),
    );
    h.dispatcher
        .dispatch::<ExpenseLedger>(
            t,
            EXPENSE_LEDGER_ID,
            EXPENSE_LEDGER_AGGREGATE_TYPE,
            ExpenseCommand::Record(RecordExpense {
                tenant_id: t,
                expense_id: Uuid::now_v7(),
                category: "stationery".into(),
                amount: Money::from_paise(1_500),
                mode: PaymentMode::Cash,
                spent_on: day(5),
                description: None,
                occurred_at: Utc::now(),
            }),
            |_, id| ExpenseLedger::empty(id),
        )
        .unwrap();

    h.drain();

    assert_eq!(h.hub.members.list(t)[0].membership_no, "M-001");
    assert_eq!(h.hub.members.active_count(t), 1);

    let pb = h.hub.passbooks.get(t, &m).unwrap();
    assert_eq!(pb.savings_balance, Money::from_paise(500_000));
    assert_eq!(pb.total_fines, Money::from_paise(2_000));

    let loan = h.hub.loans.get(t, &loan_id).unwrap();
    assert_eq!(loan.outstanding, Money::from_paise(200_000));
    assert_eq!(loan.monthly_interest_due, Money::from_paise(2_000));

    let records = h.hub.ledger.records(t);
    assert_eq!(records.len(), 5);
    let snapshot = liquidity_snapshot(&records, None);
    assert_eq!(snapshot.cash, Money::from_paise(500_000 + 2_000 - 1_500));
    assert_eq!(snapshot.bank, Money::from_paise(-300_000));
    assert_eq!(snapshot.upi, Money::from_paise(103_000));
}

#[test]
fn reversal_flags_passbook_line_and_drops_ledger_record() {
    let h = Harness::new();
    let t = TenantId::new();
    let m = h.register(t, "M-002");
    let entry_id = h.entry(t, m, EntryKind::Deposit, 10_000).unwrap();

    h.passbook(
        t,
        m,
        PassbookCommand::ReverseEntry(ReverseEntry {
            tenant_id: t,
            member_id: m,
            entry_id,
            reason: Some("typo".into()),
            occurred_at: Utc::now(),
        }),
    )
    .unwrap();
    h.drain();

    let pb = h.hub.passbooks.get(t, &m).unwrap();
    assert_eq!(pb.savings_balance, Money::ZERO);
    assert!(pb.entries[0].reversed);
    assert_eq!(pb.entries[0].reversal_reason.as_deref(), Some("typo"));
    assert!(h.hub.ledger.records(t).is_empty());
}

#[test]
fn tenants_never_see_each_other() {
    let h = Harness::new();
    let (a, b) = (TenantId::new(), TenantId::new());
    let ma = h.register(a, "A-1");
    h.entry(a, ma, EntryKind::Deposit, 7_000).unwrap();
    h.register(b, "B-1");
    h.drain();

    assert_eq!(h.hub.members.list(a).len(), 1);
    assert_eq!(h.hub.members.list(b).len(), 1);
    assert!(h.hub.passbooks.get(b, &ma).is_none());
    assert!(h.hub.ledger.records(b).is_empty());

    // The same stream id under another tenant is a different, empty stream.
    assert!(h.dispatcher.store().load_stream(b, passbook_stream_id(ma)).unwrap().is_empty());
    let err = h.entry(b, ma, EntryKind::Withdrawal, 1).unwrap_err();
    assert!(matches!(err, DispatchError::InvariantViolation(_)));
}

#[test]
fn stale_expected_version_is_a_concurrency_conflict() {
    let h = Harness::new();
    let t = TenantId::new();
    let m = h.register(t, "M-003");
    h.entry(t, m, EntryKind::Deposit, 1_000).unwrap();

    let stale = UncommittedEvent {
        event_id: Uuid::now_v7(),
        tenant_id: t,
        aggregate_id: passbook_stream_id(m),
        aggregate_type: PASSBOOK_AGGREGATE_TYPE.to_string(),
        event_type: "passbook.member.entry_recorded".to_string(),
        event_version: 1,
        occurred_at: Utc::now(),
        payload: JsonValue::Null,
    };
    let err = h
        .dispatcher
        .store()
        .append(vec![stale], ExpectedVersion::Exact(0))
        .unwrap_err();
    assert!(matches!(DispatchError::from(err), DispatchError::Concurrency(_)));
}

#[test]
fn parallel_writers_keep_the_stream_contiguous() {
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let d: Arc<Dispatcher> = Arc::new(CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), bus));
    let t = TenantId::new();
    let m = MemberId::new(AggregateId::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let d = d.clone();
            std::thread::spawn(move || record_entry(&d, t, m, EntryKind::Deposit, 100))
        })
        .collect();

    let mut ok = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(_) => ok += 1,
            Err(DispatchError::Concurrency(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    let stream = d.store().load_stream(t, passbook_stream_id(m)).unwrap();
    assert_eq!(stream.len(), ok);
    for (idx, e) in stream.iter().enumerate() {
        assert_eq!(e.sequence_number, idx as u64 + 1);
    }
}

#[test]
fn rebuild_matches_live_views_and_spares_other_tenants() {
    let h = Harness::new();
    let (a, b) = (TenantId::new(), TenantId::new());
    let ma = h.register(a, "A-1");
    h.entry(a, ma, EntryKind::Deposit, 40_000).unwrap();
    h.entry(a, ma, EntryKind::Withdrawal, 15_000).unwrap();
    let mb = h.register(b, "B-1");
    h.entry(b, mb, EntryKind::Deposit, 9_900).unwrap();
    h.drain();

    let live = h.hub.passbooks.get(a, &ma).unwrap();
    let report = h.hub.rebuild_tenant(a, h.dispatcher.store()).unwrap();

    assert_eq!(report.events_replayed, 3);
    assert_eq!(report.streams, 2);
    assert_eq!(h.hub.passbooks.get(a, &ma).unwrap(), live);
    assert_eq!(
        h.hub.passbooks.get(b, &mb).unwrap().savings_balance,
        Money::from_paise(9_900)
    );
}

#[test]
fn cold_tenant_is_warmed_from_history_before_applying() {
    let h = Harness::new();
    let t = TenantId::new();
    let m = h.register(t, "M-9");
    h.entry(t, m, EntryKind::Deposit, 2_500).unwrap();

    // A fresh hub sees only the most recent envelope, as after a restart.
    let fresh = ProjectionHub::new();
    let mut last = None;
    while let Ok(env) = h.sub.try_recv() {
        last = Some(env);
    }
    let env = last.unwrap();
    assert_eq!(env.sequence_number(), 1);
    assert!(!fresh.is_warm(t));

    fresh.apply_published(&env, h.dispatcher.store()).unwrap();

    assert!(fresh.is_warm(t));
    assert_eq!(fresh.members.active_count(t), 1);
    assert_eq!(
        fresh.passbooks.get(t, &m).unwrap().savings_balance,
        Money::from_paise(2_500)
    );
}

#[test]
fn out_of_order_delivery_replays_the_tenant() {
    let h = Harness::new();
    let t = TenantId::new();
    let m = h.register(t, "M-11");
    h.drain();

    h.entry(t, m, EntryKind::Deposit, 1_000).unwrap();
    h.entry(t, m, EntryKind::Deposit, 2_000).unwrap();
    h.entry(t, m, EntryKind::Deposit, 500).unwrap();
    let mut pending = Vec::new();
    while let Ok(env) = h.sub.try_recv() {
        pending.push(env);
    }
    assert_eq!(pending.len(), 3);

    // Sequence 1, then 3 ahead of 2.
    let store = h.dispatcher.store();
    h.hub.apply_published(&pending[0], store).unwrap();
    h.hub.apply_published(&pending[2], store).unwrap();
    assert_eq!(
        h.hub.passbooks.get(t, &m).unwrap().savings_balance,
        Money::from_paise(3_500)
    );
    h.hub.apply_published(&pending[1], store).unwrap();

    assert_eq!(
        h.hub.passbooks.get(t, &m).unwrap().savings_balance,
        Money::from_paise(3_500)
    );
    let reference = ProjectionHub::new();
    reference.rebuild_tenant(t, store).unwrap();
    assert_eq!(h.hub.ledger.records(t).len(), reference.ledger.records(t).len());
    assert_eq!(h.hub.ledger.records(t).len(), 3);
}

#[test]
fn background_subscriber_catches_up() {
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let store = Arc::new(InMemoryEventStore::new());
    let dispatcher = CommandDispatcher::new(store.clone(), bus.clone());
    let hub = Arc::new(ProjectionHub::new());

    let sub = bus.subscribe();
    let worker = {
        let hub = hub.clone();
        let store = store.clone();
        std::thread::spawn(move || {
            while let Ok(env) = sub.recv_timeout(std::time::Duration::from_millis(200)) {
                hub.apply_published(&env, &store).unwrap();
            }
        })
    };

    let t = TenantId::new();
    let m = MemberId::new(AggregateId::new());
    dispatcher
        .dispatch::<Member>(
            t,
            m.0,
            MEMBER_AGGREGATE_TYPE,
            MemberCommand::Register(RegisterMember {
                tenant_id: t,
                member_id: m,
                membership_no: "BG-1".into(),
                name: "Background".into(),
                phone: None,
                joined_on: day(1),
                occurred_at: Utc::now(),
            }),
            |_, id| Member::empty(MemberId::new(id)),
        )
        .unwrap();

    worker.join().unwrap();
    assert_eq!(hub.members.get(t, &m).unwrap().name, "Background");
}
