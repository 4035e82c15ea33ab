use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sahakari_core::{AggregateId, Money, PaymentMode, TenantId};
use sahakari_events::{EventEnvelope, InMemoryEventBus};
use sahakari_infra::command_dispatcher::CommandDispatcher;
use sahakari_infra::event_store::InMemoryEventStore;
use sahakari_infra::projections::ProjectionHub;
use sahakari_members::MemberId;
use sahakari_passbook::{
    passbook_stream_id, EntryKind, Passbook, PassbookCommand, RecordEntry, PASSBOOK_AGGREGATE_TYPE,
};
use uuid::Uuid;

type Dispatcher =
    CommandDispatcher<Arc<InMemoryEventStore>, Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>>;

fn dispatcher() -> Dispatcher {
    CommandDispatcher::new(Arc::new(InMemoryEventStore::new()), Arc::new(InMemoryEventBus::new()))
}

fn deposit(d: &Dispatcher, tenant_id: TenantId, member_id: MemberId, paise: i64) {
    let cmd = PassbookCommand::RecordEntry(RecordEntry {
        tenant_id,
        member_id,
        entry_id: Uuid::now_v7(),
        kind: EntryKind::Deposit,
        amount: Money::from_paise(paise),
        mode: PaymentMode::Cash,
        entry_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        note: None,
        occurred_at: Utc::now(),
    });
    d.dispatch::<Passbook>(
        tenant_id,
        passbook_stream_id(member_id),
        PASSBOOK_AGGREGATE_TYPE,
        cmd,
        |_, _| Passbook::empty(member_id),
    )
    .unwrap();
}

/// Deposit latency as the passbook history grows; every dispatch replays it.
fn bench_deposit_with_history(c: &mut Criterion) {
    let mut group = c.benchmark_group("deposit_with_history");

    for history in [0usize, 100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(history), &history, |b, &history| {
            let d = dispatcher();
            let tenant_id = TenantId::new();
            let member_id = MemberId::new(AggregateId::new());
            for _ in 0..history {
                deposit(&d, tenant_id, member_id, 100);
            }

            b.iter(|| deposit(&d, tenant_id, member_id, black_box(100)));
        });
    }

    group.finish();
}

/// Full tenant rebuild: members' passbooks replayed into every projection.
fn bench_tenant_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("tenant_rebuild");

    for members in [10usize, 100] {
        let d = dispatcher();
        let tenant_id = TenantId::new();
        for _ in 0..members {
            let member_id = MemberId::new(AggregateId::new());
            for _ in 0..12 {
                deposit(&d, tenant_id, member_id, 50_000);
            }
        }

        group.throughput(Throughput::Elements((members * 12) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(members), &members, |b, _| {
            let hub = ProjectionHub::new();
            b.iter(|| black_box(hub.rebuild_tenant(tenant_id, d.store()).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_deposit_with_history, bench_tenant_rebuild);
criterion_main!(benches);
