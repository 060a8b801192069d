use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use chrono::Utc;
use splitledger_core::{AccountId, AggregateId, EntryId, MemberId};
use splitledger_events::EventEnvelope;
use splitledger_events::InMemoryEventBus;
use splitledger_groups::{
    Account, CreateGroup, Group, GroupCommand, GroupCreated, GroupEvent, GroupId, JoinGroup,
    LedgerEntry, PaymentRecorded, RecordPayment, Transaction, TransactionKind, AGGREGATE_TYPE,
    PAYMENT_ENTRY_NAME,
};
use splitledger_infra::command_dispatcher::CommandDispatcher;
use splitledger_infra::event_store::{EventStore, InMemoryEventStore, UncommittedEvent};
use splitledger_infra::projections::GroupBalancesProjection;
use splitledger_infra::read_model::InMemoryGroupStore;
use splitledger_settlement::MemberBalance;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Naive CRUD simulation: direct balance updates (no events, no history).
#[derive(Debug, Clone)]
struct NaiveBalanceStore {
    inner: Arc<RwLock<HashMap<(GroupId, MemberId), i64>>>,
}

impl NaiveBalanceStore {
    fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn open_account(&self, group_id: GroupId, member_id: MemberId) {
        let mut map = self.inner.write().unwrap();
        map.insert((group_id, member_id), 0);
    }

    fn record_payment(
        &self,
        group_id: GroupId,
        sender: MemberId,
        receiver: MemberId,
        amount: i64,
    ) -> Result<(), ()> {
        let mut map = self.inner.write().unwrap();
        if !map.contains_key(&(group_id, sender)) || !map.contains_key(&(group_id, receiver)) {
            return Err(());
        }
        *map.get_mut(&(group_id, sender)).unwrap() += amount;
        *map.get_mut(&(group_id, receiver)).unwrap() -= amount;
        Ok(())
    }
}

fn setup_event_sourcing() -> (
    CommandDispatcher<InMemoryEventStore, Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>>>,
    GroupId,
) {
    let store = InMemoryEventStore::new();
    let bus: Arc<InMemoryEventBus<EventEnvelope<serde_json::Value>>> =
        Arc::new(InMemoryEventBus::new());
    let dispatcher = CommandDispatcher::new(store, bus);
    (dispatcher, GroupId::new(AggregateId::new()))
}

fn payment_event(group_id: GroupId, sender: Account, receiver: Account, amount: i64) -> GroupEvent {
    let occurred_at = Utc::now();
    GroupEvent::PaymentRecorded(PaymentRecorded {
        group_id,
        entry: LedgerEntry {
            entry_id: EntryId::new(),
            name: PAYMENT_ENTRY_NAME.to_string(),
            amount,
            created_by: sender.member_id,
            created_at: occurred_at,
        },
        debit: Transaction {
            account: sender,
            kind: TransactionKind::Debit,
            amount,
        },
        credit: Transaction {
            account: receiver,
            kind: TransactionKind::Credit,
            amount,
        },
        occurred_at,
    })
}

fn bench_command_execution_latency(c: &mut Criterion) {
    let mut group = c.benchmark_group("command_execution_latency");
    group.sample_size(1000);

    // Benchmark: CreateGroup command (first command, no history)
    group.bench_function("create_group_fresh", |b| {
        let (dispatcher, _) = setup_event_sourcing();
        b.iter(|| {
            let group_id = GroupId::new(AggregateId::new());
            let create_cmd = CreateGroup {
                group_id,
                name: black_box("Bench group".to_string()),
                access_code: "bench".to_string(),
                created_by: MemberId::new(),
                creator_account_id: AccountId::new(),
                occurred_at: Utc::now(),
            };
            dispatcher
                .dispatch(
                    group_id.0,
                    AGGREGATE_TYPE,
                    GroupCommand::CreateGroup(create_cmd),
                    |id| Group::empty(GroupId::new(id)),
                )
                .unwrap();
        });
    });

    // Benchmark: RecordPayment command against a growing stream (with history)
    group.bench_function("record_payment_with_history", |b| {
        let (dispatcher, group_id) = setup_event_sourcing();
        let alice = MemberId::new();
        let bob = MemberId::new();

        // Create the group and add the second member once
        dispatcher
            .dispatch(
                group_id.0,
                AGGREGATE_TYPE,
                GroupCommand::CreateGroup(CreateGroup {
                    group_id,
                    name: "Bench group".to_string(),
                    access_code: "bench".to_string(),
                    created_by: alice,
                    creator_account_id: AccountId::new(),
                    occurred_at: Utc::now(),
                }),
                |id| Group::empty(GroupId::new(id)),
            )
            .unwrap();
        dispatcher
            .dispatch(
                group_id.0,
                AGGREGATE_TYPE,
                GroupCommand::JoinGroup(JoinGroup {
                    group_id,
                    member_id: bob,
                    account_id: AccountId::new(),
                    occurred_at: Utc::now(),
                }),
                |id| Group::empty(GroupId::new(id)),
            )
            .unwrap();

        b.iter(|| {
            let payment_cmd = RecordPayment {
                group_id,
                entry_id: EntryId::new(),
                sender: alice,
                receiver: bob,
                amount: black_box(5),
                occurred_at: Utc::now(),
            };
            dispatcher
                .dispatch(
                    group_id.0,
                    AGGREGATE_TYPE,
                    GroupCommand::RecordPayment(payment_cmd),
                    |id| Group::empty(GroupId::new(id)),
                )
                .unwrap();
        });
    });

    group.finish();
}

fn bench_event_append_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_append_throughput");
    group.throughput(Throughput::Elements(1));

    for batch_size in [1, 10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(
            BenchmarkId::new("batch_append", batch_size),
            batch_size,
            |b, &size| {
                let store = InMemoryEventStore::new();
                let group_id = GroupId::new(AggregateId::new());
                let sender = Account {
                    account_id: AccountId::new(),
                    member_id: MemberId::new(),
                };
                let receiver = Account {
                    account_id: AccountId::new(),
                    member_id: MemberId::new(),
                };

                b.iter(|| {
                    let events: Vec<UncommittedEvent> = (0..size)
                        .map(|i| {
                            let event = payment_event(group_id, sender, receiver, (i + 1) as i64);
                            UncommittedEvent::from_typed(
                                group_id.0,
                                AGGREGATE_TYPE,
                                uuid::Uuid::now_v7(),
                                &event,
                            )
                            .unwrap()
                        })
                        .collect();

                    black_box(
                        store
                            .append(events, splitledger_core::ExpectedVersion::Any)
                            .unwrap(),
                    );
                });
            },
        );
    }

    group.finish();
}

fn bench_projection_rebuild_speed(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection_rebuild_speed");

    for event_count in [10, 100, 1000, 10000].iter() {
        group.bench_with_input(
            BenchmarkId::new("rebuild_from_events", event_count),
            event_count,
            |b, &count| {
                let store = InMemoryEventStore::new();
                let group_id = GroupId::new(AggregateId::new());
                let alice = Account {
                    account_id: AccountId::new(),
                    member_id: MemberId::new(),
                };
                let bob = Account {
                    account_id: AccountId::new(),
                    member_id: MemberId::new(),
                };

                // Pre-generate the stream: one creation, then payments
                let mut all_envelopes = Vec::new();
                {
                    let create_event = GroupEvent::GroupCreated(GroupCreated {
                        group_id,
                        name: "Bench group".to_string(),
                        access_code: "bench".to_string(),
                        created_by: alice.member_id,
                        creator_account_id: alice.account_id,
                        occurred_at: Utc::now(),
                    });
                    let uncommitted = UncommittedEvent::from_typed(
                        group_id.0,
                        AGGREGATE_TYPE,
                        uuid::Uuid::now_v7(),
                        &create_event,
                    )
                    .unwrap();
                    let stored = store
                        .append(vec![uncommitted], splitledger_core::ExpectedVersion::Any)
                        .unwrap();
                    all_envelopes.push(stored[0].to_envelope());

                    for i in 0..(count - 1) {
                        let event = if i % 2 == 0 {
                            payment_event(group_id, alice, bob, 10)
                        } else {
                            payment_event(group_id, bob, alice, 10)
                        };
                        let uncommitted = UncommittedEvent::from_typed(
                            group_id.0,
                            AGGREGATE_TYPE,
                            uuid::Uuid::now_v7(),
                            &event,
                        )
                        .unwrap();
                        let stored = store
                            .append(
                                vec![uncommitted],
                                splitledger_core::ExpectedVersion::Exact((i + 1) as u64),
                            )
                            .unwrap();
                        all_envelopes.push(stored[0].to_envelope());
                    }
                }

                let read_model_store: Arc<InMemoryGroupStore<MemberId, MemberBalance>> =
                    Arc::new(InMemoryGroupStore::new());
                let projection = GroupBalancesProjection::new(read_model_store);

                b.iter(|| {
                    projection
                        .rebuild_from_scratch(black_box(all_envelopes.clone()))
                        .unwrap();
                });
            },
        );
    }

    group.finish();
}

fn bench_event_sourcing_vs_naive_crud(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_sourcing_vs_naive_crud");
    group.sample_size(1000);

    // Benchmark: event sourcing (create group, add member, record payment)
    group.bench_function("event_sourcing_create_and_pay", |b| {
        let (dispatcher, _) = setup_event_sourcing();

        b.iter(|| {
            let group_id = GroupId::new(AggregateId::new());
            let alice = MemberId::new();
            let bob = MemberId::new();

            dispatcher
                .dispatch(
                    group_id.0,
                    AGGREGATE_TYPE,
                    GroupCommand::CreateGroup(CreateGroup {
                        group_id,
                        name: "Bench group".to_string(),
                        access_code: "bench".to_string(),
                        created_by: alice,
                        creator_account_id: AccountId::new(),
                        occurred_at: Utc::now(),
                    }),
                    |id| Group::empty(GroupId::new(id)),
                )
                .unwrap();

            dispatcher
                .dispatch(
                    group_id.0,
                    AGGREGATE_TYPE,
                    GroupCommand::JoinGroup(JoinGroup {
                        group_id,
                        member_id: bob,
                        account_id: AccountId::new(),
                        occurred_at: Utc::now(),
                    }),
                    |id| Group::empty(GroupId::new(id)),
                )
                .unwrap();

            dispatcher
                .dispatch(
                    group_id.0,
                    AGGREGATE_TYPE,
                    GroupCommand::RecordPayment(RecordPayment {
                        group_id,
                        entry_id: EntryId::new(),
                        sender: alice,
                        receiver: bob,
                        amount: 10,
                        occurred_at: Utc::now(),
                    }),
                    |id| Group::empty(GroupId::new(id)),
                )
                .unwrap();
        });
    });

    // Benchmark: naive CRUD (open accounts, mutate balances in place)
    group.bench_function("naive_crud_create_and_pay", |b| {
        let store = NaiveBalanceStore::new();
        let group_id = GroupId::new(AggregateId::new());
        let alice = MemberId::new();
        let bob = MemberId::new();

        b.iter(|| {
            store.open_account(group_id, alice);
            store.open_account(group_id, bob);
            store.record_payment(group_id, alice, bob, 10).unwrap();
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_command_execution_latency,
    bench_event_append_throughput,
    bench_projection_rebuild_speed,
    bench_event_sourcing_vs_naive_crud
);
criterion_main!(benches);
