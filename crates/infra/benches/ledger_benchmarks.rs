use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use std::sync::Arc;

use crebit_core::AccountId;
use crebit_infra::{InMemoryLedgerStore, LedgerEngine};
use crebit_ledger::{TransactionCommand, TransactionKind};
use tokio::runtime::Runtime;

fn seeded_engine() -> LedgerEngine<Arc<InMemoryLedgerStore>> {
    let store = Arc::new(InMemoryLedgerStore::new());
    store
        .provision(AccountId::new(1), 1_000_000_000, 0)
        .unwrap();
    LedgerEngine::new(store)
}

fn credit(value: i64) -> TransactionCommand {
    TransactionCommand {
        kind: TransactionKind::Credit,
        value,
        description: "bench".to_string(),
    }
}

fn debit(value: i64) -> TransactionCommand {
    TransactionCommand {
        kind: TransactionKind::Debit,
        value,
        description: "bench".to_string(),
    }
}

/// Sequential apply throughput on a single account.
fn bench_sequential_apply(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("sequential_apply");

    for ops in [100u64, 1_000] {
        group.throughput(Throughput::Elements(ops));
        group.bench_with_input(BenchmarkId::new("credits", ops), &ops, |b, &ops| {
            b.iter(|| {
                rt.block_on(async {
                    let engine = seeded_engine();
                    let id = AccountId::new(1);
                    for _ in 0..ops {
                        engine.apply(id, credit(10)).await.unwrap();
                    }
                })
            })
        });
    }

    group.finish();
}

/// Contended apply: tasks hammering one account, exercising the per-account
/// hold.
fn bench_contended_apply(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("contended_apply");

    for tasks in [4usize, 16] {
        let ops_per_task = 64u64;
        group.throughput(Throughput::Elements(tasks as u64 * ops_per_task));
        group.bench_with_input(BenchmarkId::new("mixed", tasks), &tasks, |b, &tasks| {
            b.iter(|| {
                rt.block_on(async {
                    let engine = Arc::new(seeded_engine());
                    let id = AccountId::new(1);
                    let handles: Vec<_> = (0..tasks)
                        .map(|i| {
                            let engine = Arc::clone(&engine);
                            tokio::spawn(async move {
                                for _ in 0..ops_per_task {
                                    let command =
                                        if i % 2 == 0 { credit(10) } else { debit(5) };
                                    let _ = engine.apply(id, command).await;
                                }
                            })
                        })
                        .collect();
                    for handle in handles {
                        handle.await.unwrap();
                    }
                })
            })
        });
    }

    group.finish();
}

/// Statement reads over a populated log.
fn bench_statement(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let engine = rt.block_on(async {
        let engine = seeded_engine();
        let id = AccountId::new(1);
        for _ in 0..1_000 {
            engine.apply(id, credit(10)).await.unwrap();
        }
        engine
    });

    c.bench_function("statement", |b| {
        b.iter(|| {
            rt.block_on(async {
                engine.statement(AccountId::new(1)).await.unwrap();
            })
        })
    });
}

criterion_group!(
    benches,
    bench_sequential_apply,
    bench_contended_apply,
    bench_statement
);
criterion_main!(benches);
