//! Engine-level tests against the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use crebit_core::AccountId;
use crebit_ledger::{TransactionCommand, TransactionKind};

use crate::engine::{EngineError, LedgerEngine};
use crate::store::in_memory::InMemoryLedgerStore;
use crate::store::LedgerStore;

fn ledger_with(
    accounts: &[(i64, i64, i64)],
) -> (Arc<InMemoryLedgerStore>, LedgerEngine<Arc<InMemoryLedgerStore>>) {
    let store = Arc::new(InMemoryLedgerStore::new());
    for (id, overdraft_limit, balance) in accounts {
        store
            .provision(AccountId::new(*id), *overdraft_limit, *balance)
            .unwrap();
    }
    (Arc::clone(&store), LedgerEngine::new(store))
}

fn credit(value: i64, description: &str) -> TransactionCommand {
    TransactionCommand {
        kind: TransactionKind::Credit,
        value,
        description: description.to_string(),
    }
}

fn debit(value: i64, description: &str) -> TransactionCommand {
    TransactionCommand {
        kind: TransactionKind::Debit,
        value,
        description: description.to_string(),
    }
}

#[tokio::test]
async fn debit_sequence_respects_overdraft_limit() {
    let (_, engine) = ledger_with(&[(1, 1000, 0)]);
    let id = AccountId::new(1);

    let view = engine.apply(id, debit(500, "rent")).await.unwrap();
    assert_eq!(view.balance, -500);
    assert_eq!(view.overdraft_limit, 1000);

    assert!(matches!(
        engine.apply(id, debit(600, "car")).await.unwrap_err(),
        EngineError::Rejected
    ));

    let view = engine.apply(id, debit(500, "food")).await.unwrap();
    assert_eq!(view.balance, -1000);
}

#[tokio::test]
async fn zero_limit_account_stops_at_zero() {
    let (_, engine) = ledger_with(&[(1, 0, 0)]);
    let id = AccountId::new(1);

    assert_eq!(engine.apply(id, credit(100, "topup")).await.unwrap().balance, 100);
    assert_eq!(engine.apply(id, debit(100, "spend")).await.unwrap().balance, 0);
    assert!(matches!(
        engine.apply(id, debit(1, "one")).await.unwrap_err(),
        EngineError::Rejected
    ));
}

#[tokio::test]
async fn debit_boundary_is_exact() {
    let (_, engine) = ledger_with(&[(1, 1000, 250)]);
    let id = AccountId::new(1);

    // value == balance + limit drains the account to exactly the floor.
    assert!(matches!(
        engine.apply(id, debit(1251, "over")).await.unwrap_err(),
        EngineError::Rejected
    ));
    assert_eq!(engine.apply(id, debit(1250, "all")).await.unwrap().balance, -1000);
}

#[tokio::test]
async fn rejected_debit_leaves_no_trace() {
    let (_, engine) = ledger_with(&[(1, 100, 0)]);
    let id = AccountId::new(1);

    engine.apply(id, credit(50, "seed")).await.unwrap();
    let before = engine.statement(id).await.unwrap();

    assert!(matches!(
        engine.apply(id, debit(500, "nope")).await.unwrap_err(),
        EngineError::Rejected
    ));

    let after = engine.statement(id).await.unwrap();
    assert_eq!(after.balance, before.balance);
    assert_eq!(after.recent, before.recent);
}

#[tokio::test]
async fn statement_is_idempotent_without_writes() {
    let (_, engine) = ledger_with(&[(1, 0, 0)]);
    let id = AccountId::new(1);

    engine.apply(id, credit(10, "a")).await.unwrap();
    engine.apply(id, credit(20, "b")).await.unwrap();

    let first = engine.statement(id).await.unwrap();
    let second = engine.statement(id).await.unwrap();
    assert_eq!(first.balance, second.balance);
    assert_eq!(first.overdraft_limit, second.overdraft_limit);
    assert_eq!(first.recent, second.recent);
}

#[tokio::test]
async fn statement_caps_at_ten_newest_first() {
    let (_, engine) = ledger_with(&[(1, 0, 0)]);
    let id = AccountId::new(1);

    for i in 1..=15i64 {
        engine.apply(id, credit(i, &format!("t{i:02}"))).await.unwrap();
    }

    let statement = engine.statement(id).await.unwrap();
    assert_eq!(statement.balance, (1..=15).sum::<i64>());
    assert_eq!(statement.recent.len(), 10);

    // Newest first: t15 down to t06.
    let descriptions: Vec<&str> = statement.recent.iter().map(|e| e.description.as_str()).collect();
    let expected: Vec<String> = (6..=15).rev().map(|i| format!("t{i:02}")).collect();
    assert_eq!(descriptions, expected.iter().map(String::as_str).collect::<Vec<_>>());

    // occurred_at is non-increasing down the list.
    for pair in statement.recent.windows(2) {
        assert!(pair[0].occurred_at >= pair[1].occurred_at);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_debits_never_break_the_floor() {
    let (_, engine) = ledger_with(&[(1, 100, 0)]);
    let engine = Arc::new(engine);
    let id = AccountId::new(1);

    let mut tasks = Vec::new();
    for i in 0..50 {
        let engine = Arc::clone(&engine);
        tasks.push(tokio::spawn(async move {
            engine.apply(id, debit(10, &format!("d{i:02}"))).await
        }));
    }

    let mut accepted = 0;
    let mut rejected = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(view) => {
                accepted += 1;
                assert!(view.balance >= -100);
            }
            Err(EngineError::Rejected) => rejected += 1,
            Err(other) => panic!("unexpected outcome: {other}"),
        }
    }

    // Exactly ten debits of 10 fit between 0 and the floor of -100.
    assert_eq!(accepted, 10);
    assert_eq!(rejected, 40);

    let statement = engine.statement(id).await.unwrap();
    assert_eq!(statement.balance, -100);
    assert_eq!(statement.recent.len(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_mixed_ops_sum_to_final_balance() {
    let (_, engine) = ledger_with(&[(1, 50, 0)]);
    let engine = Arc::new(engine);
    let id = AccountId::new(1);

    let mut tasks = Vec::new();
    for i in 0..20 {
        let engine = Arc::clone(&engine);
        tasks.push(tokio::spawn(async move {
            let command = if i % 2 == 0 {
                credit(5, "in")
            } else {
                debit(10, "out")
            };
            engine.apply(id, command.clone()).await.map(|_| command)
        }));
    }

    let mut expected: i64 = 0;
    for task in tasks {
        if let Ok(command) = task.await.unwrap() {
            expected += match command.kind {
                TransactionKind::Credit => command.value,
                TransactionKind::Debit => -command.value,
            };
        }
    }

    let statement = engine.statement(id).await.unwrap();
    assert_eq!(statement.balance, expected);
    assert!(statement.balance >= -50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn statement_balance_always_matches_visible_entries() {
    // With at most eight entries ever written, every snapshot sees the full
    // log, so its balance must equal the sum of the entries it returns.
    let (_, engine) = ledger_with(&[(1, 0, 0)]);
    let engine = Arc::new(engine);
    let id = AccountId::new(1);

    let writer = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            for i in 1..=8i64 {
                engine.apply(id, credit(i, "w")).await.unwrap();
            }
        })
    };

    for _ in 0..50 {
        let statement = engine.statement(id).await.unwrap();
        let visible: i64 = statement.recent.iter().map(|e| e.value).sum();
        assert_eq!(statement.balance, visible);
    }
    writer.await.unwrap();
}

#[tokio::test]
async fn contended_hold_times_out_as_unavailable() {
    let (store, engine) = ledger_with(&[(1, 0, 100)]);
    let engine = engine.with_lock_timeout(Duration::from_millis(20));
    let id = AccountId::new(1);

    let held = store.begin(id).await.unwrap();
    assert!(matches!(
        engine.apply(id, debit(10, "wait")).await.unwrap_err(),
        EngineError::Unavailable(_)
    ));

    // The failed attempt must not have written anything.
    held.abort().await;
    let statement = engine.statement(id).await.unwrap();
    assert_eq!(statement.balance, 100);
    assert!(statement.recent.is_empty());
}

#[tokio::test]
async fn invalid_input_never_reaches_the_store() {
    // No accounts provisioned: a store touch would surface NotFound.
    let (_, engine) = ledger_with(&[]);
    let id = AccountId::new(1);

    for command in [
        debit(0, "zero"),
        debit(-3, "negative"),
        credit(1, ""),
        credit(1, "elevenchars"),
    ] {
        assert!(matches!(
            engine.apply(id, command).await.unwrap_err(),
            EngineError::InvalidInput(_)
        ));
    }
}

#[tokio::test]
async fn unknown_account_is_not_found() {
    let (_, engine) = ledger_with(&[(1, 0, 0)]);
    let id = AccountId::new(404);

    assert!(matches!(
        engine.apply(id, credit(10, "x")).await.unwrap_err(),
        EngineError::NotFound
    ));
    assert!(matches!(
        engine.statement(id).await.unwrap_err(),
        EngineError::NotFound
    ));
}
