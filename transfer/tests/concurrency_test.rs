//! Concurrent dispatches against the same and different streams.
//!
//! The money rule under contention: two debits racing for one balance
//! must decide in sequence, so the loser is rejected on fresh state
//! instead of double-spending or burning its optimistic retries. These
//! tests drive real concurrency through `tokio::join!` at the router
//! level and through racing process instances at the engine level.

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use moneyrail_core::event_store::InMemoryEventStore;
use moneyrail_core::stream::Version;
use moneyrail_runtime::{AggregateRuntime, CommandError, RetryPolicy};
use moneyrail_testing::{InMemoryEventBus, test_clock};
use moneyrail_transfer::aggregates::{AccountAggregate, DebitAccount, LedgerAggregate};
use moneyrail_transfer::router::{CommandRouter, TransferCommand};
use moneyrail_transfer::saga::{
    BOOK_JOB_TYPE, BookWorker, DEBIT_JOB_TYPE, DebitWorker, InProcessEngine,
    MONEY_TRANSFER_PROCESS, ProcessEngine, ProcessState,
};
use moneyrail_transfer::types::{AccountId, Money, TransferId};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    router: Arc<CommandRouter>,
    store: Arc<InMemoryEventStore>,
    bus: Arc<InMemoryEventBus>,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryEventStore::new());
    let bus = Arc::new(InMemoryEventBus::new());

    let router = Arc::new(
        CommandRouter::new(
            store.clone(),
            bus.clone(),
            Arc::new(test_clock()),
        )
        .with_retry_policy(
            RetryPolicy::builder()
                .max_retries(3)
                .initial_delay(Duration::from_millis(1))
                .max_delay(Duration::from_millis(5))
                .build(),
        ),
    );

    Harness { router, store, bus }
}

fn debit(account_id: &str, amount: u64, command_id: &str) -> TransferCommand {
    DebitAccount {
        account_id: AccountId::new(account_id),
        amount: Money::new(amount),
        transfer_id: TransferId::new("T-race"),
        command_id: command_id.to_string(),
        correlation_id: "1".to_string(),
    }
    .into()
}

async fn balance_of(harness: &Harness, account_id: &str) -> (Money, Version) {
    let runtime: AggregateRuntime<AccountAggregate> =
        AggregateRuntime::new(harness.store.clone(), Arc::new(test_clock()));
    let loaded = runtime.load(account_id).await.expect("account loads");
    (loaded.state.balance, loaded.version)
}

#[tokio::test]
async fn racing_debits_on_one_account_decide_in_sequence() {
    let harness = harness();

    // Both fit the opening balance alone; together they overdraw it.
    let (first, second) = tokio::join!(
        harness.router.dispatch(debit("A-1", 6000, "C-1")),
        harness.router.dispatch(debit("A-1", 6000, "C-2")),
    );

    let outcomes = [first, second];
    let committed = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(committed, 1, "exactly one debit wins");

    // The loser decided against the winner's committed state, so it
    // failed on the business rule, not on a store conflict.
    let rejection = outcomes
        .into_iter()
        .find(Result::is_err)
        .expect("one dispatch lost");
    match rejection {
        Err(CommandError::Domain(error)) => {
            assert_eq!(error.code, "INSUFFICIENT_BALANCE");
        }
        other => panic!("expected domain rejection, got {other:?}"),
    }

    let (balance, version) = balance_of(&harness, "A-1").await;
    assert_eq!(balance, Money::new(4000));
    assert_eq!(version, Version::new(1));
}

#[tokio::test]
async fn debits_on_distinct_accounts_run_independently() {
    let harness = harness();

    let (first, second) = tokio::join!(
        harness.router.dispatch(debit("A-1", 6000, "C-1")),
        harness.router.dispatch(debit("A-2", 6000, "C-2")),
    );

    assert!(first.is_ok());
    assert!(second.is_ok());

    let (balance_one, _) = balance_of(&harness, "A-1").await;
    let (balance_two, _) = balance_of(&harness, "A-2").await;
    assert_eq!(balance_one, Money::new(4000));
    assert_eq!(balance_two, Money::new(4000));
}

#[tokio::test]
async fn racing_transfer_instances_settle_exactly_one_winner() {
    let harness = harness();

    let engine = Arc::new(
        InProcessEngine::builder()
            .register(
                DEBIT_JOB_TYPE,
                Arc::new(DebitWorker::new(Arc::clone(&harness.router))),
            )
            .register(
                BOOK_JOB_TYPE,
                Arc::new(BookWorker::new(Arc::clone(&harness.router))),
            )
            .process(MONEY_TRANSFER_PROCESS, [DEBIT_JOB_TYPE, BOOK_JOB_TYPE])
            .build()
            .expect("every step has a handler"),
    );

    let variables = |transfer_id: &str| -> HashMap<String, Value> {
        HashMap::from([
            ("accountId".to_string(), json!("A-1")),
            ("amount".to_string(), json!(6000)),
            ("transferId".to_string(), json!(transfer_id)),
        ])
    };

    let (first, second) = tokio::join!(
        engine.start_process(MONEY_TRANSFER_PROCESS, variables("T-race-1")),
        engine.start_process(MONEY_TRANSFER_PROCESS, variables("T-race-2")),
    );
    let first = first.expect("first instance starts");
    let second = second.expect("second instance starts");

    let first_state = engine
        .wait_for_completion(first.process_instance_key)
        .await
        .expect("first instance is known");
    let second_state = engine
        .wait_for_completion(second.process_instance_key)
        .await
        .expect("second instance is known");

    let mut states = [first_state, second_state];
    states.sort_by_key(|state| *state == ProcessState::Incident);
    assert_eq!(states, [ProcessState::Completed, ProcessState::Incident]);

    let (balance, version) = balance_of(&harness, "A-1").await;
    assert_eq!(balance, Money::new(4000));
    assert_eq!(version, Version::new(1));

    // One debit and one booking made it out; the loser published
    // nothing.
    assert_eq!(harness.bus.published_to("account.events.v1").len(), 1);
    assert_eq!(harness.bus.published_to("ledger.events.v1").len(), 1);

    // The booked ledger belongs to whichever transfer won the debit.
    let booked_runtime: AggregateRuntime<LedgerAggregate> =
        AggregateRuntime::new(harness.store.clone(), Arc::new(test_clock()));
    let first_ledger = booked_runtime
        .load("T-race-1")
        .await
        .expect("ledger loads");
    let second_ledger = booked_runtime
        .load("T-race-2")
        .await
        .expect("ledger loads");
    assert!(first_ledger.state.booked ^ second_ledger.state.booked);
}
