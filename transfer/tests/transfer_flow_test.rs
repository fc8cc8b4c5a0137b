//! End-to-end transfer flow over the full in-process stack.
//!
//! Each test wires the real pieces together (HTTP surface, command
//! router, saga engine, event store, recording bus) and drives a
//! transfer from `POST /transfers` to its settled outcome, then checks
//! every side of the story: the HTTP response, the process instance
//! state, both aggregate streams rebuilt from the log, and what went
//! out on the bus.

#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use axum::http::StatusCode;
use axum_test::TestServer;
use moneyrail_core::event_store::InMemoryEventStore;
use moneyrail_core::stream::Version;
use moneyrail_runtime::{AggregateRuntime, RetryPolicy};
use moneyrail_testing::{InMemoryEventBus, test_clock};
use moneyrail_transfer::aggregates::{
    AccountAggregate, AccountState, INITIAL_BALANCE, LedgerAggregate, LedgerState,
};
use moneyrail_transfer::idempotency::IdempotencyStore;
use moneyrail_transfer::router::CommandRouter;
use moneyrail_transfer::saga::{
    BOOK_JOB_TYPE, BookWorker, DEBIT_JOB_TYPE, DebitWorker, InProcessEngine,
    MONEY_TRANSFER_PROCESS, ProcessState,
};
use moneyrail_transfer::server::{AppState, app};
use moneyrail_transfer::types::{AcceptedTransfer, Money};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

/// The assembled service plus handles on its internals for assertions.
struct Stack {
    server: TestServer,
    store: Arc<InMemoryEventStore>,
    bus: Arc<InMemoryEventBus>,
    engine: Arc<InProcessEngine>,
}

fn stack() -> Stack {
    let store = Arc::new(InMemoryEventStore::new());
    let bus = Arc::new(InMemoryEventBus::new());
    let clock = Arc::new(test_clock());

    let router = Arc::new(
        CommandRouter::new(
            store.clone(),
            bus.clone(),
            clock.clone(),
        )
        .with_retry_policy(
            RetryPolicy::builder()
                .max_retries(3)
                .initial_delay(Duration::from_millis(1))
                .max_delay(Duration::from_millis(5))
                .build(),
        ),
    );

    let engine = Arc::new(
        InProcessEngine::builder()
            .register(
                DEBIT_JOB_TYPE,
                Arc::new(DebitWorker::new(Arc::clone(&router))),
            )
            .register(
                BOOK_JOB_TYPE,
                Arc::new(BookWorker::new(Arc::clone(&router))),
            )
            .process(MONEY_TRANSFER_PROCESS, [DEBIT_JOB_TYPE, BOOK_JOB_TYPE])
            .build()
            .expect("every step has a handler"),
    );

    let state = AppState {
        router,
        engine: engine.clone(),
        idempotency: Arc::new(IdempotencyStore::new(
            chrono::Duration::hours(24),
            clock,
        )),
        process_id: MONEY_TRANSFER_PROCESS.to_string(),
    };

    let server = TestServer::new(app(state)).expect("test server starts");

    Stack {
        server,
        store,
        bus,
        engine,
    }
}

/// Rebuild the account from its stream, the way a fresh process would.
async fn load_account(stack: &Stack, account_id: &str) -> (AccountState, Version) {
    let runtime: AggregateRuntime<AccountAggregate> =
        AggregateRuntime::new(stack.store.clone(), Arc::new(test_clock()));
    let loaded = runtime.load(account_id).await.expect("account loads");
    (loaded.state, loaded.version)
}

/// Rebuild the ledger record for one transfer from its stream.
async fn load_ledger(stack: &Stack, transfer_id: &str) -> (LedgerState, Version) {
    let runtime: AggregateRuntime<LedgerAggregate> =
        AggregateRuntime::new(stack.store.clone(), Arc::new(test_clock()));
    let loaded = runtime.load(transfer_id).await.expect("ledger loads");
    (loaded.state, loaded.version)
}

async fn post_transfer(stack: &Stack, account_id: &str, amount: u64) -> AcceptedTransfer {
    let response = stack
        .server
        .post("/transfers")
        .json(&json!({ "accountId": account_id, "amount": amount }))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    response.json::<AcceptedTransfer>()
}

#[tokio::test]
async fn transfer_completes_and_settles_both_streams() {
    let stack = stack();

    let accepted = post_transfer(&stack, "A-1", 2500).await;
    assert!(accepted.transfer_id.as_str().starts_with("T-"));

    let settled = stack
        .engine
        .wait_for_completion(accepted.process_instance_key)
        .await
        .expect("instance is known");
    assert_eq!(settled, ProcessState::Completed);

    let (account, version) = load_account(&stack, "A-1").await;
    assert_eq!(account.balance, Money::new(7500));
    assert_eq!(version, Version::new(1));

    let (ledger, ledger_version) = load_ledger(&stack, accepted.transfer_id.as_str()).await;
    assert!(ledger.booked);
    assert_eq!(ledger_version, Version::new(1));
}

#[tokio::test]
async fn committed_events_reach_the_bus_with_wire_payloads() {
    let stack = stack();

    let accepted = post_transfer(&stack, "A-1", 2500).await;
    stack
        .engine
        .wait_for_completion(accepted.process_instance_key)
        .await
        .expect("instance is known");

    let debits = stack.bus.published_to("account.events.v1");
    assert_eq!(debits.len(), 1);
    assert_eq!(debits[0].key, "A-1");
    assert_eq!(debits[0].event.event_type, "AccountDebited.v1");

    let payload: Value =
        serde_json::from_slice(&debits[0].event.data).expect("wire payload is JSON");
    assert_eq!(payload["accountId"], "A-1");
    assert_eq!(payload["amount"], 2500);
    assert_eq!(payload["transferId"], accepted.transfer_id.as_str());
    assert_eq!(
        payload["correlationId"],
        accepted.process_instance_key.to_string()
    );

    let bookings = stack.bus.published_to("ledger.events.v1");
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].key, accepted.transfer_id.as_str());
    assert_eq!(bookings[0].event.event_type, "LedgerBooked.v1");

    let booking: Value =
        serde_json::from_slice(&bookings[0].event.data).expect("wire payload is JSON");
    assert_eq!(booking["transferId"], accepted.transfer_id.as_str());
    assert_eq!(booking["amount"], 2500);
}

#[tokio::test]
async fn insufficient_balance_raises_an_incident_and_leaves_no_events() {
    let stack = stack();

    // Accepted up front: the rejection happens asynchronously.
    let accepted = post_transfer(&stack, "A-1", 20_000).await;

    let settled = stack
        .engine
        .wait_for_completion(accepted.process_instance_key)
        .await
        .expect("instance is known");
    assert_eq!(settled, ProcessState::Incident);

    let (account, version) = load_account(&stack, "A-1").await;
    assert_eq!(account.balance, INITIAL_BALANCE);
    assert!(version.is_initial());

    let (ledger, _) = load_ledger(&stack, accepted.transfer_id.as_str()).await;
    assert!(!ledger.booked);

    assert!(stack.bus.is_empty());
}

#[tokio::test]
async fn sequential_transfers_drain_the_balance_in_order() {
    let stack = stack();

    let first = post_transfer(&stack, "A-1", 2500).await;
    stack
        .engine
        .wait_for_completion(first.process_instance_key)
        .await
        .expect("first instance is known");

    let second = post_transfer(&stack, "A-1", 1000).await;
    stack
        .engine
        .wait_for_completion(second.process_instance_key)
        .await
        .expect("second instance is known");

    let (account, version) = load_account(&stack, "A-1").await;
    assert_eq!(account.balance, Money::new(6500));
    assert_eq!(version, Version::new(2));

    // Each transfer booked its own ledger stream.
    let (first_ledger, _) = load_ledger(&stack, first.transfer_id.as_str()).await;
    let (second_ledger, _) = load_ledger(&stack, second.transfer_id.as_str()).await;
    assert!(first_ledger.booked);
    assert!(second_ledger.booked);
    assert_ne!(first.transfer_id, second.transfer_id);
}

#[tokio::test]
async fn replaying_the_stream_is_deterministic() {
    let stack = stack();

    let accepted = post_transfer(&stack, "A-1", 4000).await;
    stack
        .engine
        .wait_for_completion(accepted.process_instance_key)
        .await
        .expect("instance is known");

    let (first_state, first_version) = load_account(&stack, "A-1").await;
    let (second_state, second_version) = load_account(&stack, "A-1").await;

    assert_eq!(first_state.balance, second_state.balance);
    assert_eq!(first_version, second_version);
    assert_eq!(first_state.balance, Money::new(6000));
}

#[tokio::test]
async fn blank_account_id_is_rejected_before_anything_starts() {
    let stack = stack();

    let response = stack
        .server
        .post("/transfers")
        .json(&json!({ "accountId": "   ", "amount": 100 }))
        .await;

    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(stack.engine.instance_count(), 0);
    assert!(stack.bus.is_empty());
}

#[tokio::test]
async fn health_endpoint_answers_ok() {
    let stack = stack();

    let response = stack.server.get("/healthz").await;
    response.assert_status_ok();
    response.assert_text("ok");
}
