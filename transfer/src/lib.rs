//! # MoneyRail Transfer
//!
//! The money transfer service: an HTTP API that accepts transfer
//! requests and a two-step saga that executes them against
//! event-sourced account and ledger aggregates.
//!
//! ## Request Flow
//!
//! ```text
//! POST /transfers ──► Idempotency claim ──► start process instance
//!                                                  │
//!                              ┌───────────────────┴───────────────┐
//!                              ▼                                   ▼
//!                     debit job ──► router ──► account    book job ──► router ──► ledger
//!                              │                                   │
//!                              └── events ──► store + bus ◄────────┘
//! ```
//!
//! The request answers `202 Accepted` as soon as the process instance
//! exists; the debit and booking steps run asynchronously, joined to
//! the request trace by a `traceparent` process variable.
//!
//! ## Core Components
//!
//! - **`aggregates`**: the account (debit) and ledger (booking) aggregates
//! - **`router`**: variant dispatch to the aggregate runtimes plus post-commit publishing
//! - **`saga`**: the process engine contract, the two workers, trace propagation
//! - **`idempotency`**: at-most-one execution per `Idempotency-Key`
//! - **`server`**: the Axum surface (`POST /transfers`, `GET /healthz`)

pub mod aggregates;

/// Environment-driven service configuration
pub mod config;

/// At-most-one execution per idempotency key
pub mod idempotency;

/// Command dispatch and post-commit publishing
pub mod router;

/// Saga engine contract, workers, and trace propagation
pub mod saga;

/// HTTP surface
pub mod server;

/// Identifier and value types
pub mod types;

pub use aggregates::{
    AccountAggregate, AccountDebited, BookLedger, DebitAccount, LedgerAggregate, LedgerBooked,
};
pub use config::Config;
pub use idempotency::{Claim, ClaimToken, IdempotencyStore};
pub use router::{CommandRouter, DispatchOutcome, TransferCommand};
pub use saga::{InProcessEngine, MONEY_TRANSFER_PROCESS, ProcessEngine, ProcessState};
pub use server::{AppState, app};
pub use types::{AcceptedTransfer, AccountId, Money, TransferId};
