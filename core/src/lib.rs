//! # MoneyRail Core
//!
//! Core traits and types for the MoneyRail event-sourced transfer core.
//!
//! This crate provides the fundamental abstractions for building
//! event-sourced aggregates coordinated by a saga orchestrator.
//!
//! ## Core Concepts
//!
//! - **Stream**: The per-aggregate event log address ([`stream::StreamId`])
//!   and its position ([`stream::Version`])
//! - **Event**: An immutable fact, serialized once for the log and once for
//!   the wire ([`event::DomainEvent`], [`event::SerializedEvent`])
//! - **Event Store**: Append-only log with optimistic concurrency
//!   ([`event_store::EventStore`])
//! - **Event Bus**: At-least-once keyed publication of committed events
//!   ([`event_bus::EventBus`])
//! - **Aggregate**: Pure `handle` (decide) and `apply` (transition) over
//!   replayed state ([`aggregate::Aggregate`])
//! - **Environment**: Injected dependencies via traits
//!   ([`environment::Clock`])
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell
//! - The log is the source of truth; state is always derivable from it
//! - Explicit seams (store, bus, clock) behind traits
//! - Duplicate commands are absorbed, never re-executed
//!
//! ## Example
//!
//! ```ignore
//! use moneyrail_core::aggregate::{Aggregate, DomainError, ProducedEvents};
//!
//! struct AccountAggregate;
//!
//! impl Aggregate for AccountAggregate {
//!     type State = AccountState;
//!     type Command = DebitAccount;
//!     type Event = AccountDebited;
//!
//!     const AGGREGATE_TYPE: &'static str = "account";
//!
//!     fn initial_state() -> AccountState {
//!         AccountState::default()
//!     }
//!
//!     fn handle(
//!         state: &AccountState,
//!         command: &DebitAccount,
//!     ) -> Result<ProducedEvents<AccountDebited>, DomainError> {
//!         // decide: reject or emit events
//!     }
//!
//!     fn apply(state: &mut AccountState, event: &AccountDebited) {
//!         // transition: fold the event into state
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

pub mod aggregate;
pub mod environment;
pub mod event;
pub mod event_bus;
pub mod event_store;
pub mod stream;
