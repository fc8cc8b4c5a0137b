//! # MoneyRail Testing
//!
//! Testing utilities and helpers for the MoneyRail event-sourced transfer
//! core.
//!
//! This crate provides:
//! - Mock implementations of environment traits ([`mocks::FixedClock`],
//!   [`mocks::InMemoryEventBus`])
//! - The fluent [`AggregateTest`] harness for aggregate handlers
//!
//! ## Example
//!
//! ```ignore
//! use moneyrail_testing::AggregateTest;
//!
//! #[test]
//! fn debit_reduces_the_balance() {
//!     AggregateTest::<AccountAggregate>::new()
//!         .when(debit("A-1", 2500))
//!         .then_events(|events| assert_eq!(events.len(), 1))
//!         .then_state(|state| assert_eq!(state.balance, 7500))
//!         .run();
//! }
//! ```

pub mod aggregate_test;
pub mod mocks;

// Re-export commonly used items
pub use aggregate_test::AggregateTest;
pub use mocks::{FixedClock, InMemoryEventBus, test_clock};
