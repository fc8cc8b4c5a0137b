//! Ergonomic testing utilities for aggregates
//!
//! This module provides a fluent API for testing aggregate handlers with
//! readable Given-When-Then syntax. The harness exercises only the pure
//! halves of the aggregate contract (`handle` and `apply`), so no store,
//! bus, or executor is involved.

#![allow(clippy::module_name_repetitions)] // AggregateTest is the natural name

use moneyrail_core::aggregate::{Aggregate, DomainError};

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for event assertion functions
type EventsAssertion<E> = Box<dyn FnOnce(&[E])>;

/// Type alias for error assertion functions
type ErrorAssertion = Box<dyn FnOnce(&DomainError)>;

/// Fluent API for testing aggregates with Given-When-Then syntax
///
/// The starting state is `A::initial_state()` unless overridden with
/// [`given_state`](Self::given_state); [`given_events`](Self::given_events)
/// replays history on top of it. [`run`](Self::run) invokes the handler
/// once, applies any produced events, and executes the assertions.
///
/// # Example
///
/// ```ignore
/// use moneyrail_testing::AggregateTest;
///
/// AggregateTest::<AccountAggregate>::new()
///     .given_events([debited(2500)])
///     .when(debit_command(8000))
///     .then_error(|error| {
///         assert_eq!(error.code, "INSUFFICIENT_BALANCE");
///     })
///     .run();
/// ```
pub struct AggregateTest<A: Aggregate> {
    initial_state: Option<A::State>,
    history: Vec<A::Event>,
    command: Option<A::Command>,
    events_assertions: Vec<EventsAssertion<A::Event>>,
    error_assertion: Option<ErrorAssertion>,
    state_assertions: Vec<StateAssertion<A::State>>,
}

impl<A: Aggregate> Default for AggregateTest<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Aggregate> AggregateTest<A> {
    /// Create a new aggregate test
    #[must_use]
    pub const fn new() -> Self {
        Self {
            initial_state: None,
            history: Vec::new(),
            command: None,
            events_assertions: Vec::new(),
            error_assertion: None,
            state_assertions: Vec::new(),
        }
    }

    /// Override the starting state (Given)
    #[must_use]
    pub fn given_state(mut self, state: A::State) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Replay prior events onto the starting state (Given)
    #[must_use]
    pub fn given_events(mut self, events: impl IntoIterator<Item = A::Event>) -> Self {
        self.history.extend(events);
        self
    }

    /// Set the command under test (When)
    #[must_use]
    pub fn when(mut self, command: A::Command) -> Self {
        self.command = Some(command);
        self
    }

    /// Add an assertion about the produced events (Then)
    #[must_use]
    pub fn then_events<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[A::Event]) + 'static,
    {
        self.events_assertions.push(Box::new(assertion));
        self
    }

    /// Expect the handler to reject the command (Then)
    #[must_use]
    pub fn then_error<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&DomainError) + 'static,
    {
        self.error_assertion = Some(Box::new(assertion));
        self
    }

    /// Add an assertion about the final state (Then)
    ///
    /// Runs after produced events have been applied.
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&A::State) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if no command was set, if the handler outcome contradicts the
    /// assertions (`then_error` with a successful handler, produced-event
    /// assertions with a failing handler), or if any assertion fails.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self.initial_state.unwrap_or_else(A::initial_state);

        for event in &self.history {
            A::apply(&mut state, event);
        }

        let command = self.command.expect("Command must be set with when()");

        match A::handle(&state, &command) {
            Ok(events) => {
                assert!(
                    self.error_assertion.is_none(),
                    "Expected a DomainError, but the handler produced {} event(s)",
                    events.len()
                );

                for event in &events {
                    A::apply(&mut state, event);
                }

                for assertion in self.events_assertions {
                    assertion(&events);
                }
            },
            Err(error) => {
                assert!(
                    self.events_assertions.is_empty(),
                    "Expected events, but the handler failed: {error}"
                );

                let Some(assertion) = self.error_assertion else {
                    panic!("Handler failed unexpectedly: {error}");
                };
                assertion(&error);
            },
        }

        for assertion in self.state_assertions {
            assertion(&state);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moneyrail_core::aggregate::{Command, ProducedEvents};
    use moneyrail_core::event::DomainEvent;
    use serde::{Deserialize, Serialize};
    use smallvec::smallvec;

    #[derive(Clone, Debug, Default)]
    struct TallyState {
        total: u64,
    }

    struct Add {
        amount: u64,
        command_id: String,
        correlation_id: String,
    }

    impl Command for Add {
        fn entity_id(&self) -> &str {
            "tally-1"
        }

        fn command_id(&self) -> &str {
            &self.command_id
        }

        fn correlation_id(&self) -> &str {
            &self.correlation_id
        }
    }

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct Added {
        amount: u64,
        command_id: String,
    }

    impl DomainEvent for Added {
        fn event_type(&self) -> &'static str {
            "Added.v1"
        }

        fn partition_key(&self) -> &str {
            "tally"
        }

        fn command_id(&self) -> &str {
            &self.command_id
        }
    }

    struct TallyAggregate;

    impl Aggregate for TallyAggregate {
        type State = TallyState;
        type Command = Add;
        type Event = Added;

        const AGGREGATE_TYPE: &'static str = "tally";

        fn initial_state() -> TallyState {
            TallyState::default()
        }

        fn handle(
            state: &TallyState,
            command: &Add,
        ) -> Result<ProducedEvents<Added>, DomainError> {
            if state.total + command.amount > 100 {
                return Err(DomainError::new("TALLY_FULL", "tally would exceed 100"));
            }
            Ok(smallvec![Added {
                amount: command.amount,
                command_id: command.command_id.clone(),
            }])
        }

        fn apply(state: &mut TallyState, event: &Added) {
            state.total += event.amount;
        }
    }

    fn add(amount: u64) -> Add {
        Add {
            amount,
            command_id: format!("cmd-{amount}"),
            correlation_id: "corr-1".to_string(),
        }
    }

    #[test]
    fn test_success_path_applies_events() {
        AggregateTest::<TallyAggregate>::new()
            .when(add(30))
            .then_events(|events| {
                assert_eq!(events.len(), 1);
                assert_eq!(events[0].amount, 30);
            })
            .then_state(|state| {
                assert_eq!(state.total, 30);
            })
            .run();
    }

    #[test]
    fn test_given_events_replay_before_the_command() {
        AggregateTest::<TallyAggregate>::new()
            .given_events([
                Added {
                    amount: 40,
                    command_id: "cmd-a".to_string(),
                },
                Added {
                    amount: 50,
                    command_id: "cmd-b".to_string(),
                },
            ])
            .when(add(20))
            .then_error(|error| {
                assert_eq!(error.code, "TALLY_FULL");
            })
            .then_state(|state| {
                // Failed command leaves replayed state untouched
                assert_eq!(state.total, 90);
            })
            .run();
    }

    #[test]
    fn test_given_state_overrides_initial() {
        AggregateTest::<TallyAggregate>::new()
            .given_state(TallyState { total: 99 })
            .when(add(1))
            .then_state(|state| {
                assert_eq!(state.total, 100);
            })
            .run();
    }

    #[test]
    #[should_panic(expected = "Handler failed unexpectedly")]
    fn test_unexpected_error_panics() {
        AggregateTest::<TallyAggregate>::new()
            .given_state(TallyState { total: 100 })
            .when(add(1))
            .run();
    }
}
