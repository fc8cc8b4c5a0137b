//! Aggregate module - the contract every event-sourced aggregate implements.
//!
//! An aggregate is a consistency boundary: its state is derived solely by
//! folding its event log, and every change goes through a pure decision
//! function. The trait splits the cycle into two pure halves:
//!
//! - **handle**: `(state, command) -> events | DomainError`. Validates the
//!   command against current state and decides what happened. No I/O.
//! - **apply**: `(state, event) -> state`. The transition function folded
//!   over the log during replay and over fresh events after an append.
//!
//! The runtime crate owns everything impure around these two functions:
//! loading, duplicate-command detection, optimistic appends and retries.
//! Because both halves are pure, aggregates are testable without any
//! store, bus, or executor.

use crate::event::DomainEvent;
use crate::stream::StreamId;
use serde::Serialize;
use serde::de::DeserializeOwned;
use smallvec::SmallVec;
use thiserror::Error;

/// Terminal business-rule violation.
///
/// A `DomainError` means the command was understood and rejected: retrying
/// it against the same state fails identically. The machine-readable `code`
/// travels to the caller or workflow engine; the `message` is for humans.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct DomainError {
    /// Stable machine-readable code, e.g. `INSUFFICIENT_BALANCE`.
    pub code: String,
    /// Human-readable detail.
    pub message: String,
}

impl DomainError {
    /// Create a domain error from a code and message.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// A request to change one aggregate's state.
///
/// Commands are immutable value objects. The command id is globally unique
/// and is how the runtime detects re-delivery of the same logical request;
/// the correlation id ties the command to the larger operation (the saga's
/// process instance) for tracing and audit.
pub trait Command: Send + Sync {
    /// Identifier of the entity this command addresses.
    ///
    /// Combined with [`Aggregate::AGGREGATE_TYPE`] this selects the
    /// stream the command is executed against.
    fn entity_id(&self) -> &str;

    /// Globally unique identifier of this command.
    fn command_id(&self) -> &str;

    /// Identifier of the larger operation this command belongs to.
    fn correlation_id(&self) -> &str;
}

/// Events a handler produces for one command.
///
/// Backed by a `SmallVec` sized for the common case of exactly one event;
/// zero and many are both valid outcomes.
pub type ProducedEvents<E> = SmallVec<[E; 1]>;

/// The contract of an event-sourced aggregate.
///
/// Implementors are zero-sized marker types; all behavior lives in pure
/// associated functions so it can run anywhere, including inside tests and
/// benches with no async machinery.
///
/// # Example
///
/// ```ignore
/// struct AccountAggregate;
///
/// impl Aggregate for AccountAggregate {
///     type State = AccountState;
///     type Command = DebitAccount;
///     type Event = AccountDebited;
///
///     const AGGREGATE_TYPE: &'static str = "account";
///
///     fn initial_state() -> AccountState {
///         AccountState::default()
///     }
///
///     fn handle(
///         state: &AccountState,
///         command: &DebitAccount,
///     ) -> Result<ProducedEvents<AccountDebited>, DomainError> {
///         // decide
///     }
///
///     fn apply(state: &mut AccountState, event: &AccountDebited) {
///         // transition
///     }
/// }
/// ```
pub trait Aggregate: Send + Sync + 'static {
    /// The state reconstructed by replaying this aggregate's events.
    type State: Clone + Send + Sync;

    /// The command type this aggregate accepts.
    type Command: Command;

    /// The event type this aggregate emits.
    type Event: DomainEvent + Serialize + DeserializeOwned + Clone;

    /// Stream prefix for this aggregate type, e.g. `"account"`.
    ///
    /// An entity's stream id is `"{AGGREGATE_TYPE}-{entity_id}"`.
    const AGGREGATE_TYPE: &'static str;

    /// State of an aggregate with an empty log.
    fn initial_state() -> Self::State;

    /// Decide what the command does to the current state.
    ///
    /// Pure: same state and command always produce the same result. The
    /// handler never mutates state; it only emits events (zero, one, or
    /// many) describing what happened.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError`] when a business rule rejects the command.
    /// This outcome is terminal: the runtime never retries it.
    fn handle(
        state: &Self::State,
        command: &Self::Command,
    ) -> Result<ProducedEvents<Self::Event>, DomainError>;

    /// Fold one event into the state.
    ///
    /// Pure and total: replaying a log through `apply` from
    /// [`initial_state`](Self::initial_state) always yields the same state.
    fn apply(state: &mut Self::State, event: &Self::Event);

    /// Stream id for one entity of this aggregate type.
    #[must_use]
    fn stream_id(entity_id: &str) -> StreamId {
        StreamId::for_aggregate(Self::AGGREGATE_TYPE, entity_id)
    }
}
