//! Ledger aggregate: the record-keeping side of a transfer.
//!
//! One ledger entity per transfer id. The handler never rejects: by
//! the time the saga reaches the booking step the debit has already
//! committed, so the ledger's job is to record that fact, not to
//! re-validate it.

use crate::types::{AccountId, Money, TransferId};
use moneyrail_core::aggregate::{Aggregate, Command, DomainError, ProducedEvents};
use moneyrail_core::smallvec;
use moneyrail_macros::DomainEvent;
use serde::{Deserialize, Serialize};

/// Current state of one ledger entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerState {
    /// Whether this transfer has been booked.
    pub booked: bool,
}

/// Command to book a completed debit into the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookLedger {
    /// Transfer being booked; also the ledger entity id.
    pub transfer_id: TransferId,
    /// Account the booked amount was debited from.
    pub account_id: AccountId,
    /// Booked amount in minor units.
    pub amount: Money,
    /// Unique id of this command delivery.
    pub command_id: String,
    /// Id of the saga run this command belongs to.
    pub correlation_id: String,
}

impl Command for BookLedger {
    fn entity_id(&self) -> &str {
        self.transfer_id.as_str()
    }

    fn command_id(&self) -> &str {
        &self.command_id
    }

    fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// A transfer was booked into the ledger.
#[derive(DomainEvent, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerBooked {
    /// Booked transfer; partition key of the ledger topic.
    #[key]
    pub transfer_id: TransferId,
    /// Account the amount was debited from.
    pub account_id: AccountId,
    /// Booked amount in minor units.
    pub amount: Money,
    /// Command that caused this event.
    pub command_id: String,
    /// Saga run this event belongs to.
    pub correlation_id: String,
}

/// Marker type wiring `LedgerState`/`BookLedger`/`LedgerBooked` into
/// the aggregate contract.
pub struct LedgerAggregate;

impl Aggregate for LedgerAggregate {
    type State = LedgerState;
    type Command = BookLedger;
    type Event = LedgerBooked;

    const AGGREGATE_TYPE: &'static str = "ledger";

    fn initial_state() -> LedgerState {
        LedgerState::default()
    }

    fn handle(
        _state: &LedgerState,
        command: &BookLedger,
    ) -> Result<ProducedEvents<LedgerBooked>, DomainError> {
        Ok(smallvec![LedgerBooked {
            transfer_id: command.transfer_id.clone(),
            account_id: command.account_id.clone(),
            amount: command.amount,
            command_id: command.command_id.clone(),
            correlation_id: command.correlation_id.clone(),
        }])
    }

    fn apply(state: &mut LedgerState, _event: &LedgerBooked) {
        state.booked = true;
    }
}
