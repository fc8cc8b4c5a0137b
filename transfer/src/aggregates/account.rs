//! Account aggregate: the debit side of a transfer.
//!
//! State is a single balance folded from `AccountDebited` events. The
//! handler enforces the one business rule of this side (never debit
//! more than the balance) and the transition subtracts. Accounts are
//! materialized with a fixed demo balance; provisioning real accounts
//! is a deployment concern, not this aggregate's.

use crate::types::{AccountId, Money, TransferId};
use moneyrail_core::aggregate::{Aggregate, Command, DomainError, ProducedEvents};
use moneyrail_core::smallvec;
use moneyrail_macros::DomainEvent;
use serde::{Deserialize, Serialize};

/// Balance every account starts with, in minor units.
pub const INITIAL_BALANCE: Money = Money::new(10_000);

/// Current state of one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountState {
    /// Remaining balance in minor units.
    pub balance: Money,
}

/// Command to debit an account as one step of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebitAccount {
    /// Account to debit.
    pub account_id: AccountId,
    /// Amount to debit, in minor units.
    pub amount: Money,
    /// Transfer this debit belongs to.
    pub transfer_id: TransferId,
    /// Unique id of this command delivery.
    pub command_id: String,
    /// Id of the saga run this command belongs to.
    pub correlation_id: String,
}

impl Command for DebitAccount {
    fn entity_id(&self) -> &str {
        self.account_id.as_str()
    }

    fn command_id(&self) -> &str {
        &self.command_id
    }

    fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// An account's balance was reduced by a transfer debit.
#[derive(DomainEvent, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDebited {
    /// Account the amount was taken from.
    #[key]
    pub account_id: AccountId,
    /// Debited amount in minor units.
    pub amount: Money,
    /// Transfer this debit belongs to.
    pub transfer_id: TransferId,
    /// Command that caused this event.
    pub command_id: String,
    /// Saga run this event belongs to.
    pub correlation_id: String,
}

/// Marker type wiring `AccountState`/`DebitAccount`/`AccountDebited`
/// into the aggregate contract.
pub struct AccountAggregate;

impl Aggregate for AccountAggregate {
    type State = AccountState;
    type Command = DebitAccount;
    type Event = AccountDebited;

    const AGGREGATE_TYPE: &'static str = "account";

    fn initial_state() -> AccountState {
        AccountState {
            balance: INITIAL_BALANCE,
        }
    }

    fn handle(
        state: &AccountState,
        command: &DebitAccount,
    ) -> Result<ProducedEvents<AccountDebited>, DomainError> {
        if command.amount > state.balance {
            return Err(DomainError::new(
                "INSUFFICIENT_BALANCE",
                format!(
                    "Insufficient balance: {} < {}",
                    state.balance, command.amount
                ),
            ));
        }

        Ok(smallvec![AccountDebited {
            account_id: command.account_id.clone(),
            amount: command.amount,
            transfer_id: command.transfer_id.clone(),
            command_id: command.command_id.clone(),
            correlation_id: command.correlation_id.clone(),
        }])
    }

    fn apply(state: &mut AccountState, event: &AccountDebited) {
        state.balance = state.balance.saturating_sub(event.amount);
    }
}
