//! The two aggregates a transfer touches: account (debit) and ledger
//! (booking).

pub mod account;
pub mod ledger;

pub use account::{AccountAggregate, AccountDebited, AccountState, DebitAccount, INITIAL_BALANCE};
pub use ledger::{BookLedger, LedgerAggregate, LedgerBooked, LedgerState};
