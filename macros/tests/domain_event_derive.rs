//! Tests for #[derive(DomainEvent)] macro

#![allow(clippy::expect_used)]

use moneyrail_core::event::DomainEvent;
use moneyrail_macros::DomainEvent;
use serde::{Deserialize, Serialize};

#[derive(DomainEvent, Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct AccountDebited {
    #[key]
    account_id: String,
    amount: u64,
    command_id: String,
    correlation_id: String,
    transfer_id: String,
}

#[derive(DomainEvent, Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
struct LedgerBooked {
    #[key]
    transfer_id: String,
    account_id: String,
    amount: u64,
    command_id: String,
    correlation_id: String,
}

fn debited() -> AccountDebited {
    AccountDebited {
        account_id: "A-1".to_string(),
        amount: 2500,
        command_id: "2251799813685249".to_string(),
        correlation_id: "6755399441055744".to_string(),
        transfer_id: "T-7d6f".to_string(),
    }
}

fn booked() -> LedgerBooked {
    LedgerBooked {
        transfer_id: "T-7d6f".to_string(),
        account_id: "A-1".to_string(),
        amount: 2500,
        command_id: "2251799813685250".to_string(),
        correlation_id: "6755399441055744".to_string(),
    }
}

#[test]
fn test_event_type_is_versioned_struct_name() {
    assert_eq!(debited().event_type(), "AccountDebited.v1");
    assert_eq!(booked().event_type(), "LedgerBooked.v1");
}

#[test]
fn test_partition_key_reads_the_key_field() {
    assert_eq!(debited().partition_key(), "A-1");
    assert_eq!(booked().partition_key(), "T-7d6f");
}

#[test]
fn test_command_id_reads_the_command_id_field() {
    assert_eq!(debited().command_id(), "2251799813685249");
    assert_eq!(booked().command_id(), "2251799813685250");
}

#[test]
fn test_store_bytes_round_trip() {
    let event = debited();
    let bytes = event.to_bytes().expect("serialization should succeed");
    let decoded = AccountDebited::from_bytes(&bytes).expect("deserialization should succeed");
    assert_eq!(decoded, event);
}

#[test]
fn test_wire_payload_is_flat_camel_case_json() {
    let wire = debited().to_wire().expect("wire encoding should succeed");
    let value: serde_json::Value = serde_json::from_slice(&wire).expect("wire form is JSON");

    assert_eq!(value["accountId"], "A-1");
    assert_eq!(value["amount"], 2500);
    assert_eq!(value["commandId"], "2251799813685249");
    assert_eq!(value["correlationId"], "6755399441055744");
    assert_eq!(value["transferId"], "T-7d6f");
    // Flat object, no type discriminator wrapper
    assert!(value.get("AccountDebited").is_none());
}
