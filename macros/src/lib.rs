//! Derive macros for the MoneyRail event-sourced transfer core
//!
//! This crate provides procedural macros to reduce boilerplate when
//! defining domain events.
//!
//! # Available Macros
//!
//! - `#[derive(DomainEvent)]` - Implements the
//!   `moneyrail_core::event::DomainEvent` trait for event structs
//!
//! # Example
//!
//! ```ignore
//! use moneyrail_macros::DomainEvent;
//!
//! #[derive(DomainEvent, Clone, Debug, Serialize, Deserialize)]
//! #[serde(rename_all = "camelCase")]
//! struct AccountDebited {
//!     #[key]
//!     account_id: AccountId,
//!     amount: Money,
//!     command_id: CommandId,
//!     correlation_id: CorrelationId,
//!     transfer_id: TransferId,
//! }
//!
//! // Generated trait impl:
//! assert_eq!(event.event_type(), "AccountDebited.v1");
//! assert_eq!(event.partition_key(), "A-1");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Fields};

/// Derive macro for domain event structs
///
/// Implements `moneyrail_core::event::DomainEvent`:
/// - `event_type()` - `"{StructName}.v1"`, the versioned wire name
/// - `partition_key()` - the field marked `#[key]`, read via `AsRef<str>`
/// - `command_id()` - the mandatory `command_id` field, read via `AsRef<str>`
///
/// # Attributes
///
/// - `#[key]` - Mark exactly one field as the bus partition key
///
/// # Panics
///
/// This macro will produce a compile error (not a runtime panic) if:
/// - Applied to anything but a struct with named fields
/// - No field (or more than one field) carries `#[key]`
/// - The struct has no `command_id` field
///
/// # Example
///
/// ```ignore
/// #[derive(DomainEvent, Clone, Debug, Serialize, Deserialize)]
/// #[serde(rename_all = "camelCase")]
/// struct LedgerBooked {
///     #[key]
///     transfer_id: TransferId,
///     account_id: AccountId,
///     amount: Money,
///     command_id: CommandId,
///     correlation_id: CorrelationId,
/// }
/// ```
#[proc_macro_derive(DomainEvent, attributes(key))]
#[allow(clippy::expect_used)] // Proc macro panics become compile errors, not runtime panics
pub fn derive_domain_event(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let Data::Struct(data_struct) = &input.data else {
        return syn::Error::new_spanned(
            input,
            "#[derive(DomainEvent)] can only be used on structs",
        )
        .to_compile_error()
        .into();
    };

    let Fields::Named(fields) = &data_struct.fields else {
        return syn::Error::new_spanned(
            &data_struct.fields,
            "#[derive(DomainEvent)] requires named fields",
        )
        .to_compile_error()
        .into();
    };

    let mut key_fields = fields
        .named
        .iter()
        .filter(|field| has_attribute(&field.attrs, "key"));

    let Some(key_field) = key_fields.next() else {
        return syn::Error::new_spanned(
            fields,
            "#[derive(DomainEvent)] requires exactly one field marked #[key]",
        )
        .to_compile_error()
        .into();
    };

    if let Some(extra) = key_fields.next() {
        return syn::Error::new_spanned(extra, "only one field may be marked #[key]")
            .to_compile_error()
            .into();
    }

    // SAFETY: Fields::Named guarantees every field has an ident
    let key_ident = key_field.ident.as_ref().expect("named field must have ident");

    let has_command_id = fields
        .named
        .iter()
        .any(|field| field.ident.as_ref().is_some_and(|ident| ident == "command_id"));

    if !has_command_id {
        return syn::Error::new_spanned(
            fields,
            "#[derive(DomainEvent)] requires a `command_id` field",
        )
        .to_compile_error()
        .into();
    }

    let type_name = format!("{name}.v1");

    let expanded = quote! {
        impl moneyrail_core::event::DomainEvent for #name {
            fn event_type(&self) -> &'static str {
                #type_name
            }

            fn partition_key(&self) -> &str {
                ::std::convert::AsRef::<str>::as_ref(&self.#key_ident)
            }

            fn command_id(&self) -> &str {
                ::std::convert::AsRef::<str>::as_ref(&self.command_id)
            }
        }
    };

    TokenStream::from(expanded)
}

/// Helper function to check if an attribute list contains a specific attribute
fn has_attribute(attrs: &[Attribute], name: &str) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident(name))
}
