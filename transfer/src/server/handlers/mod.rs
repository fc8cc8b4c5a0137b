//! HTTP request handlers.

pub mod health;
pub mod transfers;

pub use health::healthz;
pub use transfers::create_transfer;
