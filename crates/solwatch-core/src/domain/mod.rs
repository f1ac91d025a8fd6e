//! # Domain Models
//!
//! Canonical domain types for solwatch.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Address`] | Validated base58 account address |
//! | [`TransactionRecord`] | Normalized transaction (id, time, operations, outcome) |
//! | [`Operation`] | Opaque instruction descriptor |
//! | [`Outcome`] | `Success` or `Failed` |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! Construction of an [`Address`] validates its encoding, so an `Address`
//! value can always be sent upstream.

mod address;
mod timestamp;
mod transaction;

pub use address::Address;
pub use timestamp::UtcDateTime;
pub use transaction::{Operation, Outcome, TransactionRecord};
