//! TipJar Core - Domain types
//!
//! This crate contains the fundamental types used across TipJar:
//! - `Pence`: Non-negative integer wrapper for monetary amounts
//! - `TuneBytes`: Non-negative integer wrapper for reward points
//! - Typed identifiers (`UserId`, `MediaId`, `PartyId`)

pub mod amount;
pub mod ids;

pub use amount::{AmountError, Pence, TuneBytes};
pub use ids::{MediaId, PartyId, UserId};
