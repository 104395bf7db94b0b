//! TipJar Ledger - Append-only financial entries
//!
//! This is the HEART of TipJar. Every balance-affecting event becomes exactly
//! one `LedgerEntry`: sequenced, snapshotted, and stamped with a tamper-evident
//! digest.
//!
//! # Key Types
//! - `LedgerEntry`: Immutable record of one financial event
//! - `TransactionIntent`: A request to record one event
//! - `TransactionKind`: TIP / REFUND / TOP_UP / PAY_OUT / ESCROW_CLAIM
//! - `Snapshots`: Pre/post balance values captured in the entry

pub mod entry;
pub mod error;
pub mod hash;
pub mod validation;

pub use entry::{
    EntryStatus, LedgerEntry, Snapshots, TransactionIntent, TransactionKind,
};
pub use error::LedgerError;
pub use hash::{canonical_now, canonical_timestamp, digest_entry, verify_entry, DIGEST_VERSION};
pub use validation::validate_intent;
