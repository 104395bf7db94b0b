//! TipJar Engine - the Ledger Writer
//!
//! This crate is the only component allowed to mutate balances. Every intent
//! becomes one transaction: resolve pre-values, compute post-values, take a
//! sequence number, digest, persist entry + verification record, apply the
//! post-values. All of it commits or none of it does.

pub mod error;
pub mod integrity;
pub mod writer;

pub use error::EngineError;
pub use integrity::{BackfillOutcome, IntegrityAuditor, IntegrityMismatch, IntegrityReport};
pub use writer::{LedgerWriter, Recorded};
