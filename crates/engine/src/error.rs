//! Engine errors

use thiserror::Error;
use tipjar_core::Pence;
use tipjar_ledger::LedgerError;
use tipjar_store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid intent: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds { available: Pence, requested: Pence },

    #[error("Applying this entry would make {field} negative")]
    NegativeAggregate { field: &'static str },

    #[error("Amount overflow updating {field}")]
    AmountOverflow { field: &'static str },

    #[error("Integrity mismatch on entry {entry_id} (sequence {sequence})")]
    IntegrityMismatch { sequence: u64, entry_id: String },
}

impl EngineError {
    /// A retryable failure left no state behind; the caller may re-submit
    /// the whole intent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Store(e) if e.is_retryable())
    }
}
