//! Store errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sequence assignment failed for counter '{name}': {message}")]
    SequenceAssignment { name: String, message: String },

    #[error("No ledger entry at sequence {sequence}")]
    EntryNotFound { sequence: u64 },

    #[error("No verification record for {entry_type}/{entry_id}")]
    VerificationRecordNotFound {
        entry_type: String,
        entry_id: String,
    },

    #[error("Database lock poisoned")]
    LockPoisoned,
}

impl StoreError {
    /// Whether the failed operation left no state behind and may be retried
    /// wholesale by the caller.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::SequenceAssignment { .. } => true,
            StoreError::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }
}
