//! Escrow errors

use thiserror::Error;
use tipjar_engine::EngineError;
use tipjar_ownership::OwnershipError;
use tipjar_store::StoreError;

#[derive(Debug, Error)]
pub enum EscrowError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Ledger error: {0}")]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Ownership(#[from] OwnershipError),

    #[error("No escrow allocation with id {0}")]
    AllocationNotFound(String),

    #[error("Allocation {allocation_id} already claimed")]
    AllocationAlreadyClaimed { allocation_id: String },

    #[error("Allocation {allocation_id} was voided when its bid was reversed")]
    AllocationVoided { allocation_id: String },

    #[error("Percentage must be between 1 and 100, got {0}")]
    InvalidPercentage(u32),

    #[error("Invalid matching criteria: {0}")]
    InvalidCriteria(String),
}
