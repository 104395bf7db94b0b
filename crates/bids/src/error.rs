//! Bid errors

use crate::bid::BidStatus;
use thiserror::Error;
use tipjar_engine::EngineError;
use tipjar_escrow::EscrowError;
use tipjar_store::StoreError;

#[derive(Debug, Error)]
pub enum BidError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Ledger error: {0}")]
    Engine(#[from] EngineError),

    #[error("Escrow error: {0}")]
    Escrow(#[from] EscrowError),

    #[error("No bid with id {0}")]
    BidNotFound(String),

    #[error("Bid {bid_id} cannot move from {from} to {to}")]
    InvalidTransition {
        bid_id: String,
        from: BidStatus,
        to: BidStatus,
    },
}
