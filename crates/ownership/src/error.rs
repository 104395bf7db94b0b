//! Ownership errors

use thiserror::Error;
use tipjar_store::StoreError;

#[derive(Debug, Error)]
pub enum OwnershipError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Ownership of media {media_id} would reach {attempted}%, exceeding 100%")]
    OwnershipOverflow { media_id: String, attempted: u32 },

    #[error("Percentage must be between 1 and 100, got {0}")]
    InvalidPercentage(u32),

    #[error("User {user_id} is not an owner of media {media_id}")]
    NotAnOwner { media_id: String, user_id: String },
}
