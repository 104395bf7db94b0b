//! Kind-specific intent validation
//!
//! Each TransactionKind constrains which references an intent may carry.
//! The writer rejects malformed intents before any balance is touched.

use crate::entry::{TransactionIntent, TransactionKind};
use crate::error::LedgerError;

/// Validation result with detailed error
pub type ValidationResult = Result<(), LedgerError>;

/// Validate an intent according to its kind.
pub fn validate_intent(intent: &TransactionIntent) -> ValidationResult {
    if intent.amount.is_zero() {
        return Err(LedgerError::ZeroAmount { kind: intent.kind });
    }

    if let Some(key) = &intent.idempotency_key {
        if key.is_empty() {
            return Err(LedgerError::EmptyIdempotencyKey);
        }
    }

    match intent.kind {
        TransactionKind::Tip | TransactionKind::Refund => validate_tip_shaped(intent),
        TransactionKind::TopUp | TransactionKind::PayOut | TransactionKind::EscrowClaim => {
            validate_wallet_only(intent)
        }
    }
}

/// TIP/REFUND: media and bid required, party optional (absent = global scope)
fn validate_tip_shaped(intent: &TransactionIntent) -> ValidationResult {
    if intent.media_id.is_none() {
        return Err(LedgerError::MissingField {
            kind: intent.kind,
            field: "media",
        });
    }
    if intent.bid_id.is_none() {
        return Err(LedgerError::MissingField {
            kind: intent.kind,
            field: "bid",
        });
    }
    Ok(())
}

/// TOP_UP/PAY_OUT/ESCROW_CLAIM: wallet-only, no media/party/bid references
fn validate_wallet_only(intent: &TransactionIntent) -> ValidationResult {
    if intent.media_id.is_some() {
        return Err(LedgerError::ForbiddenField {
            kind: intent.kind,
            field: "media",
        });
    }
    if intent.party_id.is_some() {
        return Err(LedgerError::ForbiddenField {
            kind: intent.kind,
            field: "party",
        });
    }
    if intent.bid_id.is_some() {
        return Err(LedgerError::ForbiddenField {
            kind: intent.kind,
            field: "bid",
        });
    }
    Ok(())
}
