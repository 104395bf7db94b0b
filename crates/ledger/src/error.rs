//! Ledger errors

use crate::entry::TransactionKind;
use thiserror::Error;

/// Errors raised while validating or constructing ledger entries
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("{kind} requires a {field} reference")]
    MissingField {
        kind: TransactionKind,
        field: &'static str,
    },

    #[error("{kind} must not carry a {field} reference")]
    ForbiddenField {
        kind: TransactionKind,
        field: &'static str,
    },

    #[error("{kind} amount must be positive")]
    ZeroAmount { kind: TransactionKind },

    #[error("idempotency key cannot be empty")]
    EmptyIdempotencyKey,
}
