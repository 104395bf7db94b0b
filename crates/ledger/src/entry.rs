//! Ledger entry and transaction intent types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tipjar_core::{MediaId, PartyId, Pence, TuneBytes, UserId};
use uuid::Uuid;

/// Classification of a balance-affecting event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// A user tips a media item (inside a party or globally)
    Tip,

    /// Exact reversal of an earlier TIP (veto or approved refund request)
    Refund,

    /// Wallet funding from the external payment collaborator
    TopUp,

    /// Approved withdrawal of wallet funds
    PayOut,

    /// Escrowed artist money credited to a newly registered claimant
    EscrowClaim,
}

/// Settlement status of an entry.
///
/// This core only produces `Confirmed` entries; `Pending` is reserved for
/// future asynchronous settlement and must survive serialization unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Confirmed,
    Pending,
}

/// Pre/post values captured at commit time for every aggregate an entry touches.
///
/// `None` means "not applicable for this transaction kind" and is distinct
/// from `Some(0)`. A TOP_UP, for example, carries wallet snapshots but null
/// media and platform snapshots, because those aggregates were not consulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Snapshots {
    pub user_balance_pre: Option<Pence>,
    pub user_balance_post: Option<Pence>,

    /// Lifetime total the user has tipped
    pub lifetime_pre: Option<Pence>,
    pub lifetime_post: Option<Pence>,

    /// Reward-point balance tracked in parallel with money
    pub tune_bytes_pre: Option<TuneBytes>,
    pub tune_bytes_post: Option<TuneBytes>,

    /// Running tip total for the target media item
    pub media_total_pre: Option<Pence>,
    pub media_total_post: Option<Pence>,

    /// Platform-wide tip total
    pub platform_total_pre: Option<Pence>,
    pub platform_total_post: Option<Pence>,
}

impl Snapshots {
    /// All-null snapshots, filled in field by field by the writer.
    pub fn none() -> Self {
        Self::default()
    }
}

/// One immutable, sequenced, digested record of a financial event.
///
/// Created once by the Ledger Writer and never updated or deleted. The only
/// permitted follow-up write is a one-time digest backfill, and that path is
/// guarded in the store layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Globally unique entry id
    pub id: Uuid,

    /// Strictly increasing total-order key, assigned once, never reused
    pub sequence: u64,

    pub kind: TransactionKind,
    pub status: EntryStatus,

    pub user_id: UserId,

    /// Required for TIP/REFUND, absent for wallet-only kinds
    pub media_id: Option<MediaId>,

    /// Absent for global tips and for wallet-only kinds
    pub party_id: Option<PartyId>,

    /// The bid that produced this entry (TIP/REFUND only)
    pub bid_id: Option<Uuid>,

    /// Non-negative amount in pence
    pub amount: Pence,

    pub snapshots: Snapshots,

    /// Tamper-evident digest over all fields above plus the timestamp
    pub digest: String,

    /// Version of the frozen canonical form the digest was computed over
    pub digest_version: u32,

    pub recorded_at: DateTime<Utc>,
}

/// A request for the Ledger Writer to record one event.
///
/// Intents carry no balance information; the writer resolves current
/// pre-values itself inside the commit transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionIntent {
    pub kind: TransactionKind,
    pub user_id: UserId,
    pub media_id: Option<MediaId>,
    pub party_id: Option<PartyId>,
    pub bid_id: Option<Uuid>,
    pub amount: Pence,

    /// Caller-supplied replay guard. A second intent bearing an already-seen
    /// key returns the original entry instead of creating a new one.
    pub idempotency_key: Option<String>,
}

impl TransactionIntent {
    /// A tip placed through a bid, optionally scoped to a party.
    pub fn tip(
        user_id: UserId,
        media_id: MediaId,
        party_id: Option<PartyId>,
        bid_id: Uuid,
        amount: Pence,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self {
            kind: TransactionKind::Tip,
            user_id,
            media_id: Some(media_id),
            party_id,
            bid_id: Some(bid_id),
            amount,
            idempotency_key: Some(idempotency_key.into()),
        }
    }

    /// Exact reversal of a tip. The caller passes the original tip's
    /// references so the reversal lands on the same media/party/bid.
    pub fn refund(
        user_id: UserId,
        media_id: MediaId,
        party_id: Option<PartyId>,
        bid_id: Uuid,
        amount: Pence,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self {
            kind: TransactionKind::Refund,
            user_id,
            media_id: Some(media_id),
            party_id,
            bid_id: Some(bid_id),
            amount,
            idempotency_key: Some(idempotency_key.into()),
        }
    }

    /// Wallet funding. The idempotency key is the upstream payment-session id
    /// so at-least-once webhook delivery cannot double-credit.
    pub fn top_up(user_id: UserId, amount: Pence, session_id: impl Into<String>) -> Self {
        Self {
            kind: TransactionKind::TopUp,
            user_id,
            media_id: None,
            party_id: None,
            bid_id: None,
            amount,
            idempotency_key: Some(session_id.into()),
        }
    }

    /// Approved withdrawal. Fails in the writer if amount exceeds the balance.
    pub fn pay_out(user_id: UserId, amount: Pence, idempotency_key: impl Into<String>) -> Self {
        Self {
            kind: TransactionKind::PayOut,
            user_id,
            media_id: None,
            party_id: None,
            bid_id: None,
            amount,
            idempotency_key: Some(idempotency_key.into()),
        }
    }

    /// Settlement of a claimed escrow allocation. Keyed by the allocation id
    /// so a claim can be re-driven without double-crediting.
    pub fn escrow_claim(
        user_id: UserId,
        amount: Pence,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self {
            kind: TransactionKind::EscrowClaim,
            user_id,
            media_id: None,
            party_id: None,
            bid_id: None,
            amount,
            idempotency_key: Some(idempotency_key.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_string_roundtrip() {
        assert_eq!(TransactionKind::TopUp.to_string(), "TOP_UP");
        assert_eq!(
            "ESCROW_CLAIM".parse::<TransactionKind>().unwrap(),
            TransactionKind::EscrowClaim
        );
        assert_eq!("TIP".parse::<TransactionKind>().unwrap(), TransactionKind::Tip);
    }

    #[test]
    fn test_status_string_roundtrip() {
        assert_eq!(EntryStatus::Confirmed.to_string(), "CONFIRMED");
        assert_eq!("PENDING".parse::<EntryStatus>().unwrap(), EntryStatus::Pending);
    }

    #[test]
    fn test_top_up_intent_shape() {
        let intent = TransactionIntent::top_up(
            UserId::new("alice"),
            Pence::new(500).unwrap(),
            "sess_123",
        );
        assert_eq!(intent.kind, TransactionKind::TopUp);
        assert!(intent.media_id.is_none());
        assert!(intent.bid_id.is_none());
        assert_eq!(intent.idempotency_key.as_deref(), Some("sess_123"));
    }

    #[test]
    fn test_snapshots_none_is_all_null() {
        let snaps = Snapshots::none();
        assert!(snaps.user_balance_pre.is_none());
        assert!(snaps.platform_total_post.is_none());
    }
}
