//! The Ledger Writer
//!
//! `record` turns a `TransactionIntent` into exactly one committed
//! `LedgerEntry`. Re-delivered intents (same idempotency key) return the
//! original entry instead of writing a second one.

use crate::error::EngineError;
use rusqlite::Transaction;
use tipjar_core::{Pence, TuneBytes};
use tipjar_ledger::{
    canonical_now, digest_entry, validate_intent, EntryStatus, LedgerEntry, Snapshots,
    TransactionIntent, TransactionKind, DIGEST_VERSION,
};
use tipjar_store::{aggregate, ledger, sequence, verification, wallet, Database, WalletAccount};
use tracing::{debug, info};
use uuid::Uuid;

/// Reward points accrued per pence tipped. Refunds reverse the accrual.
const TUNE_BYTES_PER_PENCE: i64 = 1;

/// Result of a `record` call.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub entry: LedgerEntry,
    /// True when the intent's idempotency key had already been recorded and
    /// the original entry was returned instead of a new one.
    pub replayed: bool,
}

/// The single component through which every balance-affecting event flows.
#[derive(Clone)]
pub struct LedgerWriter {
    db: Database,
}

impl LedgerWriter {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record one intent in its own transaction.
    pub fn record(&self, intent: TransactionIntent) -> Result<Recorded, EngineError> {
        self.db.with_tx(|tx| self.record_in_tx(tx, intent))
    }

    /// Record an intent inside a caller-owned transaction.
    ///
    /// Used by the bid lifecycle and the escrow claim engine so a state
    /// transition and its ledger entry commit as one atomic unit.
    pub fn record_in_tx(
        &self,
        tx: &Transaction,
        intent: TransactionIntent,
    ) -> Result<Recorded, EngineError> {
        validate_intent(&intent)?;

        if let Some(key) = intent.idempotency_key.as_deref() {
            if let Some(existing) = ledger::find_by_idempotency_key(tx, key)? {
                debug!(key, sequence = existing.sequence, "intent replayed, returning original entry");
                return Ok(Recorded {
                    entry: existing,
                    replayed: true,
                });
            }
        }

        let now = canonical_now();
        let pre_wallet = wallet::load(tx, &intent.user_id)?;
        let pre_media = intent
            .media_id
            .as_ref()
            .map(|media| aggregate::media_total(tx, media))
            .transpose()?;
        let pre_platform = match intent.kind {
            TransactionKind::Tip | TransactionKind::Refund => {
                Some(aggregate::platform_total(tx)?)
            }
            _ => None,
        };

        let post = compute_post_state(&intent, &pre_wallet, pre_media, pre_platform)?;

        let sequence = sequence::next(tx, sequence::LEDGER_SEQUENCE)?;

        let mut entry = LedgerEntry {
            id: Uuid::new_v4(),
            sequence,
            kind: intent.kind,
            status: EntryStatus::Confirmed,
            user_id: intent.user_id.clone(),
            media_id: intent.media_id.clone(),
            party_id: intent.party_id.clone(),
            bid_id: intent.bid_id,
            amount: intent.amount,
            snapshots: post.snapshots,
            digest: String::new(),
            digest_version: DIGEST_VERSION,
            recorded_at: now,
        };
        entry.digest = digest_entry(&entry);

        ledger::insert_entry(tx, &entry, intent.idempotency_key.as_deref())?;
        verification::insert(
            tx,
            verification::LEDGER_ENTRY_TYPE,
            &entry.id.to_string(),
            &entry.digest,
            &now,
        )?;

        let mut post_wallet = post.wallet;
        post_wallet.updated_at = now;
        wallet::save(tx, &post_wallet)?;

        if let (Some(media), Some(total)) = (intent.media_id.as_ref(), post.media_total) {
            aggregate::set_media_total(tx, media, total, &now)?;
        }
        if let Some(total) = post.platform_total {
            aggregate::set_platform_total(tx, total, &now)?;
        }

        info!(
            sequence,
            kind = %entry.kind,
            user = %entry.user_id,
            amount = %entry.amount,
            "ledger entry committed"
        );

        Ok(Recorded {
            entry,
            replayed: false,
        })
    }
}

struct PostState {
    wallet: WalletAccount,
    media_total: Option<Pence>,
    platform_total: Option<Pence>,
    snapshots: Snapshots,
}

/// Apply the kind's balance rule. Snapshot fields for aggregates the kind
/// does not touch stay `None` - "not consulted" is distinct from zero.
fn compute_post_state(
    intent: &TransactionIntent,
    pre_wallet: &WalletAccount,
    pre_media: Option<Pence>,
    pre_platform: Option<Pence>,
) -> Result<PostState, EngineError> {
    let amount = intent.amount;
    let mut wallet = pre_wallet.clone();
    let mut snapshots = Snapshots::none();

    snapshots.user_balance_pre = Some(pre_wallet.balance);

    let mut media_total = None;
    let mut platform_total = None;

    match intent.kind {
        TransactionKind::Tip => {
            wallet.balance = pre_wallet
                .balance
                .checked_sub(amount)
                .ok_or(EngineError::InsufficientFunds {
                    available: pre_wallet.balance,
                    requested: amount,
                })?;
            wallet.lifetime_tipped = pre_wallet
                .lifetime_tipped
                .checked_add(amount)
                .ok_or(EngineError::AmountOverflow { field: "lifetime" })?;
            wallet.tune_bytes = pre_wallet
                .tune_bytes
                .checked_add(tune_bytes_for(amount))
                .ok_or(EngineError::AmountOverflow { field: "tune_bytes" })?;

            let pre_m = pre_media.unwrap_or(Pence::ZERO);
            let pre_p = pre_platform.unwrap_or(Pence::ZERO);
            let post_m = pre_m
                .checked_add(amount)
                .ok_or(EngineError::AmountOverflow { field: "media_total" })?;
            let post_p = pre_p
                .checked_add(amount)
                .ok_or(EngineError::AmountOverflow { field: "platform_total" })?;
            media_total = Some(post_m);
            platform_total = Some(post_p);

            snapshots.lifetime_pre = Some(pre_wallet.lifetime_tipped);
            snapshots.lifetime_post = Some(wallet.lifetime_tipped);
            snapshots.tune_bytes_pre = Some(pre_wallet.tune_bytes);
            snapshots.tune_bytes_post = Some(wallet.tune_bytes);
            snapshots.media_total_pre = Some(pre_m);
            snapshots.media_total_post = Some(post_m);
            snapshots.platform_total_pre = Some(pre_p);
            snapshots.platform_total_post = Some(post_p);
        }

        TransactionKind::Refund => {
            // Exact inverse of the TIP rule.
            wallet.balance = pre_wallet
                .balance
                .checked_add(amount)
                .ok_or(EngineError::AmountOverflow { field: "balance" })?;
            wallet.lifetime_tipped = pre_wallet
                .lifetime_tipped
                .checked_sub(amount)
                .ok_or(EngineError::NegativeAggregate { field: "lifetime" })?;
            wallet.tune_bytes = pre_wallet
                .tune_bytes
                .checked_sub(tune_bytes_for(amount))
                .ok_or(EngineError::NegativeAggregate { field: "tune_bytes" })?;

            let pre_m = pre_media.unwrap_or(Pence::ZERO);
            let pre_p = pre_platform.unwrap_or(Pence::ZERO);
            let post_m = pre_m
                .checked_sub(amount)
                .ok_or(EngineError::NegativeAggregate { field: "media_total" })?;
            let post_p = pre_p
                .checked_sub(amount)
                .ok_or(EngineError::NegativeAggregate {
                    field: "platform_total",
                })?;
            media_total = Some(post_m);
            platform_total = Some(post_p);

            snapshots.lifetime_pre = Some(pre_wallet.lifetime_tipped);
            snapshots.lifetime_post = Some(wallet.lifetime_tipped);
            snapshots.tune_bytes_pre = Some(pre_wallet.tune_bytes);
            snapshots.tune_bytes_post = Some(wallet.tune_bytes);
            snapshots.media_total_pre = Some(pre_m);
            snapshots.media_total_post = Some(post_m);
            snapshots.platform_total_pre = Some(pre_p);
            snapshots.platform_total_post = Some(post_p);
        }

        TransactionKind::TopUp | TransactionKind::EscrowClaim => {
            wallet.balance = pre_wallet
                .balance
                .checked_add(amount)
                .ok_or(EngineError::AmountOverflow { field: "balance" })?;
        }

        TransactionKind::PayOut => {
            wallet.balance = pre_wallet
                .balance
                .checked_sub(amount)
                .ok_or(EngineError::InsufficientFunds {
                    available: pre_wallet.balance,
                    requested: amount,
                })?;
        }
    }

    snapshots.user_balance_post = Some(wallet.balance);

    Ok(PostState {
        wallet,
        media_total,
        platform_total,
        snapshots,
    })
}

fn tune_bytes_for(amount: Pence) -> TuneBytes {
    TuneBytes::new_unchecked(amount.value() * TUNE_BYTES_PER_PENCE)
}
