//! Escrow allocation and claim engine

use crate::allocation::{EscrowAllocation, PendingArtistShare};
use crate::criteria::MatchCriteria;
use crate::error::EscrowError;
use crate::store;
use rusqlite::Transaction;
use tipjar_core::{MediaId, Pence, UserId};
use tipjar_engine::LedgerWriter;
use tipjar_ledger::{canonical_now, LedgerEntry, TransactionIntent};
use tipjar_ownership::{registry, OwnershipError};
use tipjar_store::Database;
use tracing::info;
use uuid::Uuid;

/// Outcome of a successful claim: the settled allocation and the
/// ESCROW_CLAIM ledger entry that credited the claimant.
#[derive(Debug, Clone)]
pub struct Claimed {
    pub allocation: EscrowAllocation,
    pub entry: LedgerEntry,
}

#[derive(Clone)]
pub struct EscrowEngine {
    db: Database,
    writer: LedgerWriter,
}

impl EscrowEngine {
    pub fn new(db: Database, writer: LedgerWriter) -> Result<Self, EscrowError> {
        store::init_schema(&db)?;
        // Share registration reads verified owner percentages, so the
        // ownership tables must exist even if no registry was built yet.
        registry::ensure_schema(&db)?;
        Ok(Self { db, writer })
    }

    /// Register an unregistered artist's standing share of a media item.
    ///
    /// Invariant: standing share percentages plus verified owner
    /// percentages for the media may never exceed 100.
    pub fn register_share(
        &self,
        media_id: &MediaId,
        percentage: u8,
        criteria: MatchCriteria,
    ) -> Result<PendingArtistShare, EscrowError> {
        if percentage == 0 || percentage > 100 {
            return Err(EscrowError::InvalidPercentage(u32::from(percentage)));
        }
        criteria.validate()?;

        self.db.with_tx(|tx| {
            let verified = registry::verified_percentage_in(tx, media_id)?;
            let pending = store::pending_percentage(tx, media_id)?;
            let attempted = verified + pending + u32::from(percentage);
            if attempted > 100 {
                return Err(OwnershipError::OwnershipOverflow {
                    media_id: media_id.to_string(),
                    attempted,
                }
                .into());
            }

            let share = PendingArtistShare {
                id: Uuid::new_v4(),
                media_id: media_id.clone(),
                percentage,
                criteria,
                created_at: canonical_now(),
            };
            store::insert_share(tx, &share)?;
            Ok(share)
        })
    }

    /// Create allocations for every standing share on the tipped media.
    ///
    /// Runs inside the caller's transaction (the bid lifecycle's), so the
    /// tip entry and its allocations commit as one unit. Shares too small
    /// to yield a single penny of this tip produce no allocation.
    pub fn allocate_for_tip(
        &self,
        tx: &Transaction,
        media_id: &MediaId,
        bid_id: Uuid,
        tip_amount: Pence,
    ) -> Result<Vec<EscrowAllocation>, EscrowError> {
        let now = canonical_now();
        let mut allocations = Vec::new();
        for share in store::shares_for_media(tx, media_id)? {
            let allocation = EscrowAllocation::for_tip(&share, bid_id, tip_amount, now);
            if allocation.allocated_amount.is_zero() {
                continue;
            }
            store::insert_allocation(tx, &allocation)?;
            allocations.push(allocation);
        }
        Ok(allocations)
    }

    /// Void every unclaimed allocation funded by the given bid.
    ///
    /// Runs inside the caller's transaction (the bid reversal's), so the
    /// REFUND entry and the voiding commit as one unit. Without this a
    /// refunded tip would stay claimable, crediting money the platform
    /// no longer holds. Claimed allocations are left untouched.
    pub fn void_for_bid(&self, tx: &Transaction, bid_id: &Uuid) -> Result<usize, EscrowError> {
        let voided = store::void_unclaimed_for_bid(tx, bid_id)?;
        if voided > 0 {
            info!(bid = %bid_id, count = voided, "escrow allocations voided");
        }
        Ok(voided)
    }

    /// Find unclaimed allocations a registering artist can lay claim to.
    pub fn find_matching(
        &self,
        query: &MatchCriteria,
    ) -> Result<Vec<EscrowAllocation>, EscrowError> {
        self.db.read(|conn| {
            Ok(store::unclaimed(conn)?
                .into_iter()
                .filter(|allocation| allocation.criteria.matches(query))
                .collect())
        })
    }

    /// Claim an allocation for a registered user.
    ///
    /// The claimed flag flips with a compare-and-set, so of N concurrent
    /// claims exactly one wins; the rest get `AllocationAlreadyClaimed`.
    /// The winner's credit is recorded through the Ledger Writer in the
    /// same transaction, keyed by the allocation id.
    pub fn claim(&self, allocation_id: &Uuid, user_id: &UserId) -> Result<Claimed, EscrowError> {
        self.db.with_tx(|tx| {
            let allocation = store::get_allocation(tx, allocation_id)?
                .ok_or_else(|| EscrowError::AllocationNotFound(allocation_id.to_string()))?;
            if allocation.voided {
                return Err(EscrowError::AllocationVoided {
                    allocation_id: allocation_id.to_string(),
                });
            }

            let now = canonical_now();
            if !store::try_claim(tx, allocation_id, user_id, &now)? {
                return Err(EscrowError::AllocationAlreadyClaimed {
                    allocation_id: allocation_id.to_string(),
                });
            }

            let recorded = self.writer.record_in_tx(
                tx,
                TransactionIntent::escrow_claim(
                    user_id.clone(),
                    allocation.allocated_amount,
                    format!("escrow-claim:{allocation_id}"),
                ),
            )?;

            info!(
                allocation = %allocation_id,
                user = %user_id,
                amount = %allocation.allocated_amount,
                "escrow allocation claimed"
            );

            let settled = store::get_allocation(tx, allocation_id)?
                .ok_or_else(|| EscrowError::AllocationNotFound(allocation_id.to_string()))?;
            Ok(Claimed {
                allocation: settled,
                entry: recorded.entry,
            })
        })
    }
}
