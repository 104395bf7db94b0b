//! Bid lifecycle state machine
//!
//! `REQUESTED -> ACTIVE -> {PLAYED, VETOED, REFUNDED}`. Placement inserts the
//! bid, records its TIP, allocates escrow shares, and activates the bid in
//! one transaction: an insufficient balance rolls the whole thing back and no
//! bid exists afterwards. Veto and refund share one reversal idempotency key
//! per bid, so the two paths can never both reverse the same tip; a reversal
//! also voids the bid's unclaimed escrow allocations.

use crate::bid::{Bid, BidStatus, BidTarget};
use crate::error::BidError;
use crate::store;
use tipjar_core::{PartyId, Pence, UserId};
use tipjar_engine::LedgerWriter;
use tipjar_escrow::EscrowEngine;
use tipjar_ledger::{canonical_now, LedgerEntry, TransactionIntent};
use tipjar_store::Database;
use tracing::info;
use uuid::Uuid;

pub struct BidLifecycle {
    db: Database,
    writer: LedgerWriter,
    escrow: EscrowEngine,
}

impl BidLifecycle {
    pub fn new(db: Database, writer: LedgerWriter, escrow: EscrowEngine) -> Result<Self, BidError> {
        store::init_schema(&db)?;
        Ok(Self { db, writer, escrow })
    }

    /// Place a bid: reserve the funds and activate it.
    ///
    /// Returns the ACTIVE bid and its TIP entry. If the tipper cannot cover
    /// the amount, nothing is persisted and the bid is never created.
    pub fn place(
        &self,
        user_id: UserId,
        party_id: Option<PartyId>,
        target: BidTarget,
        amount: Pence,
    ) -> Result<(Bid, LedgerEntry), BidError> {
        let now = canonical_now();
        let bid = Bid {
            id: Uuid::new_v4(),
            user_id,
            party_id,
            target,
            amount,
            status: BidStatus::Requested,
            created_at: now,
            updated_at: now,
        };

        self.db.with_tx(|tx| {
            store::insert(tx, &bid)?;

            let recorded = self.writer.record_in_tx(
                tx,
                TransactionIntent::tip(
                    bid.user_id.clone(),
                    bid.target.media_id().clone(),
                    bid.party_id.clone(),
                    bid.id,
                    bid.amount,
                    format!("bid-tip:{}", bid.id),
                ),
            )?;

            self.escrow
                .allocate_for_tip(tx, bid.target.media_id(), bid.id, bid.amount)?;

            store::set_status(tx, &bid.id, BidStatus::Requested, BidStatus::Active, &now)?;
            info!(bid = %bid.id, user = %bid.user_id, amount = %bid.amount, "bid activated");

            let mut active = bid.clone();
            active.status = BidStatus::Active;
            Ok((active, recorded.entry))
        })
    }

    /// Mark an active bid's media as consumed by the party/queue.
    pub fn mark_played(&self, bid_id: &Uuid) -> Result<Bid, BidError> {
        self.db.with_tx(|tx| {
            let bid = require(tx, bid_id)?;
            check_transition(&bid, BidStatus::Played)?;
            let now = canonical_now();
            store::set_status(tx, bid_id, BidStatus::Active, BidStatus::Played, &now)?;
            info!(bid = %bid_id, "bid played");
            Ok(Bid {
                status: BidStatus::Played,
                updated_at: now,
                ..bid
            })
        })
    }

    /// Admin veto: reverse the tip exactly and terminate the bid.
    pub fn veto(&self, bid_id: &Uuid) -> Result<(Bid, LedgerEntry), BidError> {
        self.reverse(bid_id, BidStatus::Vetoed)
    }

    /// Approved refund request: the same reversal, user-initiated.
    pub fn refund(&self, bid_id: &Uuid) -> Result<(Bid, LedgerEntry), BidError> {
        self.reverse(bid_id, BidStatus::Refunded)
    }

    pub fn get(&self, bid_id: &Uuid) -> Result<Option<Bid>, BidError> {
        self.db.read(|conn| store::get(conn, bid_id))
    }

    pub fn for_user(&self, user_id: &UserId) -> Result<Vec<Bid>, BidError> {
        self.db.read(|conn| store::for_user(conn, user_id))
    }

    fn reverse(&self, bid_id: &Uuid, terminal: BidStatus) -> Result<(Bid, LedgerEntry), BidError> {
        self.db.with_tx(|tx| {
            let bid = require(tx, bid_id)?;
            check_transition(&bid, terminal)?;

            // One reversal key per bid: if a veto and a refund approval race,
            // the loser replays the winner's REFUND instead of doubling it.
            let recorded = self.writer.record_in_tx(
                tx,
                TransactionIntent::refund(
                    bid.user_id.clone(),
                    bid.target.media_id().clone(),
                    bid.party_id.clone(),
                    bid.id,
                    bid.amount,
                    format!("bid-reversal:{bid_id}"),
                ),
            )?;

            // The tip is being handed back, so the bid's unclaimed escrow
            // allocations must die with it or the share could still be
            // claimed on top of the refund.
            self.escrow.void_for_bid(tx, bid_id)?;

            let now = canonical_now();
            if !store::set_status(tx, bid_id, BidStatus::Active, terminal, &now)? {
                return Err(BidError::InvalidTransition {
                    bid_id: bid_id.to_string(),
                    from: bid.status,
                    to: terminal,
                });
            }
            info!(bid = %bid_id, status = %terminal, "bid reversed");

            Ok((
                Bid {
                    status: terminal,
                    updated_at: now,
                    ..bid
                },
                recorded.entry,
            ))
        })
    }
}

fn require(conn: &rusqlite::Connection, bid_id: &Uuid) -> Result<Bid, BidError> {
    store::get(conn, bid_id)?.ok_or_else(|| BidError::BidNotFound(bid_id.to_string()))
}

fn check_transition(bid: &Bid, to: BidStatus) -> Result<(), BidError> {
    if !bid.status.can_transition_to(to) {
        return Err(BidError::InvalidTransition {
            bid_id: bid.id.to_string(),
            from: bid.status,
            to,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tipjar_core::MediaId;
    use tipjar_ledger::TransactionKind;

    fn setup() -> (Database, BidLifecycle) {
        let db = Database::in_memory().unwrap();
        let writer = LedgerWriter::new(db.clone());
        let escrow = EscrowEngine::new(db.clone(), writer.clone()).unwrap();
        let lifecycle = BidLifecycle::new(db.clone(), writer.clone(), escrow).unwrap();
        (db, lifecycle)
    }

    fn pence(v: i64) -> Pence {
        Pence::new(v).unwrap()
    }

    fn fund(db: &Database, user: &str, amount: i64) -> UserId {
        let user = UserId::new(user);
        let writer = LedgerWriter::new(db.clone());
        writer
            .record(TransactionIntent::top_up(
                user.clone(),
                pence(amount),
                format!("fund:{user}"),
            ))
            .unwrap();
        user
    }

    fn balance(db: &Database, user: &UserId) -> Pence {
        db.read(|conn| tipjar_store::wallet::load(conn, user))
            .unwrap()
            .balance
    }

    #[test]
    fn test_place_activates_and_records_tip() {
        let (db, lifecycle) = setup();
        let alice = fund(&db, "alice", 1000);

        let (bid, entry) = lifecycle
            .place(
                alice.clone(),
                Some(tipjar_core::PartyId::new("party_1")),
                BidTarget::Song(MediaId::new("M")),
                pence(300),
            )
            .unwrap();

        assert_eq!(bid.status, BidStatus::Active);
        assert_eq!(entry.kind, TransactionKind::Tip);
        assert_eq!(entry.bid_id, Some(bid.id));
        assert_eq!(entry.snapshots.user_balance_pre, Some(pence(1000)));
        assert_eq!(entry.snapshots.user_balance_post, Some(pence(700)));
        assert_eq!(balance(&db, &alice), pence(700));

        let stored = lifecycle.get(&bid.id).unwrap().unwrap();
        assert_eq!(stored.status, BidStatus::Active);
    }

    #[test]
    fn test_insufficient_funds_leaves_no_bid_behind() {
        let (db, lifecycle) = setup();
        let bob = fund(&db, "bob", 100);

        let result = lifecycle.place(
            bob.clone(),
            None,
            BidTarget::Song(MediaId::new("M")),
            pence(300),
        );
        assert!(matches!(
            result,
            Err(BidError::Engine(
                tipjar_engine::EngineError::InsufficientFunds { .. }
            ))
        ));

        assert!(lifecycle.for_user(&bob).unwrap().is_empty());
        assert_eq!(balance(&db, &bob), pence(100));
    }

    #[test]
    fn test_veto_reverses_tip_exactly() {
        let (db, lifecycle) = setup();
        let alice = fund(&db, "alice", 1000);
        let (bid, tip) = lifecycle
            .place(
                alice.clone(),
                None,
                BidTarget::Song(MediaId::new("M")),
                pence(300),
            )
            .unwrap();

        let (vetoed, refund) = lifecycle.veto(&bid.id).unwrap();
        assert_eq!(vetoed.status, BidStatus::Vetoed);
        assert_eq!(refund.kind, TransactionKind::Refund);
        assert_eq!(refund.amount, tip.amount);
        assert_eq!(refund.snapshots.user_balance_pre, Some(pence(700)));
        assert_eq!(refund.snapshots.user_balance_post, Some(pence(1000)));
        assert_eq!(balance(&db, &alice), pence(1000));
    }

    #[test]
    fn test_refund_after_veto_rejected() {
        let (db, lifecycle) = setup();
        let alice = fund(&db, "alice", 1000);
        let (bid, _) = lifecycle
            .place(
                alice.clone(),
                None,
                BidTarget::Song(MediaId::new("M")),
                pence(300),
            )
            .unwrap();

        lifecycle.veto(&bid.id).unwrap();
        let second = lifecycle.refund(&bid.id);
        assert!(matches!(
            second,
            Err(BidError::InvalidTransition {
                from: BidStatus::Vetoed,
                to: BidStatus::Refunded,
                ..
            })
        ));
        assert_eq!(balance(&db, &alice), pence(1000));
    }

    #[test]
    fn test_played_is_terminal_and_keeps_the_money() {
        let (db, lifecycle) = setup();
        let alice = fund(&db, "alice", 1000);
        let (bid, _) = lifecycle
            .place(
                alice.clone(),
                None,
                BidTarget::Episode(MediaId::new("E")),
                pence(200),
            )
            .unwrap();

        let played = lifecycle.mark_played(&bid.id).unwrap();
        assert_eq!(played.status, BidStatus::Played);
        assert_eq!(balance(&db, &alice), pence(800));

        assert!(matches!(
            lifecycle.veto(&bid.id),
            Err(BidError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_unknown_bid() {
        let (_db, lifecycle) = setup();
        assert!(matches!(
            lifecycle.mark_played(&Uuid::new_v4()),
            Err(BidError::BidNotFound(_))
        ));
    }

    #[test]
    fn test_place_allocates_escrow_shares() {
        let (db, lifecycle) = setup();
        let writer = LedgerWriter::new(db.clone());
        let escrow = EscrowEngine::new(db.clone(), writer).unwrap();
        let media = MediaId::new("M");
        escrow
            .register_share(&media, 50, tipjar_escrow::MatchCriteria::named("Aurora"))
            .unwrap();

        let alice = fund(&db, "alice", 1000);
        let (bid, _) = lifecycle
            .place(alice, None, BidTarget::Song(media), pence(300))
            .unwrap();

        let found = escrow
            .find_matching(&tipjar_escrow::MatchCriteria::named("Aurora"))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].bid_id, bid.id);
        assert_eq!(found[0].allocated_amount, pence(150));
    }
}
