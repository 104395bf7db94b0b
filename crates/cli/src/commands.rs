//! CLI commands

use std::str::FromStr;

use tipjar_bids::BidTarget;
use tipjar_core::{MediaId, PartyId, Pence, UserId};
use tipjar_escrow::{IdentifierKind, MatchCriteria};
use tipjar_ledger::TransactionIntent;
use tipjar_ownership::{MediaOwner, OwnerRole};
use uuid::Uuid;

use crate::context::AppContext;

/// Credit a wallet from an upstream payment session
pub fn top_up(
    ctx: &AppContext,
    user: &str,
    amount: i64,
    session_id: &str,
) -> Result<(), anyhow::Error> {
    let amount = Pence::new(amount)?;
    let recorded = ctx.writer.record(TransactionIntent::top_up(
        UserId::new(user),
        amount,
        session_id,
    ))?;

    if recorded.replayed {
        println!(
            "✅ Session {} already settled (seq: {})",
            session_id, recorded.entry.sequence
        );
    } else {
        println!(
            "✅ Topped up {} for {} (seq: {})",
            amount, user, recorded.entry.sequence
        );
    }
    Ok(())
}

/// Withdraw from a wallet after balance validation
pub fn pay_out(
    ctx: &AppContext,
    user: &str,
    amount: i64,
    reference: &str,
) -> Result<(), anyhow::Error> {
    let amount = Pence::new(amount)?;
    let recorded = ctx.writer.record(TransactionIntent::pay_out(
        UserId::new(user),
        amount,
        reference,
    ))?;

    println!(
        "✅ Paid out {} to {} (seq: {})",
        amount, user, recorded.entry.sequence
    );
    Ok(())
}

/// Place a bid: reserve funds and activate it
pub fn bid(
    ctx: &AppContext,
    user: &str,
    media: &str,
    amount: i64,
    party: Option<&str>,
    episode: bool,
) -> Result<(), anyhow::Error> {
    let media = MediaId::new(media);
    let target = if episode {
        BidTarget::Episode(media)
    } else {
        BidTarget::Song(media)
    };
    let (bid, entry) = ctx.bids.place(
        UserId::new(user),
        party.map(PartyId::new),
        target,
        Pence::new(amount)?,
    )?;

    println!(
        "✅ Bid {} active: {} tipped {} (seq: {})",
        bid.id, user, bid.amount, entry.sequence
    );
    Ok(())
}

/// Mark an active bid's media as played
pub fn played(ctx: &AppContext, bid_id: &str) -> Result<(), anyhow::Error> {
    let bid = ctx.bids.mark_played(&Uuid::parse_str(bid_id)?)?;
    println!("✅ Bid {} marked played", bid.id);
    Ok(())
}

/// Veto an active bid, reversing its tip
pub fn veto(ctx: &AppContext, bid_id: &str) -> Result<(), anyhow::Error> {
    let (bid, entry) = ctx.bids.veto(&Uuid::parse_str(bid_id)?)?;
    println!(
        "✅ Bid {} vetoed, {} refunded (seq: {})",
        bid.id, bid.amount, entry.sequence
    );
    Ok(())
}

/// Apply an approved refund request to an active bid
pub fn refund(ctx: &AppContext, bid_id: &str) -> Result<(), anyhow::Error> {
    let (bid, entry) = ctx.bids.refund(&Uuid::parse_str(bid_id)?)?;
    println!(
        "✅ Bid {} refunded, {} returned (seq: {})",
        bid.id, bid.amount, entry.sequence
    );
    Ok(())
}

/// Show a user's wallet
pub fn balance(ctx: &AppContext, user: &str) -> Result<(), anyhow::Error> {
    let user = UserId::new(user);
    let account = ctx
        .db
        .read(|conn| tipjar_store::wallet::load(conn, &user))?;

    println!("Balance for {}: {}", user, account.balance);
    println!("  lifetime tipped: {}", account.lifetime_tipped);
    println!("  tune bytes:      {}", account.tune_bytes);
    Ok(())
}

/// Set or update a verified owner's stake on a media item
pub fn set_owner(
    ctx: &AppContext,
    media: &str,
    user: &str,
    percentage: u8,
    role: &str,
    acting_user: &str,
) -> Result<(), anyhow::Error> {
    let role = OwnerRole::from_str(role)
        .map_err(|_| anyhow::anyhow!("Unknown role: {role} (try ARTIST, COMPOSER, PRODUCER, LABEL)"))?;
    ctx.owners.set_owner(
        &MediaId::new(media),
        MediaOwner {
            user_id: UserId::new(user),
            percentage,
            role,
        },
        &UserId::new(acting_user),
    )?;

    println!("✅ {} owns {}% of {} as {}", user, percentage, media, role);
    Ok(())
}

/// List a media item's verified owners
pub fn owners(ctx: &AppContext, media: &str) -> Result<(), anyhow::Error> {
    let media = MediaId::new(media);
    let owners = ctx.owners.owners(&media)?;
    if owners.is_empty() {
        println!("No verified owners for {}", media);
        return Ok(());
    }

    println!("Owners of {}:", media);
    for owner in &owners {
        println!("  {:>3}%  {}  ({})", owner.percentage, owner.user_id, owner.role);
    }
    let total = ctx.owners.verified_percentage(&media)?;
    println!("  total: {}%", total);
    Ok(())
}

/// Register an unregistered artist's standing escrow share
pub fn escrow_share(
    ctx: &AppContext,
    media: &str,
    percentage: u8,
    artist: &str,
    identifiers: &[String],
) -> Result<(), anyhow::Error> {
    let mut criteria = MatchCriteria::named(artist);
    for pair in identifiers {
        let (kind, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Identifier must be KIND=value, got {pair}"))?;
        let kind = IdentifierKind::from_str(kind)
            .map_err(|_| anyhow::anyhow!("Unknown identifier kind: {kind}"))?;
        criteria = criteria.with_identifier(kind, value);
    }

    let share = ctx
        .escrow
        .register_share(&MediaId::new(media), percentage, criteria)?;
    println!(
        "✅ Escrow share {} registered: {}% of {} held for \"{}\"",
        share.id, share.percentage, media, artist
    );
    Ok(())
}

/// Find unclaimed escrow allocations matching an artist
pub fn escrow_find(ctx: &AppContext, artist: &str) -> Result<(), anyhow::Error> {
    let found = ctx.escrow.find_matching(&MatchCriteria::named(artist))?;
    if found.is_empty() {
        println!("No unclaimed allocations match \"{}\"", artist);
        return Ok(());
    }

    println!("Unclaimed allocations for \"{}\":", artist);
    for allocation in &found {
        println!(
            "  {}  {}  (media {}, bid {})",
            allocation.id, allocation.allocated_amount, allocation.media_id, allocation.bid_id
        );
    }
    Ok(())
}

/// Claim an escrow allocation for a registered user
pub fn escrow_claim(
    ctx: &AppContext,
    allocation_id: &str,
    user: &str,
) -> Result<(), anyhow::Error> {
    let claimed = ctx
        .escrow
        .claim(&Uuid::parse_str(allocation_id)?, &UserId::new(user))?;
    println!(
        "✅ Allocation {} claimed: {} credited to {} (seq: {})",
        claimed.allocation.id, claimed.entry.amount, user, claimed.entry.sequence
    );
    Ok(())
}

/// Verify digests over a window of recent entries
pub fn audit(ctx: &AppContext, limit: usize) -> Result<(), anyhow::Error> {
    let report = ctx.auditor.verify_window(limit)?;

    if report.mismatches.is_empty() {
        println!("✅ {} entries verified, no mismatches", report.checked);
        return Ok(());
    }

    println!(
        "❌ {} of {} entries failed verification:",
        report.mismatches.len(),
        report.checked
    );
    for mismatch in &report.mismatches {
        println!(
            "  seq {:>6}  entry {}  stored {}.. recomputed {}..",
            mismatch.sequence,
            mismatch.entry_id,
            &mismatch.stored_digest[..12.min(mismatch.stored_digest.len())],
            &mismatch.recomputed_digest[..12],
        );
    }
    Ok(())
}

/// Print the most recent ledger entries
pub fn ledger(ctx: &AppContext, limit: usize) -> Result<(), anyhow::Error> {
    let entries = ctx.db.read(|conn| tipjar_store::ledger::recent(conn, limit))?;
    if entries.is_empty() {
        println!("Ledger is empty");
        return Ok(());
    }

    println!("{:-<72}", "");
    println!(
        "{:>6} | {:>12} | {:>10} | {:>8} | {}",
        "Seq", "Type", "User", "Amount", "Recorded"
    );
    println!("{:-<72}", "");
    for entry in &entries {
        println!(
            "{:>6} | {:>12} | {:>10} | {:>8} | {}",
            entry.sequence,
            entry.kind,
            entry.user_id,
            entry.amount,
            entry.recorded_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    Ok(())
}
