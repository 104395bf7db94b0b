//! Escrow persistence
//!
//! Shares and allocations live in the same database as the ledger so a tip
//! and its allocations commit atomically. The claim flag is flipped with a
//! conditional update - the compare-and-set that makes concurrent claims
//! resolve to exactly one winner.

use crate::allocation::{EscrowAllocation, PendingArtistShare};
use crate::criteria::MatchCriteria;
use crate::error::EscrowError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tipjar_core::{MediaId, Pence, UserId};
use tipjar_ledger::canonical_timestamp;
use tipjar_store::{Database, StoreError};
use uuid::Uuid;

pub fn init_schema(db: &Database) -> Result<(), EscrowError> {
    db.execute_schema(SCHEMA)?;
    Ok(())
}

pub fn insert_share(conn: &Connection, share: &PendingArtistShare) -> Result<(), EscrowError> {
    conn.execute(
        "INSERT INTO pending_artist_shares (id, media_id, percentage, criteria, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            share.id.to_string(),
            share.media_id.as_str(),
            i64::from(share.percentage),
            serde_json::to_string(&share.criteria).map_err(StoreError::from)?,
            canonical_timestamp(&share.created_at),
        ],
    )
    .map_err(StoreError::from)?;
    Ok(())
}

pub fn shares_for_media(
    conn: &Connection,
    media_id: &MediaId,
) -> Result<Vec<PendingArtistShare>, EscrowError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, media_id, percentage, criteria, created_at
             FROM pending_artist_shares WHERE media_id = ?1 ORDER BY created_at",
        )
        .map_err(StoreError::from)?;
    let rows = stmt
        .query_map(params![media_id.as_str()], row_to_share)
        .map_err(StoreError::from)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::from)?;
    Ok(rows)
}

/// Sum of standing share percentages for a media item.
pub fn pending_percentage(conn: &Connection, media_id: &MediaId) -> Result<u32, EscrowError> {
    let total: i64 = conn
        .query_row(
            "SELECT COALESCE(SUM(percentage), 0) FROM pending_artist_shares WHERE media_id = ?1",
            params![media_id.as_str()],
            |row| row.get(0),
        )
        .map_err(StoreError::from)?;
    Ok(total as u32)
}

pub fn insert_allocation(
    conn: &Connection,
    allocation: &EscrowAllocation,
) -> Result<(), EscrowError> {
    conn.execute(
        "INSERT INTO escrow_allocations (
            id, media_id, bid_id, share_id, percentage, allocated_amount,
            criteria, claimed, claimed_by, claimed_at, voided, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, NULL, NULL, 0, ?8)",
        params![
            allocation.id.to_string(),
            allocation.media_id.as_str(),
            allocation.bid_id.to_string(),
            allocation.share_id.to_string(),
            i64::from(allocation.percentage),
            allocation.allocated_amount.value(),
            serde_json::to_string(&allocation.criteria).map_err(StoreError::from)?,
            canonical_timestamp(&allocation.created_at),
        ],
    )
    .map_err(StoreError::from)?;
    Ok(())
}

pub fn get_allocation(
    conn: &Connection,
    id: &Uuid,
) -> Result<Option<EscrowAllocation>, EscrowError> {
    conn.query_row(
        &format!("{SELECT_ALLOCATION} WHERE id = ?1"),
        params![id.to_string()],
        row_to_allocation,
    )
    .optional()
    .map_err(StoreError::from)
    .map_err(EscrowError::from)
}

/// All claimable (unclaimed, not voided) allocations, oldest first.
/// Criteria matching happens in Rust: the criteria are stored verbatim as
/// JSON, and exact-field lookups over a bounded unclaimed set are cheap.
pub fn unclaimed(conn: &Connection) -> Result<Vec<EscrowAllocation>, EscrowError> {
    let mut stmt = conn
        .prepare(&format!(
            "{SELECT_ALLOCATION} WHERE claimed = 0 AND voided = 0 ORDER BY created_at"
        ))
        .map_err(StoreError::from)?;
    let rows = stmt
        .query_map([], row_to_allocation)
        .map_err(StoreError::from)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::from)?;
    Ok(rows)
}

/// Compare-and-set on the claimed flag. Returns true for the one caller
/// that flipped it, false for everyone who raced and lost.
pub fn try_claim(
    conn: &Connection,
    id: &Uuid,
    user_id: &UserId,
    at: &DateTime<Utc>,
) -> Result<bool, EscrowError> {
    let updated = conn
        .execute(
            "UPDATE escrow_allocations
             SET claimed = 1, claimed_by = ?1, claimed_at = ?2
             WHERE id = ?3 AND claimed = 0 AND voided = 0",
            params![user_id.as_str(), canonical_timestamp(at), id.to_string()],
        )
        .map_err(StoreError::from)?;
    Ok(updated == 1)
}

/// Void every unclaimed allocation funded by the given bid. Returns how
/// many were voided; allocations already claimed are left untouched.
pub fn void_unclaimed_for_bid(conn: &Connection, bid_id: &Uuid) -> Result<usize, EscrowError> {
    let voided = conn
        .execute(
            "UPDATE escrow_allocations SET voided = 1
             WHERE bid_id = ?1 AND claimed = 0 AND voided = 0",
            params![bid_id.to_string()],
        )
        .map_err(StoreError::from)?;
    Ok(voided)
}

const SELECT_ALLOCATION: &str = "SELECT
    id, media_id, bid_id, share_id, percentage, allocated_amount,
    criteria, claimed, claimed_by, claimed_at, voided, created_at
 FROM escrow_allocations";

fn row_to_share(row: &Row<'_>) -> rusqlite::Result<PendingArtistShare> {
    let id: String = row.get(0)?;
    let criteria: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    Ok(PendingArtistShare {
        id: Uuid::parse_str(&id).map_err(|e| text_error(0, e))?,
        media_id: MediaId::new(row.get::<_, String>(1)?),
        percentage: row.get::<_, i64>(2)? as u8,
        criteria: parse_criteria(&criteria)?,
        created_at: parse_timestamp(&created_at, 4)?,
    })
}

fn row_to_allocation(row: &Row<'_>) -> rusqlite::Result<EscrowAllocation> {
    let id: String = row.get(0)?;
    let bid_id: String = row.get(2)?;
    let share_id: String = row.get(3)?;
    let criteria: String = row.get(6)?;
    let created_at: String = row.get(11)?;
    Ok(EscrowAllocation {
        id: Uuid::parse_str(&id).map_err(|e| text_error(0, e))?,
        media_id: MediaId::new(row.get::<_, String>(1)?),
        bid_id: Uuid::parse_str(&bid_id).map_err(|e| text_error(2, e))?,
        share_id: Uuid::parse_str(&share_id).map_err(|e| text_error(3, e))?,
        percentage: row.get::<_, i64>(4)? as u8,
        allocated_amount: Pence::new_unchecked(row.get(5)?),
        criteria: parse_criteria(&criteria)?,
        claimed: row.get::<_, i64>(7)? != 0,
        claimed_by: row.get::<_, Option<String>>(8)?.map(UserId::new),
        claimed_at: row
            .get::<_, Option<String>>(9)?
            .map(|ts| parse_timestamp(&ts, 9))
            .transpose()?,
        voided: row.get::<_, i64>(10)? != 0,
        created_at: parse_timestamp(&created_at, 11)?,
    })
}

fn parse_criteria(json: &str) -> rusqlite::Result<MatchCriteria> {
    serde_json::from_str(json).map_err(|e| text_error(6, e))
}

fn parse_timestamp(text: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| text_error(idx, e))
}

fn text_error(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS pending_artist_shares (
    id         TEXT PRIMARY KEY,
    media_id   TEXT NOT NULL,
    percentage INTEGER NOT NULL,
    criteria   TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_shares_media ON pending_artist_shares(media_id);

CREATE TABLE IF NOT EXISTS escrow_allocations (
    id               TEXT PRIMARY KEY,
    media_id         TEXT NOT NULL,
    bid_id           TEXT NOT NULL,
    share_id         TEXT NOT NULL,
    percentage       INTEGER NOT NULL,
    allocated_amount INTEGER NOT NULL,
    criteria         TEXT NOT NULL,
    claimed          INTEGER NOT NULL DEFAULT 0,
    claimed_by       TEXT,
    claimed_at       TEXT,
    voided           INTEGER NOT NULL DEFAULT 0,
    created_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_allocations_media ON escrow_allocations(media_id);
CREATE INDEX IF NOT EXISTS idx_allocations_claimed ON escrow_allocations(claimed);
"#;
