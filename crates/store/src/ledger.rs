//! Append-only ledger table
//!
//! Entries are inserted once and never updated or deleted. The single
//! exception is `backfill_digest`, which fills an empty digest exactly once
//! and is a no-op for any entry that already carries one.

use crate::error::StoreError;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use tipjar_core::{MediaId, PartyId, Pence, TuneBytes, UserId};
use tipjar_ledger::{canonical_timestamp, EntryStatus, LedgerEntry, Snapshots, TransactionKind};
use uuid::Uuid;

/// Insert a committed entry. The sequence PRIMARY KEY and the unique
/// idempotency index both reject duplicates at the storage layer.
pub fn insert_entry(
    tx: &Transaction,
    entry: &LedgerEntry,
    idempotency_key: Option<&str>,
) -> Result<(), StoreError> {
    let s = &entry.snapshots;
    tx.execute(
        "INSERT INTO ledger_entries (
            sequence, id, kind, status, user_id, media_id, party_id, bid_id,
            amount,
            user_balance_pre, user_balance_post,
            lifetime_pre, lifetime_post,
            tune_bytes_pre, tune_bytes_post,
            media_total_pre, media_total_post,
            platform_total_pre, platform_total_post,
            digest, digest_version, idempotency_key, recorded_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                   ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
        params![
            entry.sequence as i64,
            entry.id.to_string(),
            entry.kind.to_string(),
            entry.status.to_string(),
            entry.user_id.as_str(),
            entry.media_id.as_ref().map(|m| m.as_str().to_string()),
            entry.party_id.as_ref().map(|p| p.as_str().to_string()),
            entry.bid_id.map(|b| b.to_string()),
            entry.amount.value(),
            s.user_balance_pre.map(|p| p.value()),
            s.user_balance_post.map(|p| p.value()),
            s.lifetime_pre.map(|p| p.value()),
            s.lifetime_post.map(|p| p.value()),
            s.tune_bytes_pre.map(|t| t.value()),
            s.tune_bytes_post.map(|t| t.value()),
            s.media_total_pre.map(|p| p.value()),
            s.media_total_post.map(|p| p.value()),
            s.platform_total_pre.map(|p| p.value()),
            s.platform_total_post.map(|p| p.value()),
            entry.digest,
            entry.digest_version,
            idempotency_key,
            canonical_timestamp(&entry.recorded_at),
        ],
    )?;
    Ok(())
}

/// Look up the entry recorded under a caller-supplied idempotency key.
pub fn find_by_idempotency_key(
    conn: &Connection,
    key: &str,
) -> Result<Option<LedgerEntry>, StoreError> {
    conn.query_row(
        &format!("{SELECT_ENTRY} WHERE idempotency_key = ?1"),
        params![key],
        row_to_entry,
    )
    .optional()
    .map_err(StoreError::from)
}

pub fn find_by_sequence(
    conn: &Connection,
    sequence: u64,
) -> Result<Option<LedgerEntry>, StoreError> {
    conn.query_row(
        &format!("{SELECT_ENTRY} WHERE sequence = ?1"),
        params![sequence as i64],
        row_to_entry,
    )
    .optional()
    .map_err(StoreError::from)
}

/// The most recent `limit` entries, ascending by sequence.
pub fn recent(conn: &Connection, limit: usize) -> Result<Vec<LedgerEntry>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_ENTRY} ORDER BY sequence DESC LIMIT ?1"
    ))?;
    let mut entries = stmt
        .query_map(params![limit as i64], row_to_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    entries.reverse();
    Ok(entries)
}

/// All entries in sequence order (replay, audits, tests).
pub fn all(conn: &Connection) -> Result<Vec<LedgerEntry>, StoreError> {
    let mut stmt = conn.prepare(&format!("{SELECT_ENTRY} ORDER BY sequence ASC"))?;
    let entries = stmt
        .query_map([], row_to_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

pub fn max_sequence(conn: &Connection) -> Result<u64, StoreError> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(sequence) FROM ledger_entries",
        [],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0) as u64)
}

/// One-time digest backfill for an entry whose digest raced sequence
/// assignment. Returns true if this call wrote the digest, false if the
/// entry already carried one (idempotent).
pub fn backfill_digest(
    tx: &Transaction,
    sequence: u64,
    digest: &str,
) -> Result<bool, StoreError> {
    let updated = tx.execute(
        "UPDATE ledger_entries SET digest = ?1 WHERE sequence = ?2 AND digest = ''",
        params![digest, sequence as i64],
    )?;
    Ok(updated == 1)
}

const SELECT_ENTRY: &str = "SELECT
    sequence, id, kind, status, user_id, media_id, party_id, bid_id,
    amount,
    user_balance_pre, user_balance_post,
    lifetime_pre, lifetime_post,
    tune_bytes_pre, tune_bytes_post,
    media_total_pre, media_total_post,
    platform_total_pre, platform_total_post,
    digest, digest_version, recorded_at
 FROM ledger_entries";

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<LedgerEntry> {
    let id: String = row.get(1)?;
    let kind: String = row.get(2)?;
    let status: String = row.get(3)?;
    let recorded_at: String = row.get(21)?;

    Ok(LedgerEntry {
        sequence: row.get::<_, i64>(0)? as u64,
        id: Uuid::parse_str(&id).map_err(|e| text_error(1, e))?,
        kind: kind
            .parse::<TransactionKind>()
            .map_err(|e| text_error(2, e))?,
        status: status
            .parse::<EntryStatus>()
            .map_err(|e| text_error(3, e))?,
        user_id: UserId::new(row.get::<_, String>(4)?),
        media_id: row.get::<_, Option<String>>(5)?.map(MediaId::new),
        party_id: row.get::<_, Option<String>>(6)?.map(PartyId::new),
        bid_id: row
            .get::<_, Option<String>>(7)?
            .map(|b| Uuid::parse_str(&b).map_err(|e| text_error(7, e)))
            .transpose()?,
        amount: Pence::new_unchecked(row.get(8)?),
        snapshots: Snapshots {
            user_balance_pre: opt_pence(row, 9)?,
            user_balance_post: opt_pence(row, 10)?,
            lifetime_pre: opt_pence(row, 11)?,
            lifetime_post: opt_pence(row, 12)?,
            tune_bytes_pre: opt_tune_bytes(row, 13)?,
            tune_bytes_post: opt_tune_bytes(row, 14)?,
            media_total_pre: opt_pence(row, 15)?,
            media_total_post: opt_pence(row, 16)?,
            platform_total_pre: opt_pence(row, 17)?,
            platform_total_post: opt_pence(row, 18)?,
        },
        digest: row.get(19)?,
        digest_version: row.get(20)?,
        recorded_at: chrono::DateTime::parse_from_rfc3339(&recorded_at)
            .map_err(|e| text_error(21, e))?
            .with_timezone(&chrono::Utc),
    })
}

fn opt_pence(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Pence>> {
    Ok(row.get::<_, Option<i64>>(idx)?.map(Pence::new_unchecked))
}

fn opt_tune_bytes(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<TuneBytes>> {
    Ok(row
        .get::<_, Option<i64>>(idx)?
        .map(TuneBytes::new_unchecked))
}

fn text_error(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}
