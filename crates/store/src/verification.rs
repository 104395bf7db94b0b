//! Verification records - independent digest copies
//!
//! One record per hashed financial record, written once at creation time.
//! The record's digest is never updated: if the primary ledger row is
//! altered out-of-band, the recomputed digest stops matching this copy.
//! The only mutations this module offers are pass/mismatch counter bumps,
//! keeping the store read-mostly with admin-level writes.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::{Deserialize, Serialize};
use tipjar_ledger::canonical_timestamp;

/// Entry-type discriminator for ledger entries. Other hashed record types
/// (if any are added) get their own constant, keyed separately.
pub const LEDGER_ENTRY_TYPE: &str = "LEDGER_ENTRY";

/// The write-once digest copy plus verification counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub entry_type: String,
    pub entry_id: String,
    pub digest: String,
    pub recorded_at: DateTime<Utc>,
    pub pass_count: u64,
    pub mismatch_count: u64,
}

/// Record the original digest for a new entry. The composite primary key
/// makes a second insert for the same entry fail rather than overwrite.
pub fn insert(
    tx: &Transaction,
    entry_type: &str,
    entry_id: &str,
    digest: &str,
    at: &DateTime<Utc>,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO verification_records (entry_type, entry_id, digest, recorded_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![entry_type, entry_id, digest, canonical_timestamp(at)],
    )?;
    Ok(())
}

pub fn get(
    conn: &Connection,
    entry_type: &str,
    entry_id: &str,
) -> Result<Option<VerificationRecord>, StoreError> {
    conn.query_row(
        "SELECT entry_type, entry_id, digest, recorded_at, pass_count, mismatch_count
         FROM verification_records WHERE entry_type = ?1 AND entry_id = ?2",
        params![entry_type, entry_id],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
            ))
        },
    )
    .optional()?
    .map(|(entry_type, entry_id, digest, recorded_at, passes, mismatches)| {
        Ok(VerificationRecord {
            entry_type,
            entry_id,
            digest,
            recorded_at: DateTime::parse_from_rfc3339(&recorded_at)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|e| {
                    StoreError::Database(rusqlite::Error::FromSqlConversionFailure(
                        3,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    ))
                })?,
            pass_count: passes as u64,
            mismatch_count: mismatches as u64,
        })
    })
    .transpose()
}

/// Bump the pass counter after a successful verification.
pub fn record_pass(conn: &Connection, entry_type: &str, entry_id: &str) -> Result<(), StoreError> {
    bump(conn, entry_type, entry_id, "pass_count")
}

/// Bump the mismatch counter. The digest itself is never touched: a
/// mismatch is surfaced for administrative review, not auto-corrected.
pub fn record_mismatch(
    conn: &Connection,
    entry_type: &str,
    entry_id: &str,
) -> Result<(), StoreError> {
    bump(conn, entry_type, entry_id, "mismatch_count")
}

fn bump(
    conn: &Connection,
    entry_type: &str,
    entry_id: &str,
    column: &str,
) -> Result<(), StoreError> {
    let updated = conn.execute(
        &format!(
            "UPDATE verification_records SET {column} = {column} + 1
             WHERE entry_type = ?1 AND entry_id = ?2"
        ),
        params![entry_type, entry_id],
    )?;
    if updated == 0 {
        return Err(StoreError::VerificationRecordNotFound {
            entry_type: entry_type.to_string(),
            entry_id: entry_id.to_string(),
        });
    }
    Ok(())
}
