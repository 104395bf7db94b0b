//! Media and platform tip aggregates
//!
//! Running sums maintained by the Ledger Writer in the same transaction as
//! the entry they were snapshotted into.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use tipjar_core::{MediaId, Pence};
use tipjar_ledger::canonical_timestamp;

/// Running tip total for one media item (0 if never tipped).
pub fn media_total(conn: &Connection, media_id: &MediaId) -> Result<Pence, StoreError> {
    let total: Option<i64> = conn
        .query_row(
            "SELECT total_tipped FROM media_aggregates WHERE media_id = ?1",
            params![media_id.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(Pence::new_unchecked(total.unwrap_or(0)))
}

pub fn set_media_total(
    tx: &Transaction,
    media_id: &MediaId,
    total: Pence,
    at: &DateTime<Utc>,
) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO media_aggregates (media_id, total_tipped, updated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(media_id) DO UPDATE SET
            total_tipped = excluded.total_tipped,
            updated_at = excluded.updated_at",
        params![media_id.as_str(), total.value(), canonical_timestamp(at)],
    )?;
    Ok(())
}

/// Platform-wide tip total (a single seeded row).
pub fn platform_total(conn: &Connection) -> Result<Pence, StoreError> {
    let total: i64 = conn.query_row(
        "SELECT total_tipped FROM platform_aggregate WHERE id = 1",
        [],
        |row| row.get(0),
    )?;
    Ok(Pence::new_unchecked(total))
}

pub fn set_platform_total(
    tx: &Transaction,
    total: Pence,
    at: &DateTime<Utc>,
) -> Result<(), StoreError> {
    tx.execute(
        "UPDATE platform_aggregate SET total_tipped = ?1, updated_at = ?2 WHERE id = 1",
        params![total.value(), canonical_timestamp(at)],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use tipjar_ledger::canonical_now;

    #[test]
    fn test_media_total_defaults_to_zero() {
        let db = Database::in_memory().unwrap();
        let total = db
            .read(|conn| media_total(conn, &MediaId::new("m1")))
            .unwrap();
        assert!(total.is_zero());
    }

    #[test]
    fn test_media_total_roundtrip() {
        let db = Database::in_memory().unwrap();
        let media = MediaId::new("m1");
        let now = canonical_now();
        db.with_tx(|tx| set_media_total(tx, &media, Pence::new(300).unwrap(), &now))
            .unwrap();
        let total = db.read(|conn| media_total(conn, &media)).unwrap();
        assert_eq!(total.value(), 300);
    }

    #[test]
    fn test_platform_total_seeded_and_updatable() {
        let db = Database::in_memory().unwrap();
        assert!(db.read(platform_total).unwrap().is_zero());

        let now = canonical_now();
        db.with_tx(|tx| set_platform_total(tx, Pence::new(450).unwrap(), &now))
            .unwrap();
        assert_eq!(db.read(platform_total).unwrap().value(), 450);
    }
}
