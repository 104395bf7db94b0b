//! Bid persistence
//!
//! Bids live in the same database as the ledger so a status change and the
//! ledger entry it triggers commit as one transaction. Status changes go
//! through a conditional update keyed on the expected current status, so a
//! veto and a refund racing on the same bid resolve to one winner.

use crate::bid::{Bid, BidStatus, BidTarget};
use crate::error::BidError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::str::FromStr;
use tipjar_core::{MediaId, PartyId, Pence, UserId};
use tipjar_ledger::canonical_timestamp;
use tipjar_store::{Database, StoreError};
use uuid::Uuid;

pub fn init_schema(db: &Database) -> Result<(), BidError> {
    db.execute_schema(SCHEMA)?;
    Ok(())
}

pub fn insert(conn: &Connection, bid: &Bid) -> Result<(), BidError> {
    conn.execute(
        "INSERT INTO bids (
            id, user_id, party_id, target_kind, media_id,
            amount, status, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            bid.id.to_string(),
            bid.user_id.as_str(),
            bid.party_id.as_ref().map(|p| p.as_str().to_string()),
            bid.target.kind_str(),
            bid.target.media_id().as_str(),
            bid.amount.value(),
            bid.status.to_string(),
            canonical_timestamp(&bid.created_at),
            canonical_timestamp(&bid.updated_at),
        ],
    )
    .map_err(StoreError::from)?;
    Ok(())
}

pub fn get(conn: &Connection, id: &Uuid) -> Result<Option<Bid>, BidError> {
    conn.query_row(
        &format!("{SELECT_BID} WHERE id = ?1"),
        params![id.to_string()],
        row_to_bid,
    )
    .optional()
    .map_err(StoreError::from)
    .map_err(BidError::from)
}

pub fn for_user(conn: &Connection, user_id: &UserId) -> Result<Vec<Bid>, BidError> {
    let mut stmt = conn
        .prepare(&format!(
            "{SELECT_BID} WHERE user_id = ?1 ORDER BY created_at"
        ))
        .map_err(StoreError::from)?;
    let rows = stmt
        .query_map(params![user_id.as_str()], row_to_bid)
        .map_err(StoreError::from)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::from)?;
    Ok(rows)
}

/// Conditional status update. Returns false if the bid was no longer in
/// `from` when the update ran.
pub fn set_status(
    conn: &Connection,
    id: &Uuid,
    from: BidStatus,
    to: BidStatus,
    at: &DateTime<Utc>,
) -> Result<bool, BidError> {
    let updated = conn
        .execute(
            "UPDATE bids SET status = ?1, updated_at = ?2
             WHERE id = ?3 AND status = ?4",
            params![
                to.to_string(),
                canonical_timestamp(at),
                id.to_string(),
                from.to_string()
            ],
        )
        .map_err(StoreError::from)?;
    Ok(updated == 1)
}

const SELECT_BID: &str = "SELECT
    id, user_id, party_id, target_kind, media_id,
    amount, status, created_at, updated_at
 FROM bids";

fn row_to_bid(row: &Row<'_>) -> rusqlite::Result<Bid> {
    let id: String = row.get(0)?;
    let target_kind: String = row.get(3)?;
    let media_id = MediaId::new(row.get::<_, String>(4)?);
    let status: String = row.get(6)?;
    let created_at: String = row.get(7)?;
    let updated_at: String = row.get(8)?;
    Ok(Bid {
        id: Uuid::parse_str(&id).map_err(|e| text_error(0, e))?,
        user_id: UserId::new(row.get::<_, String>(1)?),
        party_id: row.get::<_, Option<String>>(2)?.map(PartyId::new),
        target: match target_kind.as_str() {
            "SONG" => BidTarget::Song(media_id),
            "EPISODE" => BidTarget::Episode(media_id),
            other => {
                return Err(rusqlite::Error::FromSqlConversionFailure(
                    3,
                    rusqlite::types::Type::Text,
                    format!("unknown bid target kind: {other}").into(),
                ))
            }
        },
        amount: Pence::new_unchecked(row.get(5)?),
        status: BidStatus::from_str(&status).map_err(|e| text_error(6, e))?,
        created_at: parse_timestamp(&created_at, 7)?,
        updated_at: parse_timestamp(&updated_at, 8)?,
    })
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
CREATE TABLE IF NOT EXISTS bids (
    id          TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    party_id    TEXT,
    target_kind TEXT NOT NULL,
    media_id    TEXT NOT NULL,
    amount      INTEGER NOT NULL,
    status      TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_bids_user ON bids(user_id);
CREATE INDEX IF NOT EXISTS idx_bids_media ON bids(media_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_target_kind_is_a_read_error() {
        let db = Database::in_memory().unwrap();
        init_schema(&db).unwrap();
        let id = Uuid::new_v4();
        db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO bids (
                    id, user_id, party_id, target_kind, media_id,
                    amount, status, created_at, updated_at
                 ) VALUES (?1, 'alice', NULL, 'PLAYLIST', 'm1', 100,
                           'ACTIVE', '2026-01-01T00:00:00.000000+00:00',
                           '2026-01-01T00:00:00.000000+00:00')",
                params![id.to_string()],
            )
            .map_err(StoreError::from)
        })
        .unwrap();

        let result = db.read(|conn| get(conn, &id));
        assert!(result.is_err());
    }
}
