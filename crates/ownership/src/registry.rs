//! Owner registry operations

use crate::audit;
use crate::error::OwnershipError;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tipjar_core::{MediaId, UserId};
use tipjar_ledger::canonical_now;
use tipjar_store::Database;
use tracing::info;

/// Role an owner plays for a media item. Informational; the percentage is
/// what settlement arithmetic runs on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OwnerRole {
    Artist,
    Composer,
    Producer,
    Label,
}

/// One verified owner's stake in a media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaOwner {
    pub user_id: UserId,
    pub percentage: u8,
    pub role: OwnerRole,
}

/// Registry of verified per-media ownership splits.
///
/// Invariant: for any media item the percentages sum to at most 100, checked
/// before any mutation is applied. Every applied mutation is audited.
pub struct OwnerRegistry {
    db: Database,
}

impl OwnerRegistry {
    pub fn new(db: Database) -> Result<Self, OwnershipError> {
        ensure_schema(&db)?;
        Ok(Self { db })
    }

    /// Add a new owner or update an existing owner's stake.
    pub fn set_owner(
        &self,
        media_id: &MediaId,
        owner: MediaOwner,
        acting_user: &UserId,
    ) -> Result<(), OwnershipError> {
        validate_percentage(owner.percentage)?;
        self.db.with_tx(|tx| {
            let old = owners_in(tx, media_id)?;
            let mut new = old.clone();
            match new.iter_mut().find(|o| o.user_id == owner.user_id) {
                Some(existing) => *existing = owner.clone(),
                None => new.push(owner.clone()),
            }
            check_total(media_id, &new)?;
            write_owners(tx, media_id, &new)?;
            audit::append(tx, media_id, &old, &new, acting_user, &canonical_now())?;
            info!(media = %media_id, owner = %owner.user_id, pct = owner.percentage, "owner set");
            Ok(())
        })
    }

    /// Remove an owner from a media item.
    pub fn remove_owner(
        &self,
        media_id: &MediaId,
        user_id: &UserId,
        acting_user: &UserId,
    ) -> Result<(), OwnershipError> {
        self.db.with_tx(|tx| {
            let old = owners_in(tx, media_id)?;
            if !old.iter().any(|o| &o.user_id == user_id) {
                return Err(OwnershipError::NotAnOwner {
                    media_id: media_id.to_string(),
                    user_id: user_id.to_string(),
                });
            }
            let new: Vec<MediaOwner> =
                old.iter().filter(|o| &o.user_id != user_id).cloned().collect();
            write_owners(tx, media_id, &new)?;
            audit::append(tx, media_id, &old, &new, acting_user, &canonical_now())?;
            Ok(())
        })
    }

    /// Replace the whole owner list in one audited step.
    pub fn replace_all(
        &self,
        media_id: &MediaId,
        owners: Vec<MediaOwner>,
        acting_user: &UserId,
    ) -> Result<(), OwnershipError> {
        for owner in &owners {
            validate_percentage(owner.percentage)?;
        }
        self.db.with_tx(|tx| {
            check_total(media_id, &owners)?;
            let old = owners_in(tx, media_id)?;
            write_owners(tx, media_id, &owners)?;
            audit::append(tx, media_id, &old, &owners, acting_user, &canonical_now())?;
            Ok(())
        })
    }

    /// Current owner list for a media item.
    pub fn owners(&self, media_id: &MediaId) -> Result<Vec<MediaOwner>, OwnershipError> {
        self.db.read(|conn| owners_in(conn, media_id))
    }

    /// Sum of verified owner percentages for a media item.
    pub fn verified_percentage(&self, media_id: &MediaId) -> Result<u32, OwnershipError> {
        self.db.read(|conn| verified_percentage_in(conn, media_id))
    }

    /// Audit trail for a media item, oldest first.
    pub fn audit_trail(
        &self,
        media_id: &MediaId,
    ) -> Result<Vec<audit::OwnerAuditRecord>, OwnershipError> {
        self.db.read(|conn| audit::list(conn, media_id))
    }
}

/// Create the ownership tables if they do not exist.
///
/// Callable by any component that reads `media_owners` on a database where
/// no `OwnerRegistry` has been constructed yet (the escrow engine checks
/// verified percentages during share registration).
pub fn ensure_schema(db: &Database) -> Result<(), OwnershipError> {
    db.execute_schema(SCHEMA)?;
    Ok(())
}

/// Owner rows visible to the given connection/transaction.
pub fn owners_in(conn: &Connection, media_id: &MediaId) -> Result<Vec<MediaOwner>, OwnershipError> {
    let mut stmt = conn
        .prepare(
            "SELECT user_id, percentage, role FROM media_owners
             WHERE media_id = ?1 ORDER BY user_id",
        )
        .map_err(tipjar_store::StoreError::from)?;
    let owners = stmt
        .query_map(params![media_id.as_str()], |row| {
            let role: String = row.get(2)?;
            Ok(MediaOwner {
                user_id: UserId::new(row.get::<_, String>(0)?),
                percentage: row.get::<_, i64>(1)? as u8,
                role: role.parse::<OwnerRole>().map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        2,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?,
            })
        })
        .map_err(tipjar_store::StoreError::from)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(tipjar_store::StoreError::from)?;
    Ok(owners)
}

/// Sum of verified owner percentages, usable inside another store's
/// transaction (the escrow engine checks its combined invariant with this).
pub fn verified_percentage_in(
    conn: &Connection,
    media_id: &MediaId,
) -> Result<u32, OwnershipError> {
    let total: i64 = conn
        .query_row(
            "SELECT COALESCE(SUM(percentage), 0) FROM media_owners WHERE media_id = ?1",
            params![media_id.as_str()],
            |row| row.get(0),
        )
        .map_err(tipjar_store::StoreError::from)?;
    Ok(total as u32)
}

fn validate_percentage(percentage: u8) -> Result<(), OwnershipError> {
    if percentage == 0 || percentage > 100 {
        return Err(OwnershipError::InvalidPercentage(u32::from(percentage)));
    }
    Ok(())
}

fn check_total(media_id: &MediaId, owners: &[MediaOwner]) -> Result<(), OwnershipError> {
    let total: u32 = owners.iter().map(|o| u32::from(o.percentage)).sum();
    if total > 100 {
        return Err(OwnershipError::OwnershipOverflow {
            media_id: media_id.to_string(),
            attempted: total,
        });
    }
    Ok(())
}

fn write_owners(
    conn: &Connection,
    media_id: &MediaId,
    owners: &[MediaOwner],
) -> Result<(), OwnershipError> {
    conn.execute(
        "DELETE FROM media_owners WHERE media_id = ?1",
        params![media_id.as_str()],
    )
    .map_err(tipjar_store::StoreError::from)?;
    for owner in owners {
        conn.execute(
            "INSERT INTO media_owners (media_id, user_id, percentage, role)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                media_id.as_str(),
                owner.user_id.as_str(),
                i64::from(owner.percentage),
                owner.role.to_string(),
            ],
        )
        .map_err(tipjar_store::StoreError::from)?;
    }
    Ok(())
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS media_owners (
    media_id   TEXT NOT NULL,
    user_id    TEXT NOT NULL,
    percentage INTEGER NOT NULL,
    role       TEXT NOT NULL,
    PRIMARY KEY (media_id, user_id)
);

CREATE TABLE IF NOT EXISTS owner_audit (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    media_id    TEXT NOT NULL,
    old_state   TEXT NOT NULL,
    new_state   TEXT NOT NULL,
    acting_user TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_owner_audit_media ON owner_audit(media_id);
"#;
