//! Ownership audit trail
//!
//! Append-only old-state/new-state diffs, one per applied mutation. The
//! registry writes a record in the same transaction as the mutation itself,
//! so the trail can never miss or invent a change.

use crate::error::OwnershipError;
use crate::registry::MediaOwner;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tipjar_core::{MediaId, UserId};
use tipjar_ledger::canonical_timestamp;
use tipjar_store::StoreError;

/// One audited ownership mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerAuditRecord {
    pub id: i64,
    pub media_id: MediaId,
    pub old_state: Vec<MediaOwner>,
    pub new_state: Vec<MediaOwner>,
    pub acting_user: UserId,
    pub recorded_at: DateTime<Utc>,
}

/// Append a diff record. Called inside the registry's mutation transaction.
pub fn append(
    conn: &Connection,
    media_id: &MediaId,
    old_state: &[MediaOwner],
    new_state: &[MediaOwner],
    acting_user: &UserId,
    at: &DateTime<Utc>,
) -> Result<(), OwnershipError> {
    conn.execute(
        "INSERT INTO owner_audit (media_id, old_state, new_state, acting_user, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            media_id.as_str(),
            serde_json::to_string(old_state).map_err(StoreError::from)?,
            serde_json::to_string(new_state).map_err(StoreError::from)?,
            acting_user.as_str(),
            canonical_timestamp(at),
        ],
    )
    .map_err(StoreError::from)?;
    Ok(())
}

/// Full trail for one media item, oldest first.
pub fn list(conn: &Connection, media_id: &MediaId) -> Result<Vec<OwnerAuditRecord>, OwnershipError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, media_id, old_state, new_state, acting_user, recorded_at
             FROM owner_audit WHERE media_id = ?1 ORDER BY id ASC",
        )
        .map_err(StoreError::from)?;

    let rows = stmt
        .query_map(params![media_id.as_str()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
            ))
        })
        .map_err(StoreError::from)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(StoreError::from)?;

    let mut records = Vec::with_capacity(rows.len());
    for (id, media, old_state, new_state, acting_user, recorded_at) in rows {
        records.push(OwnerAuditRecord {
            id,
            media_id: MediaId::new(media),
            old_state: serde_json::from_str(&old_state).map_err(StoreError::from)?,
            new_state: serde_json::from_str(&new_state).map_err(StoreError::from)?,
            acting_user: UserId::new(acting_user),
            recorded_at: DateTime::parse_from_rfc3339(&recorded_at)
                .map(|ts| ts.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        });
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{OwnerRegistry, OwnerRole};
    use tipjar_store::Database;

    #[test]
    fn test_trail_records_every_mutation_in_order() {
        let db = Database::in_memory().unwrap();
        let registry = OwnerRegistry::new(db).unwrap();
        let media = MediaId::new("m1");
        let admin = UserId::new("admin");

        let alice = MediaOwner {
            user_id: UserId::new("alice"),
            percentage: 50,
            role: OwnerRole::Artist,
        };
        registry.set_owner(&media, alice.clone(), &admin).unwrap();
        registry.remove_owner(&media, &alice.user_id, &admin).unwrap();

        let trail = registry.audit_trail(&media).unwrap();
        assert_eq!(trail.len(), 2);
        assert!(trail[0].old_state.is_empty());
        assert_eq!(trail[0].new_state, vec![alice.clone()]);
        assert_eq!(trail[1].old_state, vec![alice]);
        assert!(trail[1].new_state.is_empty());
        assert!(trail[0].id < trail[1].id);
    }
}
