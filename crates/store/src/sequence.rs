//! Durable atomic sequence counter
//!
//! `next` is one atomic upsert-and-return statement, never a read-then-write
//! pair, so two concurrent ledger writes can never receive the same value.
//! There is deliberately no timestamp fallback: if the increment cannot
//! complete, the enclosing transaction fails and nothing is persisted.

use crate::error::StoreError;
use rusqlite::{params, Connection, Transaction};

/// Counter backing the ledger's sequence numbers.
pub const LEDGER_SEQUENCE: &str = "ledger";

/// Atomically increment the named counter and return the new value.
///
/// Must run inside the transaction that persists the entry the value is
/// assigned to; a crash after commit can then never re-issue it.
pub fn next(tx: &Transaction, name: &str) -> Result<u64, StoreError> {
    tx.query_row(
        "INSERT INTO counters (name, value) VALUES (?1, 1)
         ON CONFLICT(name) DO UPDATE SET value = value + 1
         RETURNING value",
        params![name],
        |row| row.get::<_, i64>(0),
    )
    .map(|value| value as u64)
    .map_err(|e| StoreError::SequenceAssignment {
        name: name.to_string(),
        message: e.to_string(),
    })
}

/// Current counter value without incrementing (0 if the counter is absent).
pub fn current(conn: &Connection, name: &str) -> Result<u64, StoreError> {
    let value: Option<i64> = conn
        .query_row(
            "SELECT value FROM counters WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;
    Ok(value.unwrap_or(0) as u64)
}

/// Bring the counter up to the highest persisted ledger sequence.
///
/// Run at startup: if the counter row is missing or behind the ledger table
/// (e.g. restored from an older backup), issuing from it would duplicate
/// sequence numbers.
pub fn resync(conn: &Connection, name: &str) -> Result<(), StoreError> {
    let max_sequence: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sequence), 0) FROM ledger_entries",
        [],
        |row| row.get(0),
    )?;
    conn.execute(
        "INSERT INTO counters (name, value) VALUES (?1, ?2)
         ON CONFLICT(name) DO UPDATE SET value = MAX(value, excluded.value)",
        params![name, max_sequence],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_next_starts_at_one() {
        let db = Database::in_memory().unwrap();
        let value = db
            .with_tx(|tx| next(tx, LEDGER_SEQUENCE))
            .unwrap();
        assert_eq!(value, 1);
    }

    #[test]
    fn test_next_is_strictly_increasing() {
        let db = Database::in_memory().unwrap();
        let mut last = 0;
        for _ in 0..10 {
            let value = db.with_tx(|tx| next(tx, LEDGER_SEQUENCE)).unwrap();
            assert_eq!(value, last + 1);
            last = value;
        }
    }

    #[test]
    fn test_counters_are_independent() {
        let db = Database::in_memory().unwrap();
        db.with_tx(|tx| next(tx, "a")).unwrap();
        db.with_tx(|tx| next(tx, "a")).unwrap();
        let b = db.with_tx(|tx| next(tx, "b")).unwrap();
        assert_eq!(b, 1);
        let a = db.read(|conn| current(conn, "a")).unwrap();
        assert_eq!(a, 2);
    }

    #[test]
    fn test_failed_transaction_does_not_consume_a_value() {
        let db = Database::in_memory().unwrap();
        let result: Result<u64, StoreError> = db.with_tx(|tx| {
            next(tx, LEDGER_SEQUENCE)?;
            Err(StoreError::LockPoisoned)
        });
        assert!(result.is_err());

        // Rolled back: the next successful call re-issues 1.
        let value = db.with_tx(|tx| next(tx, LEDGER_SEQUENCE)).unwrap();
        assert_eq!(value, 1);
    }

    #[test]
    fn test_resync_catches_counter_up_to_ledger() {
        let db = Database::in_memory().unwrap();
        db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO ledger_entries (
                    sequence, id, kind, status, user_id, amount,
                    digest, digest_version, recorded_at
                 ) VALUES (41, 'e-41', 'TOP_UP', 'CONFIRMED', 'alice', 5,
                           'd', 1, '2026-01-01T00:00:00.000000+00:00')",
                [],
            )
            .map_err(StoreError::from)
        })
        .unwrap();

        db.read(|conn| resync(conn, LEDGER_SEQUENCE)).unwrap();
        let value = db.with_tx(|tx| next(tx, LEDGER_SEQUENCE)).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_resync_on_empty_ledger_is_a_no_op() {
        // Runs during open, so a fresh database must accept it cleanly.
        let db = Database::in_memory().unwrap();
        db.read(|conn| resync(conn, LEDGER_SEQUENCE)).unwrap();
        let value = db.with_tx(|tx| next(tx, LEDGER_SEQUENCE)).unwrap();
        assert_eq!(value, 1);
    }

    #[test]
    fn test_resync_never_lowers_a_leading_counter() {
        let db = Database::in_memory().unwrap();
        for _ in 0..3 {
            db.with_tx(|tx| next(tx, LEDGER_SEQUENCE)).unwrap();
        }
        db.read(|conn| resync(conn, LEDGER_SEQUENCE)).unwrap();
        let value = db.with_tx(|tx| next(tx, LEDGER_SEQUENCE)).unwrap();
        assert_eq!(value, 4);
    }
}
