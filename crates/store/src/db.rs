//! Shared SQLite database handle
//!
//! All stores operate on one `Database`. Writers take a transaction scope
//! through `with_tx`, which opens an IMMEDIATE transaction so every intent
//! commits entry, snapshots and balance mutations atomically, or not at all.

use crate::error::StoreError;
use crate::sequence;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Cloneable handle to the shared SQLite database.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file and initialize the core schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn)
    }

    /// In-memory database (for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(CORE_SCHEMA)?;

        // Resume the counter from the highest persisted sequence so a lost
        // or stale counter row can never re-issue a used value.
        sequence::resync(&conn, sequence::LEDGER_SEQUENCE)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` inside one IMMEDIATE transaction. Commits on `Ok`, rolls back
    /// on `Err` - partial writes are never observable.
    pub fn with_tx<T, E>(
        &self,
        f: impl FnOnce(&Transaction) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let mut guard = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StoreError::from)?;
        let value = f(&tx)?;
        tx.commit().map_err(StoreError::from)?;
        Ok(value)
    }

    /// Run a closure against the connection, outside any explicit
    /// transaction. Intended for lookups and single-statement writes.
    pub fn read<T, E>(&self, f: impl FnOnce(&Connection) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StoreError>,
    {
        let guard = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&guard)
    }

    /// Create additional tables owned by a higher-layer store.
    pub fn execute_schema(&self, sql: &str) -> Result<(), StoreError> {
        let guard = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        guard.execute_batch(sql)?;
        Ok(())
    }
}

/// Core schema: counter, ledger, wallet projection, aggregates, verification.
const CORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS counters (
    name  TEXT PRIMARY KEY,
    value INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS ledger_entries (
    sequence            INTEGER PRIMARY KEY,
    id                  TEXT NOT NULL UNIQUE,
    kind                TEXT NOT NULL,
    status              TEXT NOT NULL,
    user_id             TEXT NOT NULL,
    media_id            TEXT,
    party_id            TEXT,
    bid_id              TEXT,
    amount              INTEGER NOT NULL,
    user_balance_pre    INTEGER,
    user_balance_post   INTEGER,
    lifetime_pre        INTEGER,
    lifetime_post       INTEGER,
    tune_bytes_pre      INTEGER,
    tune_bytes_post     INTEGER,
    media_total_pre     INTEGER,
    media_total_post    INTEGER,
    platform_total_pre  INTEGER,
    platform_total_post INTEGER,
    digest              TEXT NOT NULL,
    digest_version      INTEGER NOT NULL,
    idempotency_key     TEXT UNIQUE,
    recorded_at         TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_ledger_user ON ledger_entries(user_id);
CREATE INDEX IF NOT EXISTS idx_ledger_media ON ledger_entries(media_id);

CREATE TABLE IF NOT EXISTS wallet_accounts (
    user_id         TEXT PRIMARY KEY,
    balance         INTEGER NOT NULL DEFAULT 0,
    lifetime_tipped INTEGER NOT NULL DEFAULT 0,
    tune_bytes      INTEGER NOT NULL DEFAULT 0,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS media_aggregates (
    media_id     TEXT PRIMARY KEY,
    total_tipped INTEGER NOT NULL DEFAULT 0,
    updated_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS platform_aggregate (
    id           INTEGER PRIMARY KEY CHECK (id = 1),
    total_tipped INTEGER NOT NULL DEFAULT 0,
    updated_at   TEXT NOT NULL
);

INSERT OR IGNORE INTO platform_aggregate (id, total_tipped, updated_at)
VALUES (1, 0, '1970-01-01T00:00:00.000000+00:00');

CREATE TABLE IF NOT EXISTS verification_records (
    entry_type     TEXT NOT NULL,
    entry_id       TEXT NOT NULL,
    digest         TEXT NOT NULL,
    recorded_at    TEXT NOT NULL,
    pass_count     INTEGER NOT NULL DEFAULT 0,
    mismatch_count INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (entry_type, entry_id)
);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_creates_schema() {
        let db = Database::in_memory().unwrap();
        let count: i64 = db
            .read(|conn| {
                conn.query_row("SELECT COUNT(*) FROM ledger_entries", [], |r| r.get(0))
                    .map_err(StoreError::from)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_with_tx_rolls_back_on_error() {
        let db = Database::in_memory().unwrap();
        let result: Result<(), StoreError> = db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO counters (name, value) VALUES ('x', 1)",
                [],
            )?;
            Err(StoreError::LockPoisoned)
        });
        assert!(result.is_err());

        let count: i64 = db
            .read(|conn| {
                conn.query_row(
                    "SELECT COUNT(*) FROM counters WHERE name = 'x'",
                    [],
                    |r| r.get(0),
                )
                .map_err(StoreError::from)
            })
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tipjar.db");
        {
            let db = Database::open(&path).unwrap();
            db.with_tx(|tx| {
                tx.execute("INSERT INTO counters (name, value) VALUES ('y', 9)", [])
                    .map_err(StoreError::from)
            })
            .unwrap();
        }
        let db = Database::open(&path).unwrap();
        let value: i64 = db
            .read(|conn| {
                conn.query_row(
                    "SELECT value FROM counters WHERE name = 'y'",
                    [],
                    |r| r.get(0),
                )
                .map_err(StoreError::from)
            })
            .unwrap();
        assert_eq!(value, 9);
    }
}
