//! Wallet account projection
//!
//! A wallet row is a projection of the ledger, never a source of truth of
//! its own: the Ledger Writer is the only component that saves one, and it
//! does so in the same transaction that inserts the entry.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde::{Deserialize, Serialize};
use tipjar_core::{Pence, TuneBytes, UserId};
use tipjar_ledger::canonical_timestamp;

/// Current balance and lifetime aggregates for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAccount {
    pub user_id: UserId,
    pub balance: Pence,
    pub lifetime_tipped: Pence,
    pub tune_bytes: TuneBytes,
    pub updated_at: DateTime<Utc>,
}

impl WalletAccount {
    /// Empty wallet for a user with no recorded entries.
    pub fn empty(user_id: UserId, at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            balance: Pence::ZERO,
            lifetime_tipped: Pence::ZERO,
            tune_bytes: TuneBytes::ZERO,
            updated_at: at,
        }
    }
}

/// Load a user's wallet, defaulting to an empty one.
pub fn load(conn: &Connection, user_id: &UserId) -> Result<WalletAccount, StoreError> {
    let row = conn
        .query_row(
            "SELECT balance, lifetime_tipped, tune_bytes, updated_at
             FROM wallet_accounts WHERE user_id = ?1",
            params![user_id.as_str()],
            |row| {
                let updated_at: String = row.get(3)?;
                Ok(WalletAccount {
                    user_id: user_id.clone(),
                    balance: Pence::new_unchecked(row.get(0)?),
                    lifetime_tipped: Pence::new_unchecked(row.get(1)?),
                    tune_bytes: TuneBytes::new_unchecked(row.get(2)?),
                    updated_at: DateTime::parse_from_rfc3339(&updated_at)
                        .map(|ts| ts.with_timezone(&Utc))
                        .map_err(|e| {
                            rusqlite::Error::FromSqlConversionFailure(
                                3,
                                rusqlite::types::Type::Text,
                                Box::new(e),
                            )
                        })?,
                })
            },
        )
        .optional()?;

    match row {
        Some(wallet) => Ok(wallet),
        None => Ok(WalletAccount::empty(user_id.clone(), Utc::now())),
    }
}

/// Upsert the wallet row with post-transaction values.
pub fn save(tx: &Transaction, wallet: &WalletAccount) -> Result<(), StoreError> {
    tx.execute(
        "INSERT INTO wallet_accounts (user_id, balance, lifetime_tipped, tune_bytes, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(user_id) DO UPDATE SET
            balance = excluded.balance,
            lifetime_tipped = excluded.lifetime_tipped,
            tune_bytes = excluded.tune_bytes,
            updated_at = excluded.updated_at",
        params![
            wallet.user_id.as_str(),
            wallet.balance.value(),
            wallet.lifetime_tipped.value(),
            wallet.tune_bytes.value(),
            canonical_timestamp(&wallet.updated_at),
        ],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use tipjar_ledger::canonical_now;

    #[test]
    fn test_load_missing_wallet_is_empty() {
        let db = Database::in_memory().unwrap();
        let wallet = db
            .read(|conn| load(conn, &UserId::new("alice")))
            .unwrap();
        assert_eq!(wallet.balance, Pence::ZERO);
        assert_eq!(wallet.lifetime_tipped, Pence::ZERO);
        assert_eq!(wallet.tune_bytes, TuneBytes::ZERO);
    }

    #[test]
    fn test_corrupt_timestamp_is_a_read_error() {
        let db = Database::in_memory().unwrap();
        db.with_tx(|tx| {
            tx.execute(
                "INSERT INTO wallet_accounts
                    (user_id, balance, lifetime_tipped, tune_bytes, updated_at)
                 VALUES ('alice', 100, 0, 0, 'not-a-timestamp')",
                [],
            )
            .map_err(StoreError::from)
        })
        .unwrap();

        let result = db.read(|conn| load(conn, &UserId::new("alice")));
        assert!(result.is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let db = Database::in_memory().unwrap();
        let wallet = WalletAccount {
            user_id: UserId::new("alice"),
            balance: Pence::new(700).unwrap(),
            lifetime_tipped: Pence::new(300).unwrap(),
            tune_bytes: TuneBytes::new(300).unwrap(),
            updated_at: canonical_now(),
        };
        db.with_tx(|tx| save(tx, &wallet)).unwrap();

        let loaded = db.read(|conn| load(conn, &wallet.user_id)).unwrap();
        assert_eq!(loaded, wallet);
    }

    #[test]
    fn test_save_overwrites_previous_values() {
        let db = Database::in_memory().unwrap();
        let mut wallet = WalletAccount::empty(UserId::new("alice"), canonical_now());
        wallet.balance = Pence::new(100).unwrap();
        db.with_tx(|tx| save(tx, &wallet)).unwrap();

        wallet.balance = Pence::new(50).unwrap();
        db.with_tx(|tx| save(tx, &wallet)).unwrap();

        let loaded = db.read(|conn| load(conn, &wallet.user_id)).unwrap();
        assert_eq!(loaded.balance.value(), 50);
    }
}
