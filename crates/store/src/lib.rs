//! TipJar Store - SQLite persistence
//!
//! One SQLite database holds the append-only ledger, the wallet projection,
//! the media/platform aggregates, the durable sequence counter, and the
//! verification records. Keeping them in one database is what lets a single
//! intent commit entry + snapshots + balance mutations as one transaction.
//!
//! Higher layers (bids, escrow, ownership) create their own tables in the
//! same database via `Database::execute_schema`.

pub mod aggregate;
pub mod db;
pub mod error;
pub mod ledger;
pub mod sequence;
pub mod verification;
pub mod wallet;

pub use db::Database;
pub use error::StoreError;
pub use verification::{VerificationRecord, LEDGER_ENTRY_TYPE};
pub use wallet::WalletAccount;
