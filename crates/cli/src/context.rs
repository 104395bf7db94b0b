//! Application context - wires everything together

use std::path::Path;

use tipjar_bids::BidLifecycle;
use tipjar_engine::{IntegrityAuditor, LedgerWriter};
use tipjar_escrow::EscrowEngine;
use tipjar_ownership::OwnerRegistry;
use tipjar_store::Database;

/// Application context - one database, all engines wired to it
pub struct AppContext {
    pub db: Database,
    pub writer: LedgerWriter,
    pub auditor: IntegrityAuditor,
    pub owners: OwnerRegistry,
    pub escrow: EscrowEngine,
    pub bids: BidLifecycle,
}

impl AppContext {
    /// Open (or create) the database under `data_path` and wire every engine.
    pub fn new(data_path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let data_path = data_path.as_ref();
        std::fs::create_dir_all(data_path)?;
        let db_path = data_path.join("tipjar.db");

        let db = Database::open(&db_path)?;
        let writer = LedgerWriter::new(db.clone());
        let auditor = IntegrityAuditor::new(db.clone());
        let owners = OwnerRegistry::new(db.clone())?;
        let escrow = EscrowEngine::new(db.clone(), writer.clone())?;
        let bids = BidLifecycle::new(db.clone(), writer.clone(), escrow.clone())?;

        Ok(Self {
            db,
            writer,
            auditor,
            owners,
            escrow,
            bids,
        })
    }
}
