//! End-to-end escrow scenarios against a real database file.

use std::sync::Arc;
use std::thread;

use tempfile::TempDir;
use tipjar_core::{MediaId, Pence, UserId};
use tipjar_engine::LedgerWriter;
use tipjar_escrow::{EscrowEngine, EscrowError, IdentifierKind, MatchCriteria};
use tipjar_ledger::TransactionKind;
use tipjar_store::Database;
use uuid::Uuid;

fn open_engine(dir: &TempDir) -> (Database, LedgerWriter, EscrowEngine) {
    let db = Database::open(dir.path().join("tipjar.db")).unwrap();
    let writer = LedgerWriter::new(db.clone());
    let engine = EscrowEngine::new(db.clone(), writer.clone()).unwrap();
    (db, writer, engine)
}

fn pence(v: i64) -> Pence {
    Pence::new(v).unwrap()
}

#[test]
fn test_tip_on_escrowed_media_holds_the_artist_share() {
    let dir = TempDir::new().unwrap();
    let (db, _writer, engine) = open_engine(&dir);

    let media = MediaId::new("media_song_1");
    engine
        .register_share(
            &media,
            50,
            MatchCriteria::named("Aurora")
                .with_alternate_name("AURORA")
                .with_identifier(IdentifierKind::SpotifyArtistId, "sp-aurora"),
        )
        .unwrap();

    // A 300p tip lands on the media: half is earmarked for the artist.
    let allocations = db
        .with_tx(|tx| engine.allocate_for_tip(tx, &media, Uuid::new_v4(), pence(300)))
        .unwrap();
    assert_eq!(allocations.len(), 1);
    assert_eq!(allocations[0].allocated_amount, pence(150));

    // The registering artist finds it by an external identifier alone.
    let found = engine
        .find_matching(
            &MatchCriteria::named("different-display-name")
                .with_identifier(IdentifierKind::SpotifyArtistId, "sp-aurora"),
        )
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, allocations[0].id);
}

#[test]
fn test_concurrent_claims_pay_exactly_once() {
    let dir = TempDir::new().unwrap();
    let (db, _writer, engine) = open_engine(&dir);
    let engine = Arc::new(engine);

    let media = MediaId::new("media_song_2");
    engine
        .register_share(&media, 40, MatchCriteria::named("Nova"))
        .unwrap();
    let allocations = db
        .with_tx(|tx| engine.allocate_for_tip(tx, &media, Uuid::new_v4(), pence(500)))
        .unwrap();
    let allocation_id = allocations[0].id;
    let artist = UserId::new("nova_account");

    let mut handles = Vec::new();
    for _ in 0..6 {
        let engine = Arc::clone(&engine);
        let artist = artist.clone();
        handles.push(thread::spawn(move || engine.claim(&allocation_id, &artist)));
    }

    let mut wins = 0;
    let mut losses = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(claimed) => {
                wins += 1;
                assert_eq!(claimed.entry.kind, TransactionKind::EscrowClaim);
                assert_eq!(claimed.entry.amount, pence(200));
            }
            Err(EscrowError::AllocationAlreadyClaimed { .. }) => losses += 1,
            Err(other) => panic!("unexpected claim failure: {other}"),
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(losses, 5);

    // The wallet was credited exactly once, by exactly one ledger entry.
    let account = db
        .read(|conn| tipjar_store::wallet::load(conn, &artist))
        .unwrap();
    assert_eq!(account.balance, pence(200));
    let entries = db.read(tipjar_store::ledger::all).unwrap();
    let claim_entries: Vec<_> = entries
        .iter()
        .filter(|e| e.kind == TransactionKind::EscrowClaim)
        .collect();
    assert_eq!(claim_entries.len(), 1);
}

#[test]
fn test_two_shares_split_one_tip() {
    let dir = TempDir::new().unwrap();
    let (db, _writer, engine) = open_engine(&dir);

    let media = MediaId::new("media_song_3");
    engine
        .register_share(&media, 30, MatchCriteria::named("Writer A"))
        .unwrap();
    engine
        .register_share(&media, 20, MatchCriteria::named("Writer B"))
        .unwrap();
    // A third share would push the media past 100%.
    assert!(matches!(
        engine.register_share(&media, 60, MatchCriteria::named("Writer C")),
        Err(EscrowError::Ownership(_))
    ));

    let allocations = db
        .with_tx(|tx| engine.allocate_for_tip(tx, &media, Uuid::new_v4(), pence(1000)))
        .unwrap();
    assert_eq!(allocations.len(), 2);
    let total: i64 = allocations
        .iter()
        .map(|a| a.allocated_amount.value())
        .sum();
    assert_eq!(total, 500);
}
