//! End-to-end writer properties under concurrent load

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use tipjar_core::{MediaId, Pence, UserId};
use tipjar_engine::LedgerWriter;
use tipjar_ledger::{verify_entry, TransactionIntent};
use tipjar_store::{ledger, wallet, Database, StoreError};
use uuid::Uuid;

fn pence(v: i64) -> Pence {
    Pence::new(v).unwrap()
}

#[test]
fn test_concurrent_writers_get_gapless_unique_sequences() {
    let db = Database::in_memory().unwrap();
    let writer = Arc::new(LedgerWriter::new(db.clone()));

    let threads = 8;
    let per_thread = 25;
    let mut handles = Vec::new();
    for t in 0..threads {
        let writer = Arc::clone(&writer);
        handles.push(thread::spawn(move || {
            for i in 0..per_thread {
                writer
                    .record(TransactionIntent::top_up(
                        UserId::new(format!("user-{t}")),
                        pence(10),
                        format!("sess-{t}-{i}"),
                    ))
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let entries = db.read(|conn| ledger::all(conn)).unwrap();
    assert_eq!(entries.len(), threads * per_thread);

    let sequences: Vec<u64> = entries.iter().map(|e| e.sequence).collect();
    let unique: HashSet<u64> = sequences.iter().copied().collect();
    assert_eq!(unique.len(), sequences.len(), "duplicate sequence issued");

    // Gapless: exactly 1..=N in order.
    let expected: Vec<u64> = (1..=(threads * per_thread) as u64).collect();
    assert_eq!(sequences, expected);

    for entry in &entries {
        assert!(verify_entry(entry));
    }
}

#[test]
fn test_concurrent_top_ups_for_different_users_both_commit() {
    let db = Database::in_memory().unwrap();
    let writer = Arc::new(LedgerWriter::new(db));

    let w1 = Arc::clone(&writer);
    let w2 = Arc::clone(&writer);
    let h1 = thread::spawn(move || {
        w1.record(TransactionIntent::top_up(UserId::new("alice"), pence(100), "sess_a"))
            .unwrap()
    });
    let h2 = thread::spawn(move || {
        w2.record(TransactionIntent::top_up(UserId::new("bob"), pence(200), "sess_b"))
            .unwrap()
    });

    let a = h1.join().unwrap();
    let b = h2.join().unwrap();

    let (lo, hi) = if a.entry.sequence < b.entry.sequence {
        (a.entry.sequence, b.entry.sequence)
    } else {
        (b.entry.sequence, a.entry.sequence)
    };
    assert_eq!(hi, lo + 1, "sequences must be adjacent, never equal");
}

#[test]
fn test_replayed_webhook_converges_to_one_entry() {
    let db = Database::in_memory().unwrap();
    let writer = Arc::new(LedgerWriter::new(db.clone()));

    let mut handles = Vec::new();
    for _ in 0..6 {
        let writer = Arc::clone(&writer);
        handles.push(thread::spawn(move || {
            writer
                .record(TransactionIntent::top_up(
                    UserId::new("alice"),
                    pence(500),
                    "sess_123",
                ))
                .unwrap()
        }));
    }
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let original: HashSet<Uuid> = results.iter().map(|r| r.entry.id).collect();
    assert_eq!(original.len(), 1, "replays must return the original entry");
    assert_eq!(results.iter().filter(|r| !r.replayed).count(), 1);

    let entries = db.read(|conn| ledger::all(conn)).unwrap();
    assert_eq!(entries.len(), 1);

    let balance = db
        .read(|conn| wallet::load(conn, &UserId::new("alice")))
        .unwrap()
        .balance;
    assert_eq!(balance, pence(500), "exactly one balance increment");
}

#[test]
fn test_wallet_matches_ledger_after_mixed_workload() {
    let db = Database::in_memory().unwrap();
    let writer = LedgerWriter::new(db.clone());
    let alice = UserId::new("alice");
    let bid = Uuid::new_v4();

    writer
        .record(TransactionIntent::top_up(alice.clone(), pence(1000), "sess_1"))
        .unwrap();
    writer
        .record(TransactionIntent::tip(
            alice.clone(),
            MediaId::new("M"),
            None,
            bid,
            pence(300),
            "bid-tip:1",
        ))
        .unwrap();
    writer
        .record(TransactionIntent::pay_out(alice.clone(), pence(200), "payout-1"))
        .unwrap();
    writer
        .record(TransactionIntent::refund(
            alice.clone(),
            MediaId::new("M"),
            None,
            bid,
            pence(300),
            "bid-reversal:1",
        ))
        .unwrap();

    let account = db.read(|conn| wallet::load(conn, &alice)).unwrap();
    assert_eq!(account.balance, pence(800)); // 1000 - 300 - 200 + 300
    assert_eq!(account.lifetime_tipped, Pence::ZERO);

    // Ledger snapshots chain: each entry's pre equals the previous post.
    let entries = db.read(|conn| ledger::all(conn)).unwrap();
    for pair in entries.windows(2) {
        assert_eq!(
            pair[1].snapshots.user_balance_pre,
            pair[0].snapshots.user_balance_post
        );
    }
}

#[test]
fn test_writer_survives_database_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tipjar.db");

    {
        let writer = LedgerWriter::new(Database::open(&path).unwrap());
        writer
            .record(TransactionIntent::top_up(UserId::new("alice"), pence(100), "sess_1"))
            .unwrap();
    }

    // Reopen: the counter resumes from the persisted maximum; the idempotency
    // key still guards against replay.
    let db = Database::open(&path).unwrap();
    let writer = LedgerWriter::new(db.clone());
    let replay = writer
        .record(TransactionIntent::top_up(UserId::new("alice"), pence(100), "sess_1"))
        .unwrap();
    assert!(replay.replayed);

    let fresh = writer
        .record(TransactionIntent::top_up(UserId::new("alice"), pence(100), "sess_2"))
        .unwrap();
    assert_eq!(fresh.entry.sequence, 2);

    let max: Result<u64, StoreError> = db.read(ledger::max_sequence);
    assert_eq!(max.unwrap(), 2);
}
