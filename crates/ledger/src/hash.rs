//! Tamper-evident digests for ledger entries
//!
//! Each entry's digest is self-contained: there is deliberately no chaining
//! to the previous entry's digest. A hash chain would force all writers to
//! serialize; independent per-row digests let intents for different users
//! commit fully in parallel while still detecting row-level tampering.
//! (Wholesale deletion/reordering is the Verification Store's concern, which
//! keeps an independent copy of every digest.)
//!
//! The canonical field serialization below is FROZEN as version 1. Changing
//! key order, the null marker, or the date format invalidates every stored
//! digest, so any change must bump `DIGEST_VERSION` and keep this form intact
//! for old entries.

use crate::entry::LedgerEntry;
use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

/// Current canonical-form version stamped into new entries.
pub const DIGEST_VERSION: u32 = 1;

/// Marker for "not applicable" snapshot fields. Distinct from "0".
const NULL: &str = "null";

/// Domain separator so entry digests cannot collide with other hashed records.
const DOMAIN_V1: &str = "tipjar.ledger.entry.v1";

/// Canonical text form of a timestamp: RFC 3339, UTC, microsecond precision.
///
/// The writer truncates timestamps to this precision before building an
/// entry, so a digest recomputed from storage always sees identical bytes.
pub fn canonical_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time truncated to the canonical (microsecond) precision.
pub fn canonical_now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}

/// Compute the version-1 digest over an entry's critical fields.
///
/// Pure and deterministic; ignores the `digest` field itself.
pub fn digest_entry(entry: &LedgerEntry) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_form(entry).as_bytes());
    hex::encode(hasher.finalize())
}

/// Recompute and compare. Never mutates.
///
/// Returns false for unknown digest versions: an entry stamped with a future
/// canonical form cannot be vouched for by this code.
pub fn verify_entry(entry: &LedgerEntry) -> bool {
    entry.digest_version == DIGEST_VERSION && digest_entry(entry) == entry.digest
}

/// The frozen v1 canonical form: one field per line, fixed order, `null`
/// marker for absent values, amounts as bare integers.
fn canonical_form(entry: &LedgerEntry) -> String {
    let s = &entry.snapshots;
    [
        DOMAIN_V1.to_string(),
        entry.sequence.to_string(),
        entry.id.to_string(),
        entry.kind.to_string(),
        entry.status.to_string(),
        entry.user_id.to_string(),
        opt_string(entry.media_id.as_ref()),
        opt_string(entry.party_id.as_ref()),
        opt_string(entry.bid_id.as_ref()),
        entry.amount.value().to_string(),
        opt_i64(s.user_balance_pre.map(|p| p.value())),
        opt_i64(s.user_balance_post.map(|p| p.value())),
        opt_i64(s.lifetime_pre.map(|p| p.value())),
        opt_i64(s.lifetime_post.map(|p| p.value())),
        opt_i64(s.tune_bytes_pre.map(|t| t.value())),
        opt_i64(s.tune_bytes_post.map(|t| t.value())),
        opt_i64(s.media_total_pre.map(|p| p.value())),
        opt_i64(s.media_total_post.map(|p| p.value())),
        opt_i64(s.platform_total_pre.map(|p| p.value())),
        opt_i64(s.platform_total_post.map(|p| p.value())),
        canonical_timestamp(&entry.recorded_at),
    ]
    .join("\n")
}

fn opt_string<T: ToString>(value: Option<&T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => NULL.to_string(),
    }
}

fn opt_i64(value: Option<i64>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => NULL.to_string(),
    }
}
