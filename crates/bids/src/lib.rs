//! TipJar Bids - the tip lifecycle state machine
//!
//! A bid is one user's tip on one media item, optionally scoped to a party.
//! Its life is `REQUESTED -> ACTIVE -> {PLAYED, VETOED, REFUNDED}`: placement
//! reserves the funds by recording a TIP through the Ledger Writer (and
//! advances straight to ACTIVE), veto and refund reverse it with a REFUND
//! entry, and played just marks the media as consumed. Every money-moving
//! transition commits in one transaction with its ledger entry, so a bid can
//! never be ACTIVE without its TIP or VETOED without its REFUND.

pub mod bid;
pub mod error;
pub mod lifecycle;
pub mod store;

pub use bid::{Bid, BidStatus, BidTarget};
pub use error::BidError;
pub use lifecycle::BidLifecycle;
