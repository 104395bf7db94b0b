//! TipJar Escrow - money owed to artists who are not here yet
//!
//! When a tip lands on media whose nominal artist has no verified account,
//! that artist's share is held as an `EscrowAllocation` instead of being
//! credited to any wallet. The matching criteria (name, alternate names,
//! external identifiers) are stored verbatim; when the artist registers,
//! the registration flow looks allocations up by those criteria and claims
//! them. Exactly one concurrent claim wins, and the winning credit flows
//! through the Ledger Writer as an ESCROW_CLAIM entry so settlements are as
//! tamper-evident and sequenced as every other balance change.

pub mod allocation;
pub mod criteria;
pub mod engine;
pub mod error;
pub mod store;

pub use allocation::{EscrowAllocation, PendingArtistShare};
pub use criteria::{IdentifierKind, MatchCriteria};
pub use engine::{Claimed, EscrowEngine};
pub use error::EscrowError;
