//! TipJar Ownership - who owns what share of a media item
//!
//! Each media item carries a set of (user, percentage, role) tuples whose
//! percentages may never sum past 100. Every mutation is rejected up front
//! if it would break that invariant, and every applied mutation appends an
//! old-state/new-state diff to an audit trail for dispute resolution.

pub mod audit;
pub mod error;
pub mod registry;

pub use audit::OwnerAuditRecord;
pub use error::OwnershipError;
pub use registry::{MediaOwner, OwnerRegistry, OwnerRole};
