//! Escrow record types

use crate::criteria::MatchCriteria;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tipjar_core::{MediaId, Pence, UserId};
use uuid::Uuid;

/// An unregistered artist's standing share of a media item.
///
/// Registered by the catalog flow once per (media, artist); every tip on
/// the media then produces one `EscrowAllocation` against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingArtistShare {
    pub id: Uuid,
    pub media_id: MediaId,
    pub percentage: u8,
    pub criteria: MatchCriteria,
    pub created_at: DateTime<Utc>,
}

/// Money earmarked for an unregistered artist out of one tip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowAllocation {
    pub id: Uuid,
    pub media_id: MediaId,
    pub bid_id: Uuid,
    pub share_id: Uuid,
    pub percentage: u8,

    /// Tip amount x percentage, rounded half away from zero, in pence.
    pub allocated_amount: Pence,

    /// Verbatim copy of the share's criteria at allocation time.
    pub criteria: MatchCriteria,

    pub claimed: bool,
    pub claimed_by: Option<UserId>,
    pub claimed_at: Option<DateTime<Utc>>,

    /// Set when the funding bid was vetoed or refunded before the claim.
    /// A voided allocation can never be claimed.
    pub voided: bool,

    pub created_at: DateTime<Utc>,
}

impl EscrowAllocation {
    /// Derive an allocation from a tip against a standing share.
    pub fn for_tip(
        share: &PendingArtistShare,
        bid_id: Uuid,
        tip_amount: Pence,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            media_id: share.media_id.clone(),
            bid_id,
            share_id: share.id,
            percentage: share.percentage,
            allocated_amount: tip_amount.percentage(share.percentage),
            criteria: share.criteria.clone(),
            claimed: false,
            claimed_by: None,
            claimed_at: None,
            voided: false,
            created_at: at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tipjar_ledger::canonical_now;

    #[test]
    fn test_allocation_amount_from_share() {
        let share = PendingArtistShare {
            id: Uuid::new_v4(),
            media_id: MediaId::new("M"),
            percentage: 50,
            criteria: MatchCriteria::named("Aurora"),
            created_at: canonical_now(),
        };
        let allocation =
            EscrowAllocation::for_tip(&share, Uuid::new_v4(), Pence::new(300).unwrap(), canonical_now());
        assert_eq!(allocation.allocated_amount.value(), 150);
        assert!(!allocation.claimed);
        assert_eq!(allocation.share_id, share.id);
    }
}
