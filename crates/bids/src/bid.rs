//! Bid record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tipjar_core::{MediaId, PartyId, Pence, UserId};
use uuid::Uuid;

/// What a bid is placed on. Exactly one target, always.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "media_id")]
pub enum BidTarget {
    /// A song in the music catalog
    Song(MediaId),
    /// A podcast episode
    Episode(MediaId),
}

impl BidTarget {
    pub fn media_id(&self) -> &MediaId {
        match self {
            BidTarget::Song(id) | BidTarget::Episode(id) => id,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            BidTarget::Song(_) => "SONG",
            BidTarget::Episode(_) => "EPISODE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BidStatus {
    /// Placement accepted, fund reservation pending
    Requested,
    /// Funds reserved; the backing TIP entry exists
    Active,
    /// The party/queue consumed the media; no ledger effect
    Played,
    /// Reversed by an admin veto; terminal
    Vetoed,
    /// Reversed by an approved refund request; terminal
    Refunded,
}

impl BidStatus {
    /// Whether the lifecycle graph allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: BidStatus) -> bool {
        matches!(
            (self, next),
            (BidStatus::Requested, BidStatus::Active)
                | (BidStatus::Active, BidStatus::Played)
                | (BidStatus::Active, BidStatus::Vetoed)
                | (BidStatus::Active, BidStatus::Refunded)
        )
    }
}

/// A single tip request. `party_id` of `None` means a global bid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub id: Uuid,
    pub user_id: UserId,
    pub party_id: Option<PartyId>,
    pub target: BidTarget,
    pub amount: Pence,
    pub status: BidStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
