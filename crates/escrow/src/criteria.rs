//! Artist matching criteria
//!
//! A closed set of identifier kinds replaces the open string-keyed map the
//! platform's importers produce: unknown kinds are rejected at the boundary
//! instead of silently stored.

use crate::error::EscrowError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::{Display, EnumString};

/// External identifier namespaces an artist can be matched on.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdentifierKind {
    YoutubeChannelId,
    SpotifyArtistId,
    MusicbrainzId,
    Isrc,
    Upc,
}

/// Criteria stored verbatim on an allocation for later reconciliation.
///
/// This core only offers exact lookups over these fields; fuzzy matching
/// is a concern of the registration flow outside the settlement engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCriteria {
    pub artist_name: String,
    pub alternate_names: Vec<String>,
    pub identifiers: BTreeMap<IdentifierKind, String>,
}

impl MatchCriteria {
    pub fn named(artist_name: impl Into<String>) -> Self {
        Self {
            artist_name: artist_name.into(),
            alternate_names: Vec::new(),
            identifiers: BTreeMap::new(),
        }
    }

    pub fn with_alternate_name(mut self, name: impl Into<String>) -> Self {
        self.alternate_names.push(name.into());
        self
    }

    pub fn with_identifier(mut self, kind: IdentifierKind, value: impl Into<String>) -> Self {
        self.identifiers.insert(kind, value.into());
        self
    }

    /// Boundary validation: names and identifier values must be non-empty.
    pub fn validate(&self) -> Result<(), EscrowError> {
        if self.artist_name.trim().is_empty() {
            return Err(EscrowError::InvalidCriteria(
                "artist name cannot be empty".to_string(),
            ));
        }
        if self.alternate_names.iter().any(|n| n.trim().is_empty()) {
            return Err(EscrowError::InvalidCriteria(
                "alternate names cannot be empty".to_string(),
            ));
        }
        if let Some((kind, _)) = self.identifiers.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(EscrowError::InvalidCriteria(format!(
                "identifier {kind} cannot be empty"
            )));
        }
        Ok(())
    }

    /// Exact-field match: same name (either direct or via alternate names)
    /// or any shared external identifier value.
    pub fn matches(&self, query: &MatchCriteria) -> bool {
        if names_equal(&self.artist_name, &query.artist_name) {
            return true;
        }
        let self_names = self.all_names();
        if query
            .all_names()
            .iter()
            .any(|q| self_names.iter().any(|s| names_equal(s, q)))
        {
            return true;
        }
        self.identifiers
            .iter()
            .any(|(kind, value)| query.identifiers.get(kind) == Some(value))
    }

    fn all_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = vec![self.artist_name.as_str()];
        names.extend(self.alternate_names.iter().map(String::as_str));
        names
    }
}

fn names_equal(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
