use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{IdentifierKind, StatsError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    MalformedLine,
    SourceMismatch,
    InvalidDoi,
    InvalidOrganisationId,
    InvalidOrcid,
    AuthorWithoutIdentity,
    MissingPayload,
    MissingYear,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SkipReason::MalformedLine => "malformed line",
            SkipReason::SourceMismatch => "source mismatch",
            SkipReason::InvalidDoi => "invalid DOI",
            SkipReason::InvalidOrganisationId => "invalid organisation id",
            SkipReason::InvalidOrcid => "invalid ORCID",
            SkipReason::AuthorWithoutIdentity => "author without identity",
            SkipReason::MissingPayload => "missing payload",
            SkipReason::MissingYear => "missing year",
        };
        f.write_str(label)
    }
}

impl SkipReason {
    pub fn from_error(error: &StatsError) -> Option<Self> {
        match error {
            StatsError::InvalidIdentifier { kind, .. } => Some(match kind {
                IdentifierKind::Doi => SkipReason::InvalidDoi,
                IdentifierKind::Organisation => SkipReason::InvalidOrganisationId,
                IdentifierKind::Orcid => SkipReason::InvalidOrcid,
                IdentifierKind::Person => SkipReason::AuthorWithoutIdentity,
            }),
            StatsError::SchemaMismatch { field: "record", .. } => Some(SkipReason::MissingPayload),
            StatsError::SchemaMismatch { .. } => Some(SkipReason::MissingYear),
            StatsError::MalformedRecord { .. } => Some(SkipReason::MalformedLine),
            StatsError::InvalidSource(_) => Some(SkipReason::SourceMismatch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Diagnostics {
    counts: BTreeMap<SkipReason, usize>,
}

impl Diagnostics {
    pub fn record(&mut self, reason: SkipReason) {
        *self.counts.entry(reason).or_insert(0) += 1;
    }

    /// Records a recoverable error. Returns `false` when the error is not
    /// one that may be skipped.
    pub fn record_error(&mut self, error: &StatsError) -> bool {
        match SkipReason::from_error(error) {
            Some(reason) => {
                tracing::debug!(%reason, %error, "skipped");
                self.record(reason);
                true
            }
            None => false,
        }
    }

    pub fn count(&self, reason: SkipReason) -> usize {
        self.counts.get(&reason).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SkipReason, usize)> + '_ {
        self.counts.iter().map(|(reason, count)| (*reason, *count))
    }

    pub fn merge(&mut self, other: &Diagnostics) {
        for (reason, count) in other.iter() {
            *self.counts.entry(reason).or_insert(0) += count;
        }
    }
}
