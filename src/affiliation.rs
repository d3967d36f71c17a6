use std::collections::BTreeSet;

use serde::Serialize;

use crate::diagnostics::Diagnostics;
use crate::directory::Directory;
use crate::domain::{Doi, OrgId, PersonKey, normalize_org_id, normalize_person};
use crate::providers;
use crate::record::MergedDataset;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct AffiliationEdge {
    pub organisation: OrgId,
    pub person: PersonKey,
    pub doi: Doi,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OrgFilter<'a> {
    directory: Option<&'a Directory>,
    allow: Option<&'a BTreeSet<OrgId>>,
}

impl<'a> OrgFilter<'a> {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn directory(mut self, directory: &'a Directory) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn allow(mut self, allow: &'a BTreeSet<OrgId>) -> Self {
        self.allow = Some(allow);
        self
    }

    pub fn permits(&self, org: &OrgId) -> bool {
        self.directory.is_none_or(|directory| directory.contains(org))
            && self.allow.is_none_or(|allow| allow.contains(org))
    }
}

/// Resolves the author-level edges of one dataset across all its payloads.
///
/// The same person declaring the same organisation in both payloads yields
/// a single edge. Dataset-level identifiers (publisher, institution) never
/// produce edges.
pub fn resolve_edges(
    dataset: &MergedDataset,
    filter: &OrgFilter<'_>,
    diagnostics: &mut Diagnostics,
) -> BTreeSet<AffiliationEdge> {
    let mut edges = BTreeSet::new();
    for (source, payload) in dataset.records.iter() {
        for author in providers::authors(source, payload) {
            let resolution = match normalize_person(
                author.orcid.as_deref(),
                author.family.as_deref(),
                author.given.as_deref(),
                author.name.as_deref(),
            ) {
                Ok(resolution) => resolution,
                Err(err) => {
                    if !author.organisations.is_empty() {
                        diagnostics.record_error(&err);
                    }
                    continue;
                }
            };
            if let Some(err) = &resolution.rejected_orcid {
                diagnostics.record_error(err);
            }

            for raw in &author.organisations {
                let organisation = match normalize_org_id(raw) {
                    Ok(org) => org,
                    Err(err) => {
                        diagnostics.record_error(&err);
                        continue;
                    }
                };
                if !filter.permits(&organisation) {
                    continue;
                }
                edges.insert(AffiliationEdge {
                    organisation,
                    person: resolution.key.clone(),
                    doi: dataset.doi.clone(),
                });
            }
        }
    }
    edges
}

pub fn resolve_all<'a, I>(
    datasets: I,
    filter: &OrgFilter<'_>,
    diagnostics: &mut Diagnostics,
) -> BTreeSet<AffiliationEdge>
where
    I: IntoIterator<Item = &'a MergedDataset>,
{
    let mut edges = BTreeSet::new();
    for dataset in datasets {
        edges.extend(resolve_edges(dataset, filter, diagnostics));
    }
    tracing::debug!(edges = edges.len(), "resolved affiliation edges");
    edges
}
