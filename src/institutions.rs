use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::affiliation::AffiliationEdge;
use crate::directory::Directory;
use crate::domain::{Doi, OrgId, PersonKey};
use crate::store::Table;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionStats {
    pub dataset_count: usize,
    pub author_count: usize,
    pub orcid_author_count: usize,
}

impl InstitutionStats {
    pub fn orcid_percent(&self) -> f64 {
        percent(self.orcid_author_count, self.author_count)
    }
}

#[derive(Default)]
struct Accumulator<'a> {
    datasets: BTreeSet<&'a Doi>,
    persons: BTreeSet<&'a PersonKey>,
}

/// Folds edges into per-organisation statistics.
///
/// Counts are set cardinalities, so the result does not depend on edge
/// order or on repeated edges.
pub fn aggregate<'a, I>(edges: I) -> BTreeMap<OrgId, InstitutionStats>
where
    I: IntoIterator<Item = &'a AffiliationEdge>,
{
    let mut grouped: BTreeMap<&OrgId, Accumulator<'_>> = BTreeMap::new();
    for edge in edges {
        let acc = grouped.entry(&edge.organisation).or_default();
        acc.datasets.insert(&edge.doi);
        acc.persons.insert(&edge.person);
    }

    grouped
        .into_iter()
        .map(|(org, acc)| {
            let stats = InstitutionStats {
                dataset_count: acc.datasets.len(),
                author_count: acc.persons.len(),
                orcid_author_count: acc.persons.iter().filter(|p| p.is_orcid()).count(),
            };
            (org.clone(), stats)
        })
        .collect()
}

pub fn ranked(stats: &BTreeMap<OrgId, InstitutionStats>) -> Vec<(&OrgId, &InstitutionStats)> {
    let mut rows = stats
        .iter()
        .filter(|(_, stats)| stats.dataset_count > 0)
        .collect::<Vec<_>>();
    rows.sort_by(|(a_id, a), (b_id, b)| {
        b.dataset_count
            .cmp(&a.dataset_count)
            .then_with(|| a_id.cmp(b_id))
    });
    rows
}

pub fn institutions_table(
    stats: &BTreeMap<OrgId, InstitutionStats>,
    directory: &Directory,
) -> Table {
    let mut table = Table::new(vec!["organisationId", "name", "datasetCount", "authorCount"]);
    for (org, row) in ranked(stats) {
        table.push(vec![
            org.to_string(),
            directory.display_name(org),
            row.dataset_count.to_string(),
            row.author_count.to_string(),
        ]);
    }
    table
}

pub fn orcid_table(stats: &BTreeMap<OrgId, InstitutionStats>, directory: &Directory) -> Table {
    let mut table = Table::new(vec![
        "organisationId",
        "name",
        "datasetCount",
        "authorCount",
        "orcidAuthorCount",
        "orcidPercent",
    ]);
    for (org, row) in ranked(stats) {
        table.push(vec![
            org.to_string(),
            directory.display_name(org),
            row.dataset_count.to_string(),
            row.author_count.to_string(),
            row.orcid_author_count.to_string(),
            format!("{:.1}", row.orcid_percent()),
        ]);
    }
    table
}

pub(crate) fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}
