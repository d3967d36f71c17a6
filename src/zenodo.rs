use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::domain::{Doi, normalize_doi};
use crate::providers::datacite;
use crate::record::MergedDataset;
use crate::store::Table;

const ZENODO_PREFIX: &str = "10.5281/zenodo";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    DropVersion,
    MissingVersionRecord,
    NoDatacitePayload,
    InconsistentIsversionof,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionStatus::DropVersion => "drop_version",
            DecisionStatus::MissingVersionRecord => "missing_version_record",
            DecisionStatus::NoDatacitePayload => "no_datacite_payload",
            DecisionStatus::InconsistentIsversionof => "inconsistent_isversionof",
        }
    }

    fn note(&self) -> &'static str {
        match self {
            DecisionStatus::DropVersion => "HasVersion and IsVersionOf match",
            DecisionStatus::MissingVersionRecord => "HasVersion target not in collection",
            DecisionStatus::NoDatacitePayload => "version record without DataCite payload",
            DecisionStatus::InconsistentIsversionof => "IsVersionOf back-link missing",
        }
    }
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub status: DecisionStatus,
    pub concept: Doi,
    pub version: Doi,
}

#[derive(Debug, Clone, Default)]
pub struct CollapseOutcome {
    pub concepts: BTreeSet<Doi>,
    pub dropped: BTreeSet<Doi>,
    pub decisions: Vec<Decision>,
}

impl CollapseOutcome {
    pub fn count(&self, status: DecisionStatus) -> usize {
        self.decisions.iter().filter(|d| d.status == status).count()
    }

    pub fn log_table(&self) -> Table {
        let mut table = Table::new(vec!["status", "concept_doi", "version_doi", "note"]);
        for decision in &self.decisions {
            table.push(vec![
                decision.status.to_string(),
                decision.concept.to_string(),
                decision.version.to_string(),
                decision.status.note().to_string(),
            ]);
        }
        table
    }
}

fn is_zenodo_doi(doi: &Doi) -> bool {
    doi.as_str().contains(ZENODO_PREFIX)
}

fn is_zenodo_record(doi: &Doi, payload: &Value) -> bool {
    let mentions = |value: Option<String>| {
        value
            .map(|v| v.to_lowercase().contains("zenodo"))
            .unwrap_or(false)
    };
    is_zenodo_doi(doi)
        || mentions(datacite::client_id(payload))
        || mentions(datacite::publisher(payload))
}

fn related_dois(payload: &Value, relation: &str) -> Vec<Doi> {
    datacite::related_identifiers(payload)
        .into_iter()
        .filter(|rel| rel.relation_type == relation && rel.identifier_type.eq_ignore_ascii_case("doi"))
        .filter_map(|rel| normalize_doi(&rel.identifier).ok())
        .collect()
}

fn concepts(datasets: &BTreeMap<Doi, MergedDataset>) -> BTreeMap<&Doi, Vec<Doi>> {
    datasets
        .values()
        .filter_map(|dataset| {
            let payload = dataset.datacite()?;
            if !is_zenodo_record(&dataset.doi, payload) {
                return None;
            }
            let versions = related_dois(payload, "HasVersion")
                .into_iter()
                .filter(is_zenodo_doi)
                .collect::<Vec<_>>();
            (!versions.is_empty()).then_some((&dataset.doi, versions))
        })
        .collect()
}

/// Decides which version DOIs to drop. The collection itself is not
/// modified; see [`apply`].
pub fn plan(datasets: &BTreeMap<Doi, MergedDataset>) -> CollapseOutcome {
    let mut outcome = CollapseOutcome::default();
    for (concept, versions) in concepts(datasets) {
        outcome.concepts.insert(concept.clone());
        for version in versions {
            let status = match datasets.get(&version) {
                None => DecisionStatus::MissingVersionRecord,
                Some(record) => match record.datacite() {
                    None => DecisionStatus::NoDatacitePayload,
                    Some(payload) if related_dois(payload, "IsVersionOf").contains(concept) => {
                        DecisionStatus::DropVersion
                    }
                    Some(_) => DecisionStatus::InconsistentIsversionof,
                },
            };
            if status == DecisionStatus::DropVersion {
                outcome.dropped.insert(version.clone());
            }
            outcome.decisions.push(Decision {
                status,
                concept: concept.clone(),
                version,
            });
        }
    }
    tracing::info!(
        concepts = outcome.concepts.len(),
        dropped = outcome.dropped.len(),
        "planned zenodo version collapse"
    );
    outcome
}

pub fn apply(datasets: &mut BTreeMap<Doi, MergedDataset>, outcome: &CollapseOutcome) {
    datasets.retain(|doi, _| !outcome.dropped.contains(doi));
}
