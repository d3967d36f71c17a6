use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diagnostics::Diagnostics;
use crate::domain::{Doi, OrgId, Source, normalize_doi, normalize_org_id};
use crate::error::StatsError;
use crate::providers;
use crate::record::{MergedDataset, RawRecord};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCounts {
    pub datacite: usize,
    pub crossref: usize,
}

impl SourceCounts {
    pub fn get(&self, source: Source) -> usize {
        match source {
            Source::Datacite => self.datacite,
            Source::Crossref => self.crossref,
        }
    }

    fn bump(&mut self, source: Source) {
        match source {
            Source::Datacite => self.datacite += 1,
            Source::Crossref => self.crossref += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.datacite + self.crossref
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSummary {
    pub raw_counts: SourceCounts,
    pub unique_by_source: SourceCounts,
    pub unique_doi: usize,
    pub overlap_doi: usize,
    pub intra_source_duplicates: SourceCounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution_count: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub datasets: BTreeMap<Doi, MergedDataset>,
    pub summary: MergeSummary,
    pub diagnostics: Diagnostics,
}

/// Groups raw records by normalized DOI.
///
/// A sighting from a source already present for that DOI replaces the
/// stored payload. Organisation ids accumulate over every sighting,
/// including payloads that were later replaced.
pub fn merge<I>(records: I) -> MergeOutcome
where
    I: IntoIterator<Item = RawRecord>,
{
    let mut outcome = MergeOutcome::default();
    for record in records {
        add_record(&mut outcome, record);
    }
    outcome.summary = summarize(&outcome.datasets, outcome.summary);
    tracing::info!(
        unique = outcome.summary.unique_doi,
        overlap = outcome.summary.overlap_doi,
        skipped = outcome.diagnostics.total(),
        "merged raw records"
    );
    outcome
}

fn add_record(outcome: &mut MergeOutcome, record: RawRecord) {
    let RawRecord {
        source,
        doi,
        organisation_id_raw,
        payload,
    } = record;
    outcome.summary.raw_counts.bump(source);

    let doi = match normalize_doi(doi.as_deref().unwrap_or_default()) {
        Ok(doi) => doi,
        Err(err) => {
            outcome.diagnostics.record_error(&err);
            return;
        }
    };

    // A sighting without a payload must not fill or overwrite a slot.
    if payload.is_null() {
        outcome.diagnostics.record_error(&StatsError::SchemaMismatch {
            doi: doi.to_string(),
            field: "record",
        });
        return;
    }

    let mut organisations = BTreeSet::new();
    let raw_ids = organisation_id_raw
        .into_iter()
        .chain(payload_organisations(source, &payload));
    for raw in raw_ids {
        match normalize_org_id(&raw) {
            Ok(org) => {
                organisations.insert(org);
            }
            Err(err) => {
                outcome.diagnostics.record_error(&err);
            }
        }
    }

    let dataset = outcome
        .datasets
        .entry(doi.clone())
        .or_insert_with(|| MergedDataset::new(doi));
    dataset.sources.insert(source);
    dataset.organisation_ids.extend(organisations);
    if dataset.records.set(source, payload).is_some() {
        tracing::debug!(doi = %dataset.doi, %source, "replacing earlier payload");
        outcome.summary.intra_source_duplicates.bump(source);
    }
}

fn payload_organisations(source: Source, payload: &Value) -> Vec<String> {
    let mut ids = providers::dataset_organisations(source, payload);
    ids.extend(
        providers::authors(source, payload)
            .into_iter()
            .flat_map(|author| author.organisations),
    );
    ids
}

fn summarize(datasets: &BTreeMap<Doi, MergedDataset>, mut summary: MergeSummary) -> MergeSummary {
    summary.unique_by_source = SourceCounts::default();
    summary.unique_doi = datasets.len();
    summary.overlap_doi = 0;
    for dataset in datasets.values() {
        for source in &dataset.sources {
            summary.unique_by_source.bump(*source);
        }
        if dataset.sources.len() > 1 {
            summary.overlap_doi += 1;
        }
    }
    summary
}

pub fn index<I>(datasets: I) -> BTreeMap<Doi, MergedDataset>
where
    I: IntoIterator<Item = MergedDataset>,
{
    datasets
        .into_iter()
        .map(|dataset| (dataset.doi.clone(), dataset))
        .collect()
}

pub fn organisation_universe<'a, I>(datasets: I) -> BTreeSet<OrgId>
where
    I: IntoIterator<Item = &'a MergedDataset>,
{
    datasets
        .into_iter()
        .flat_map(|dataset| dataset.organisation_ids.iter().cloned())
        .collect()
}
