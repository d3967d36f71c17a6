use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Doi, OrgId, Source};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub source: Source,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(rename = "ror_id", default)]
    pub organisation_id_raw: Option<String>,
    #[serde(rename = "record", default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Records {
    #[serde(default)]
    pub datacite: Option<Value>,
    #[serde(default)]
    pub crossref: Option<Value>,
}

impl Records {
    pub fn get(&self, source: Source) -> Option<&Value> {
        match source {
            Source::Datacite => self.datacite.as_ref(),
            Source::Crossref => self.crossref.as_ref(),
        }
    }

    pub fn set(&mut self, source: Source, payload: Value) -> Option<Value> {
        let slot = match source {
            Source::Datacite => &mut self.datacite,
            Source::Crossref => &mut self.crossref,
        };
        slot.replace(payload)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Source, &Value)> + '_ {
        Source::ALL
            .into_iter()
            .filter_map(|source| self.get(source).map(|payload| (source, payload)))
    }

    pub fn populated(&self) -> BTreeSet<Source> {
        self.iter().map(|(source, _)| source).collect()
    }
}

/// The deduplicated unit of analysis.
///
/// This is the persisted contract of `datasets_dedup.jsonl`; field names
/// and order must stay stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedDataset {
    pub doi: Doi,
    pub sources: BTreeSet<Source>,
    #[serde(rename = "organisationIds", default)]
    pub organisation_ids: BTreeSet<OrgId>,
    #[serde(default)]
    pub records: Records,
}

impl MergedDataset {
    pub fn new(doi: Doi) -> Self {
        Self {
            doi,
            sources: BTreeSet::new(),
            organisation_ids: BTreeSet::new(),
            records: Records::default(),
        }
    }

    pub fn payload(&self, source: Source) -> Option<&Value> {
        self.records.get(source)
    }

    pub fn datacite(&self) -> Option<&Value> {
        self.records.datacite.as_ref()
    }

    pub fn crossref(&self) -> Option<&Value> {
        self.records.crossref.as_ref()
    }

    pub fn has_source(&self, source: Source) -> bool {
        self.sources.contains(&source)
    }
}
