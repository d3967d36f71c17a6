use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::domain::{PersonKey, Source, normalize_person};
use crate::error::StatsError;
use crate::institutions::percent;
use crate::providers::{self, LicenseRef, crossref, datacite};
use crate::record::MergedDataset;
use crate::store::Table;

/// Substrings that mark a licence as open, matched case-insensitively
/// against the URI, identifier and free-text rights of a declaration.
pub const OPEN_LICENSE_TOKENS: [&str; 10] = [
    "creativecommons.org",
    "cc-by",
    "cc by",
    "cc0",
    "publicdomain",
    "public domain",
    "pddl",
    "odbl",
    "odc-by",
    "opendatacommons.org",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LicenseClass {
    Open,
    NonOpenWithLicense,
    NoLicense,
}

impl LicenseClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseClass::Open => "open",
            LicenseClass::NonOpenWithLicense => "non-open-with-license",
            LicenseClass::NoLicense => "no-license",
        }
    }
}

impl fmt::Display for LicenseClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicensePolicy {
    tokens: Vec<String>,
}

impl Default for LicensePolicy {
    fn default() -> Self {
        Self {
            tokens: OPEN_LICENSE_TOKENS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl LicensePolicy {
    pub fn with_extra<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut policy = Self::default();
        for token in extra {
            let token = token.as_ref().trim().to_lowercase();
            if !token.is_empty() && !policy.tokens.contains(&token) {
                policy.tokens.push(token);
            }
        }
        policy
    }

    pub fn is_open(&self, license: &LicenseRef) -> bool {
        let text = [&license.uri, &license.identifier, &license.rights]
            .into_iter()
            .flatten()
            .map(|part| part.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        self.tokens.iter().any(|token| text.contains(token.as_str()))
    }

    pub fn classify(&self, dataset: &MergedDataset) -> LicenseClass {
        let declared = declared_licenses(dataset);
        if declared.is_empty() {
            LicenseClass::NoLicense
        } else if declared.iter().any(|license| self.is_open(license)) {
            LicenseClass::Open
        } else {
            LicenseClass::NonOpenWithLicense
        }
    }
}

pub fn declared_licenses(dataset: &MergedDataset) -> Vec<LicenseRef> {
    let rights = dataset.datacite().map(datacite::rights).unwrap_or_default();
    if !rights.is_empty() {
        return rights;
    }
    dataset.crossref().map(crossref::licenses).unwrap_or_default()
}

pub fn dataset_year(dataset: &MergedDataset) -> Option<i32> {
    dataset
        .datacite()
        .and_then(datacite::publication_year)
        .or_else(|| dataset.crossref().and_then(crossref::issued_year))
}

pub fn dataset_persons(dataset: &MergedDataset) -> BTreeSet<PersonKey> {
    dataset
        .records
        .iter()
        .flat_map(|(source, payload)| providers::authors(source, payload))
        .filter_map(|author| {
            normalize_person(
                author.orcid.as_deref(),
                author.family.as_deref(),
                author.given.as_deref(),
                author.name.as_deref(),
            )
            .ok()
        })
        .map(|resolution| resolution.key)
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct YearCounts {
    pub total: usize,
    pub datacite: usize,
    pub crossref: usize,
}

impl YearCounts {
    fn add(&mut self, dataset: &MergedDataset) {
        self.total += 1;
        if dataset.has_source(Source::Datacite) {
            self.datacite += 1;
        }
        if dataset.has_source(Source::Crossref) {
            self.crossref += 1;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Timeline {
    pub years: BTreeMap<i32, YearCounts>,
    pub unknown: YearCounts,
}

impl Timeline {
    pub fn to_table(&self) -> Table {
        let mut table = Table::new(vec!["year", "total", "datacite", "crossref"]);
        let rows = self
            .years
            .iter()
            .map(|(year, counts)| (year.to_string(), counts))
            .chain((self.unknown.total > 0).then(|| ("unknown".to_string(), &self.unknown)));
        for (year, counts) in rows {
            table.push(vec![
                year,
                counts.total.to_string(),
                counts.datacite.to_string(),
                counts.crossref.to_string(),
            ]);
        }
        table
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrcidCoverage {
    pub datasets_total: usize,
    pub datasets_with_orcid: usize,
    pub datasets_with_orcid_pct: f64,
    pub persons_total: usize,
    pub persons_with_orcid: usize,
    pub persons_with_orcid_pct: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LicenseSummary {
    pub open: usize,
    #[serde(rename = "non-open-with-license")]
    pub non_open_with_license: usize,
    #[serde(rename = "no-license")]
    pub no_license: usize,
}

impl LicenseSummary {
    fn add(&mut self, class: LicenseClass) {
        match class {
            LicenseClass::Open => self.open += 1,
            LicenseClass::NonOpenWithLicense => self.non_open_with_license += 1,
            LicenseClass::NoLicense => self.no_license += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LicenseKey {
    pub source: Source,
    pub license: LicenseRef,
    pub is_open: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DataciteRepo {
    pub client_id: String,
    pub publisher: String,
    pub resource_type_general: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct CrossrefRepo {
    pub member: String,
    pub publisher: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatRow {
    pub doi: String,
    pub sources: String,
    pub organisation_ids: String,
    pub year: Option<i32>,
    pub datacite_client_id: Option<String>,
    pub datacite_publisher: Option<String>,
    pub datacite_resource_type: Option<String>,
    pub datacite_title: Option<String>,
    pub licenses: String,
    pub license_class: String,
    pub crossref_member: Option<String>,
    pub crossref_publisher: Option<String>,
    pub crossref_year: Option<i32>,
    pub crossref_title: Option<String>,
    pub authors_total: usize,
    pub authors_with_orcid: usize,
}

const FLAT_HEADER: [&str; 16] = [
    "doi",
    "sources",
    "organisationIds",
    "year",
    "datacite_client_id",
    "datacite_publisher",
    "datacite_resourceTypeGeneral",
    "datacite_title",
    "licenses",
    "license_class",
    "crossref_member",
    "crossref_publisher",
    "crossref_year",
    "crossref_title",
    "n_authors_total",
    "n_authors_with_orcid",
];

impl FlatRow {
    fn cells(&self) -> Vec<String> {
        let opt = |value: &Option<String>| value.clone().unwrap_or_default();
        let year = |value: Option<i32>| value.map(|y| y.to_string()).unwrap_or_default();
        vec![
            self.doi.clone(),
            self.sources.clone(),
            self.organisation_ids.clone(),
            year(self.year),
            opt(&self.datacite_client_id),
            opt(&self.datacite_publisher),
            opt(&self.datacite_resource_type),
            opt(&self.datacite_title),
            self.licenses.clone(),
            self.license_class.clone(),
            opt(&self.crossref_member),
            opt(&self.crossref_publisher),
            year(self.crossref_year),
            opt(&self.crossref_title),
            self.authors_total.to_string(),
            self.authors_with_orcid.to_string(),
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub timeline: Timeline,
    pub coverage: OrcidCoverage,
    pub license_summary: LicenseSummary,
    pub licenses: BTreeMap<LicenseKey, usize>,
    pub repos_datacite: BTreeMap<DataciteRepo, usize>,
    pub repos_crossref: BTreeMap<CrossrefRepo, usize>,
    pub funders_datacite: BTreeMap<datacite::Funder, usize>,
    pub funders_crossref: BTreeMap<crossref::Funder, usize>,
    pub flat: Vec<FlatRow>,
}

pub fn analyze<'a, I>(datasets: I, policy: &LicensePolicy, diagnostics: &mut Diagnostics) -> Analysis
where
    I: IntoIterator<Item = &'a MergedDataset>,
{
    let mut analysis = Analysis::default();
    let mut persons = BTreeSet::new();

    for dataset in datasets {
        analysis.coverage.datasets_total += 1;

        let year = dataset_year(dataset);
        match year {
            Some(year) => analysis.timeline.years.entry(year).or_default().add(dataset),
            None => {
                analysis.timeline.unknown.add(dataset);
                diagnostics.record_error(&StatsError::SchemaMismatch {
                    doi: dataset.doi.to_string(),
                    field: "year",
                });
            }
        }

        let class = policy.classify(dataset);
        analysis.license_summary.add(class);
        for (source, license) in all_licenses(dataset) {
            let is_open = policy.is_open(&license);
            *analysis
                .licenses
                .entry(LicenseKey {
                    source,
                    license,
                    is_open,
                })
                .or_default() += 1;
        }

        let mut row = FlatRow {
            doi: dataset.doi.to_string(),
            sources: join(dataset.sources.iter().map(Source::as_str)),
            organisation_ids: join(dataset.organisation_ids.iter().map(|org| org.as_str())),
            year,
            licenses: join(declared_licenses(dataset).iter().filter_map(LicenseRef::label)),
            license_class: class.to_string(),
            ..FlatRow::default()
        };

        if let Some(payload) = dataset.datacite() {
            row.datacite_client_id = datacite::client_id(payload);
            row.datacite_publisher = datacite::publisher(payload);
            row.datacite_resource_type = datacite::resource_type_general(payload);
            row.datacite_title = datacite::title(payload);
            *analysis
                .repos_datacite
                .entry(DataciteRepo {
                    client_id: row.datacite_client_id.clone().unwrap_or_default(),
                    publisher: row.datacite_publisher.clone().unwrap_or_default(),
                    resource_type_general: row.datacite_resource_type.clone().unwrap_or_default(),
                })
                .or_default() += 1;
            for funder in datacite::funders(payload).into_iter().collect::<BTreeSet<_>>() {
                *analysis.funders_datacite.entry(funder).or_default() += 1;
            }
        }

        if let Some(payload) = dataset.crossref() {
            row.crossref_member = crossref::member(payload);
            row.crossref_publisher = crossref::publisher(payload);
            row.crossref_year = crossref::issued_year(payload);
            row.crossref_title = crossref::title(payload);
            *analysis
                .repos_crossref
                .entry(CrossrefRepo {
                    member: row.crossref_member.clone().unwrap_or_default(),
                    publisher: row.crossref_publisher.clone().unwrap_or_default(),
                })
                .or_default() += 1;
            for funder in crossref::funders(payload).into_iter().collect::<BTreeSet<_>>() {
                *analysis.funders_crossref.entry(funder).or_default() += 1;
            }
        }

        let dataset_persons = dataset_persons(dataset);
        let orcid_persons = dataset_persons.iter().filter(|p| p.is_orcid()).count();
        row.authors_total = dataset_persons.len();
        row.authors_with_orcid = orcid_persons;
        if orcid_persons > 0 {
            analysis.coverage.datasets_with_orcid += 1;
        }
        persons.extend(dataset_persons);

        analysis.flat.push(row);
    }

    let coverage = &mut analysis.coverage;
    coverage.persons_total = persons.len();
    coverage.persons_with_orcid = persons.iter().filter(|p| p.is_orcid()).count();
    coverage.datasets_with_orcid_pct = percent(coverage.datasets_with_orcid, coverage.datasets_total);
    coverage.persons_with_orcid_pct = percent(coverage.persons_with_orcid, coverage.persons_total);

    tracing::info!(
        datasets = coverage.datasets_total,
        persons = coverage.persons_total,
        unknown_year = analysis.timeline.unknown.total,
        "analysed merged datasets"
    );
    analysis
}

fn all_licenses(dataset: &MergedDataset) -> BTreeSet<(Source, LicenseRef)> {
    let mut licenses = BTreeSet::new();
    if let Some(payload) = dataset.datacite() {
        licenses.extend(datacite::rights(payload).into_iter().map(|l| (Source::Datacite, l)));
    }
    if let Some(payload) = dataset.crossref() {
        licenses.extend(crossref::licenses(payload).into_iter().map(|l| (Source::Crossref, l)));
    }
    licenses
}

fn join<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    parts.into_iter().collect::<Vec<_>>().join(";")
}

fn by_count<K: Ord>(counts: &BTreeMap<K, usize>) -> Vec<(&K, usize)> {
    let mut rows = counts.iter().map(|(key, count)| (key, *count)).collect::<Vec<_>>();
    rows.sort_by(|(a_key, a), (b_key, b)| b.cmp(a).then_with(|| a_key.cmp(b_key)));
    rows
}

impl Analysis {
    pub fn licenses_table(&self) -> Table {
        let mut table = Table::new(vec![
            "source",
            "uri",
            "identifier",
            "rights",
            "is_open",
            "dataset_count",
        ]);
        for (key, count) in by_count(&self.licenses) {
            table.push(vec![
                key.source.to_string(),
                key.license.uri.clone().unwrap_or_default(),
                key.license.identifier.clone().unwrap_or_default(),
                key.license.rights.clone().unwrap_or_default(),
                u8::from(key.is_open).to_string(),
                count.to_string(),
            ]);
        }
        table
    }

    pub fn repos_datacite_table(&self) -> Table {
        let mut table = Table::new(vec![
            "client_id",
            "publisher",
            "resourceTypeGeneral",
            "dataset_count",
        ]);
        for (repo, count) in by_count(&self.repos_datacite) {
            table.push(vec![
                repo.client_id.clone(),
                repo.publisher.clone(),
                repo.resource_type_general.clone(),
                count.to_string(),
            ]);
        }
        table
    }

    pub fn repos_crossref_table(&self) -> Table {
        let mut table = Table::new(vec!["member", "publisher", "dataset_count"]);
        for (repo, count) in by_count(&self.repos_crossref) {
            table.push(vec![repo.member.clone(), repo.publisher.clone(), count.to_string()]);
        }
        table
    }

    pub fn funders_datacite_table(&self) -> Table {
        let mut table = Table::new(vec![
            "funderIdentifier",
            "funderIdentifierType",
            "funderName",
            "dataset_count",
        ]);
        for (funder, count) in by_count(&self.funders_datacite) {
            table.push(vec![
                funder.identifier.clone(),
                funder.identifier_type.clone(),
                funder.name.clone(),
                count.to_string(),
            ]);
        }
        table
    }

    pub fn funders_crossref_table(&self) -> Table {
        let mut table = Table::new(vec!["funderDOI", "funderName", "dataset_count"]);
        for (funder, count) in by_count(&self.funders_crossref) {
            table.push(vec![funder.doi.clone(), funder.name.clone(), count.to_string()]);
        }
        table
    }

    pub fn flat_table(&self) -> Table {
        let mut table = Table::new(FLAT_HEADER.to_vec());
        for row in &self.flat {
            table.push(row.cells());
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn with_datacite(attributes: serde_json::Value) -> MergedDataset {
        let mut dataset = MergedDataset::new("10.1/x".parse().unwrap());
        dataset.sources.insert(Source::Datacite);
        dataset
            .records
            .set(Source::Datacite, json!({ "attributes": attributes }));
        dataset
    }

    #[test]
    fn extra_tokens_extend_builtins() {
        let policy = LicensePolicy::with_extra(["  Etalab "]);
        let license = LicenseRef {
            rights: Some("Licence Ouverte / Etalab 2.0".to_string()),
            ..LicenseRef::default()
        };
        assert!(policy.is_open(&license));
        assert!(!LicensePolicy::default().is_open(&license));
    }

    #[test]
    fn any_open_declaration_wins() {
        let dataset = with_datacite(json!({
            "rightsList": [
                {"rights": "Restricted access"},
                {"rightsIdentifier": "CC0-1.0"}
            ]
        }));
        assert_eq!(LicensePolicy::default().classify(&dataset), LicenseClass::Open);
    }

    #[test]
    fn datacite_rights_preferred_over_crossref_license() {
        let mut dataset = with_datacite(json!({"rightsList": [{"rights": "All rights reserved"}]}));
        dataset.sources.insert(Source::Crossref);
        dataset.records.set(
            Source::Crossref,
            json!({"license": [{"URL": "https://creativecommons.org/licenses/by/4.0/"}]}),
        );
        assert_eq!(
            LicensePolicy::default().classify(&dataset),
            LicenseClass::NonOpenWithLicense
        );
    }

    #[test]
    fn timeline_counts_unknown_years() {
        let dated = with_datacite(json!({"publicationYear": "2021"}));
        let undated = with_datacite(json!({}));
        let mut diagnostics = Diagnostics::default();
        let analysis = analyze([&dated, &undated], &LicensePolicy::default(), &mut diagnostics);

        assert_eq!(analysis.timeline.years[&2021].total, 1);
        assert_eq!(analysis.timeline.unknown.total, 1);
        assert_eq!(
            diagnostics.count(crate::diagnostics::SkipReason::MissingYear),
            1
        );
        let table = analysis.timeline.to_table();
        assert_eq!(table.rows.last().unwrap()[0], "unknown");
    }
}
