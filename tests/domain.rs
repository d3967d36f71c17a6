use std::str::FromStr;

use assert_matches::assert_matches;

use cz_dataset_stats::domain::{Doi, OrgId, Source, normalize_name, normalize_person};
use cz_dataset_stats::error::{IdentifierKind, StatsError};

#[test]
fn parse_source() {
    assert_eq!(Source::from_str("DataCite").unwrap(), Source::Datacite);
    assert_eq!(Source::from_str(" crossref ").unwrap(), Source::Crossref);
    assert_matches!(Source::from_str("openaire"), Err(StatsError::InvalidSource(_)));
}

#[test]
fn doi_serde_normalizes() {
    let doi: Doi = serde_json::from_str("\"https://doi.org/10.5281/ZENODO.42\"").unwrap();
    assert_eq!(doi.as_str(), "10.5281/zenodo.42");
    assert_eq!(serde_json::to_string(&doi).unwrap(), "\"10.5281/zenodo.42\"");
    assert!(serde_json::from_str::<Doi>("\"doi:\"").is_err());
}

#[test]
fn org_id_canonical_form() {
    let org = OrgId::from_str("  https://ror.org/00ABC123/ ").unwrap();
    assert_eq!(org.as_str(), "https://ror.org/00abc123");
    assert_eq!(org.code(), "00abc123");
    assert_matches!(
        OrgId::from_str(""),
        Err(StatsError::InvalidIdentifier {
            kind: IdentifierKind::Organisation,
            ..
        })
    );
}

#[test]
fn name_key_forms() {
    assert_eq!(
        normalize_name(Some("Smith"), None, None).as_deref(),
        Some("smith")
    );
    assert_eq!(
        normalize_name(None, None, Some(" Czech Academy of Sciences ")).as_deref(),
        Some("czech academy of sciences")
    );
    assert_eq!(normalize_name(Some(" "), Some(""), None), None);
}

#[test]
fn orcid_with_spaces() {
    let resolved = normalize_person(Some("0000 0001 2345 6789"), None, None, None).unwrap();
    assert_eq!(resolved.key.as_str(), "orcid:0000-0001-2345-6789");
}

#[test]
fn same_name_same_key() {
    let a = normalize_person(None, Some("Novák"), Some("Jan"), None).unwrap();
    let b = normalize_person(None, Some("NOVÁK "), Some(" jan"), None).unwrap();
    assert_eq!(a.key, b.key);
    assert!(!a.key.is_orcid());
}
