use std::io::Cursor;

use assert_matches::assert_matches;
use serde_json::json;

use cz_dataset_stats::directory::Directory;
use cz_dataset_stats::domain::OrgId;
use cz_dataset_stats::error::StatsError;

fn dump() -> String {
    json!([
        {
            "id": "https://ror.org/024d6js02",
            "names": [
                {"value": "Univerzita Karlova", "types": ["label"]},
                {"value": "Charles University", "types": ["ror_display"]},
                {"value": "CUNI", "types": ["acronym"]}
            ],
            "locations": [{"geonames_details": {"country_code": "CZ"}}]
        },
        {
            "id": "https://ror.org/05x2bcf33",
            "name": "Legacy Institute",
            "addresses": [{"country_code": "sk"}]
        },
        {
            "names": [{"value": "No id", "types": ["ror_display"]}],
            "locations": [{"geonames_details": {"country_code": "CZ"}}]
        }
    ])
    .to_string()
}

#[test]
fn country_filter() {
    let directory = Directory::from_reader(Cursor::new(dump()), Some("cz")).unwrap();
    assert_eq!(directory.len(), 1);

    let org: OrgId = "024d6js02".parse().unwrap();
    assert_eq!(directory.resolve(&org), Some("Charles University"));
    assert!(directory.get(&org).unwrap().aliases.contains(&"CUNI".to_string()));
}

#[test]
fn legacy_schema_without_filter() {
    let directory = Directory::from_reader(Cursor::new(dump()), None).unwrap();
    assert_eq!(directory.len(), 2);

    let legacy: OrgId = "05x2bcf33".parse().unwrap();
    assert_eq!(directory.resolve(&legacy), Some("Legacy Institute"));
    assert_eq!(
        directory.get(&legacy).unwrap().country_code.as_deref(),
        Some("SK")
    );

    let unknown: OrgId = "00abc123".parse().unwrap();
    assert_eq!(directory.display_name(&unknown), "https://ror.org/00abc123");
}

#[test]
fn load_failure_names_path() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("ror.json");
    std::fs::write(&path, "{not json").unwrap();
    assert_matches!(
        Directory::load(&path, None),
        Err(StatsError::DirectoryLoad { path: p, .. }) if p == path
    );
}
