use std::fs;
use std::path::Path;

use serde_json::{Value, json};

use cz_dataset_stats::app::{
    AnalyzeOptions, App, CollapseOptions, DedupOptions, INSTITUTIONS_FILE, SUMMARY_FILE,
    read_merged,
};
use cz_dataset_stats::config::ResolvedConfig;
use cz_dataset_stats::diagnostics::Diagnostics;
use cz_dataset_stats::output::JsonOutput;

fn write_jsonl(path: &Path, lines: &[Value]) {
    let body = lines
        .iter()
        .map(|line| line.to_string())
        .collect::<Vec<_>>()
        .join("\n");
    fs::write(path, body + "\n").unwrap();
}

fn ror(id: &str, name: &str, country: &str) -> Value {
    json!({
        "id": format!("https://ror.org/{id}"),
        "names": [{"value": name, "types": ["ror_display", "label"]}],
        "locations": [{"geonames_details": {"country_code": country}}]
    })
}

struct Fixture {
    _temp: tempfile::TempDir,
    datacite: std::path::PathBuf,
    crossref: std::path::PathBuf,
    ror_dump: std::path::PathBuf,
    root: std::path::PathBuf,
}

fn fixture() -> Fixture {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path().to_path_buf();
    let datacite = root.join("datacite.jsonl");
    let crossref = root.join("crossref.jsonl");
    let ror_dump = root.join("ror.json");

    write_jsonl(
        &datacite,
        &[json!({
            "source": "datacite",
            "doi": "10.48700/DATACZ.1",
            "ror_id": "https://ror.org/024d6js02",
            "record": {
                "attributes": {
                    "publicationYear": 2021,
                    "creators": [{
                        "familyName": "Nová",
                        "givenName": "Eva",
                        "nameIdentifiers": [{"nameIdentifier": "https://orcid.org/0000-0002-1825-0097", "nameIdentifierScheme": "ORCID"}],
                        "affiliation": [{"name": "Charles University", "affiliationIdentifier": "https://ror.org/024d6js02", "affiliationIdentifierScheme": "ROR"}]
                    }],
                    "rightsList": [{"rightsUri": "https://creativecommons.org/licenses/by/4.0/"}]
                }
            }
        })],
    );
    write_jsonl(
        &crossref,
        &[
            json!({
                "source": "crossref",
                "doi": "https://doi.org/10.48700/datacz.1",
                "ror_id": "024d6js02",
                "record": {
                    "author": [{
                        "family": "Nová",
                        "given": "Eva",
                        "ORCID": "http://orcid.org/0000-0002-1825-0097",
                        "affiliation": [{"name": "Charles University", "id": [{"id": "https://ror.org/024d6js02", "id-type": "ROR"}]}]
                    }]
                }
            }),
            json!({
                "source": "crossref",
                "doi": "10.1234/cr.2",
                "ror_id": "02j46qs45",
                "record": {
                    "issued": {"date-parts": [[2020]]},
                    "author": [{
                        "family": "Malý",
                        "given": "Jan",
                        "affiliation": [{"name": "Masaryk University", "id": [{"id": "https://ror.org/02j46qs45", "id-type": "ROR"}]}]
                    }]
                }
            }),
        ],
    );
    fs::write(
        &ror_dump,
        serde_json::to_string(&json!([
            ror("024d6js02", "Charles University", "CZ"),
            ror("02j46qs45", "Masaryk University", "CZ"),
            ror("05x2bcf33", "Technische Universität München", "DE")
        ]))
        .unwrap(),
    )
    .unwrap();

    Fixture {
        _temp: temp,
        datacite,
        crossref,
        ror_dump,
        root,
    }
}

fn dedup_options(fixture: &Fixture) -> DedupOptions {
    DedupOptions {
        datacite: vec![fixture.datacite.clone()],
        crossref: vec![fixture.crossref.clone()],
        ror_dump: Some(fixture.ror_dump.clone()),
        out_dir: fixture.root.join("processed"),
    }
}

#[test]
fn dedup_writes_all_outputs() {
    let fixture = fixture();
    let app = App::new(ResolvedConfig::default());
    let options = dedup_options(&fixture);

    let result = app.dedup(&options, &JsonOutput).unwrap();
    assert!(result.is_complete());
    assert_eq!(result.summary.unique_doi, 2);
    assert_eq!(result.summary.overlap_doi, 1);
    assert_eq!(result.summary.institution_count, Some(2));
    assert_eq!(result.outputs.len(), 3);

    let institutions = fs::read_to_string(options.out_dir.join(INSTITUTIONS_FILE)).unwrap();
    assert_eq!(
        institutions,
        "organisationId\tname\tdatasetCount\tauthorCount\n\
         https://ror.org/024d6js02\tCharles University\t1\t1\n\
         https://ror.org/02j46qs45\tMasaryk University\t1\t1\n"
    );

    let summary: Value =
        serde_json::from_str(&fs::read_to_string(options.out_dir.join(SUMMARY_FILE)).unwrap())
            .unwrap();
    assert_eq!(summary["unique_doi"], 2);
    assert_eq!(summary["raw_counts"]["crossref"], 2);
}

#[test]
fn directory_failure_keeps_merged_outputs() {
    let fixture = fixture();
    let app = App::new(ResolvedConfig::default());
    let options = DedupOptions {
        ror_dump: Some(fixture.root.join("missing-ror.json")),
        ..dedup_options(&fixture)
    };

    let result = app.dedup(&options, &JsonOutput).unwrap();
    assert!(!result.is_complete());
    assert_eq!(result.skipped_outputs.len(), 1);
    assert!(result.skipped_outputs[0].output.ends_with(INSTITUTIONS_FILE));
    assert_eq!(result.summary.institution_count, None);

    assert!(options.out_dir.join("datasets_dedup.jsonl").exists());
    assert!(options.out_dir.join(SUMMARY_FILE).exists());
    assert!(!options.out_dir.join(INSTITUTIONS_FILE).exists());
}

#[test]
fn analyze_after_dedup() {
    let fixture = fixture();
    let app = App::new(ResolvedConfig::default());
    let dedup = dedup_options(&fixture);
    app.dedup(&dedup, &JsonOutput).unwrap();

    let options = AnalyzeOptions {
        dedup: dedup.out_dir.join("datasets_dedup.jsonl"),
        out_dir: fixture.root.join("analysis"),
        ror_dump: Some(fixture.ror_dump.clone()),
        institutions_out: Some(fixture.root.join("reports/institutions.tsv")),
    };
    let result = app.analyze(&options, &JsonOutput).unwrap();
    assert!(result.is_complete());
    assert_eq!(result.datasets, 2);
    assert_eq!(result.unknown_year, 0);
    assert_eq!(result.institutions, Some(2));
    assert_eq!(result.licenses.open, 1);
    assert_eq!(result.coverage.persons_with_orcid, 1);

    let timeline = fs::read_to_string(options.out_dir.join("timeline.tsv")).unwrap();
    assert!(timeline.contains("2020\t"));
    assert!(timeline.contains("2021\t"));
    assert!(!timeline.contains("unknown"));

    let orcid = fs::read_to_string(options.out_dir.join("orcid_by_institution.tsv")).unwrap();
    assert!(orcid.contains("https://ror.org/024d6js02\tCharles University\t1\t1\t1\t100.0"));
    assert!(fixture.root.join("reports/institutions.tsv").exists());
    assert!(options.out_dir.join("datasets_flat.csv").exists());
}

#[test]
fn collapse_drops_linked_versions() {
    let fixture = fixture();
    let input = fixture.root.join("merged.jsonl");
    let related = |relation: &str, target: &str| {
        json!([{"relationType": relation, "relatedIdentifierType": "DOI", "relatedIdentifier": target}])
    };
    let merged = |doi: &str, related: Value| {
        json!({
            "doi": doi,
            "sources": ["datacite"],
            "organisationIds": [],
            "records": {
                "datacite": {"attributes": {"relatedIdentifiers": related}},
                "crossref": null
            }
        })
    };
    write_jsonl(
        &input,
        &[
            merged("10.5281/zenodo.200", related("HasVersion", "10.5281/zenodo.201")),
            merged("10.5281/zenodo.201", related("IsVersionOf", "10.5281/zenodo.200")),
            merged("10.1234/other", json!([])),
        ],
    );

    let options = CollapseOptions {
        input,
        output: fixture.root.join("collapsed/datasets.jsonl"),
        log: Some(fixture.root.join("collapsed/log.tsv")),
    };
    let app = App::new(ResolvedConfig::default());
    let result = app.collapse_zenodo(&options, &JsonOutput).unwrap();
    assert_eq!(result.input_records, 3);
    assert_eq!(result.dropped_versions, 1);
    assert_eq!(result.output_records, 2);

    let mut diagnostics = Diagnostics::default();
    let collapsed = read_merged(&options.output, &mut diagnostics).unwrap();
    assert!(diagnostics.is_empty());
    assert_eq!(
        collapsed.keys().map(|doi| doi.as_str()).collect::<Vec<_>>(),
        vec!["10.1234/other", "10.5281/zenodo.200"]
    );

    let log = fs::read_to_string(fixture.root.join("collapsed/log.tsv")).unwrap();
    assert!(log.contains("drop_version\t10.5281/zenodo.200\t10.5281/zenodo.201"));
}
