use std::fs::{self, File};
use std::io::Write;

use assert_matches::assert_matches;
use flate2::Compression;
use flate2::write::GzEncoder;

use cz_dataset_stats::app::read_raw_records;
use cz_dataset_stats::diagnostics::{Diagnostics, SkipReason};
use cz_dataset_stats::domain::Source;
use cz_dataset_stats::error::StatsError;
use cz_dataset_stats::record::RawRecord;
use cz_dataset_stats::store::{JsonLines, OutputDir, Table, TableFormat};

#[test]
fn reads_gzip_jsonl() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("datacite.jsonl.gz");
    let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
    writeln!(
        encoder,
        r#"{{"source":"datacite","doi":"10.1/A","ror_id":"024d6js02","record":{{}}}}"#
    )
    .unwrap();
    writeln!(encoder, r#"{{"source":"datacite","doi":"10.1/B"}}"#).unwrap();
    encoder.finish().unwrap();

    let records = JsonLines::<RawRecord>::open(&path)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].doi.as_deref(), Some("10.1/B"));
    assert!(records[1].payload.is_null());
}

#[test]
fn missing_input() {
    let temp = tempfile::tempdir().unwrap();
    let result = JsonLines::<RawRecord>::open(&temp.path().join("nope.jsonl"));
    assert_matches!(result, Err(StatsError::InputNotFound(_)));
}

#[test]
fn csv_quotes_and_tsv_does_not() {
    let temp = tempfile::tempdir().unwrap();
    let out = OutputDir::from_path(&temp.path().join("nested")).unwrap();
    let mut table = Table::new(vec!["doi", "title"]);
    table.push(vec!["10.1/a".to_string(), "Soil, water".to_string()]);

    let csv = out.write_table("flat.csv", &table, TableFormat::Csv).unwrap();
    let tsv = out.write_table("flat.tsv", &table, TableFormat::Tsv).unwrap();

    assert_eq!(
        fs::read_to_string(csv.as_std_path()).unwrap(),
        "doi,title\n10.1/a,\"Soil, water\"\n"
    );
    assert_eq!(
        fs::read_to_string(tsv.as_std_path()).unwrap(),
        "doi\ttitle\n10.1/a\tSoil, water\n"
    );
}

#[test]
fn invalid_utf8_line_is_skipped() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("datacite.jsonl");
    let mut body = Vec::new();
    body.extend_from_slice(br#"{"source":"datacite","doi":"10.1/a","record":{}}"#);
    body.extend_from_slice(b"\n{\"source\":\"datacite\",\"doi\":\"10.1/\xff\"}\n");
    body.extend_from_slice(br#"{"source":"datacite","doi":"10.1/c","record":{}}"#);
    body.push(b'\n');
    fs::write(&path, body).unwrap();

    let items = JsonLines::<RawRecord>::open(&path)
        .unwrap()
        .collect::<Vec<_>>();
    assert_eq!(items.len(), 3);
    assert_matches!(&items[1], Err(StatsError::MalformedRecord { line: 2, .. }));
    assert_eq!(items[2].as_ref().unwrap().doi.as_deref(), Some("10.1/c"));

    let mut diagnostics = Diagnostics::default();
    let records = read_raw_records(&path, Source::Datacite, &mut diagnostics).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(diagnostics.count(SkipReason::MalformedLine), 1);
}
