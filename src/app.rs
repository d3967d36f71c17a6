use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::affiliation::{self, OrgFilter};
use crate::analysis::{self, LicensePolicy, LicenseSummary, OrcidCoverage};
use crate::config::ResolvedConfig;
use crate::diagnostics::{Diagnostics, SkipReason};
use crate::directory::Directory;
use crate::domain::{Doi, OrgId, Source};
use crate::error::StatsError;
use crate::institutions::{self, InstitutionStats};
use crate::merge::{self, MergeSummary};
use crate::record::{MergedDataset, RawRecord};
use crate::store::{JsonLines, OutputDir, TableFormat, utf8_path};
use crate::zenodo;

pub const DEDUP_FILE: &str = "datasets_dedup.jsonl";
pub const SUMMARY_FILE: &str = "summary_stats.json";
pub const INSTITUTIONS_FILE: &str = "institutions.tsv";

#[derive(Debug, Clone, Default)]
pub struct DedupOptions {
    pub datacite: Vec<PathBuf>,
    pub crossref: Vec<PathBuf>,
    pub ror_dump: Option<PathBuf>,
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub dedup: PathBuf,
    pub out_dir: PathBuf,
    pub ror_dump: Option<PathBuf>,
    pub institutions_out: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct CollapseOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub log: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedOutput {
    pub output: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DedupResult {
    pub generated_at: String,
    pub tool: String,
    pub summary: MergeSummary,
    pub outputs: Vec<String>,
    pub skipped_outputs: Vec<SkippedOutput>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResult {
    pub generated_at: String,
    pub tool: String,
    pub datasets: usize,
    pub unknown_year: usize,
    pub institutions: Option<usize>,
    pub coverage: OrcidCoverage,
    pub licenses: LicenseSummary,
    pub outputs: Vec<String>,
    pub skipped_outputs: Vec<SkippedOutput>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollapseResult {
    pub generated_at: String,
    pub tool: String,
    pub input_records: usize,
    pub concepts: usize,
    pub dropped_versions: usize,
    pub output_records: usize,
    pub outputs: Vec<String>,
    pub diagnostics: Diagnostics,
}

impl DedupResult {
    pub fn is_complete(&self) -> bool {
        self.skipped_outputs.is_empty()
    }
}

impl AnalyzeResult {
    pub fn is_complete(&self) -> bool {
        self.skipped_outputs.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

fn phase(sink: &dyn ProgressSink, message: String) {
    sink.event(ProgressEvent {
        message,
        elapsed: None,
    });
}

#[derive(Serialize)]
struct SummaryFile<'a> {
    #[serde(flatten)]
    summary: &'a MergeSummary,
    diagnostics: &'a Diagnostics,
}

#[derive(Debug, Clone, Default)]
pub struct App {
    config: ResolvedConfig,
}

impl App {
    pub fn new(config: ResolvedConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Merges the harvested per-source files and computes institution
    /// statistics.
    ///
    /// The merged dataset file and the summary are always written. The
    /// institutions table needs the organisation directory; when it cannot
    /// be loaded the table is listed in `skipped_outputs` instead.
    pub fn dedup(
        &self,
        options: &DedupOptions,
        sink: &dyn ProgressSink,
    ) -> Result<DedupResult, StatsError> {
        let start = Instant::now();
        let mut diagnostics = Diagnostics::default();
        let mut raw = Vec::new();
        for (source, paths) in [
            (Source::Datacite, &options.datacite),
            (Source::Crossref, &options.crossref),
        ] {
            for path in paths {
                phase(sink, format!("phase=Read; {source} {}", path.display()));
                raw.extend(read_raw_records(path, source, &mut diagnostics)?);
            }
        }

        phase(sink, format!("phase=Merge; {} raw records", raw.len()));
        let outcome = merge::merge(raw);
        diagnostics.merge(&outcome.diagnostics);
        let mut summary = outcome.summary;
        let datasets = outcome.datasets;

        let out = OutputDir::from_path(&options.out_dir)?;
        out.ensure()?;
        let mut outputs = Vec::new();
        let mut skipped_outputs = Vec::new();

        phase(sink, format!("phase=Store; writing {DEDUP_FILE}"));
        outputs.push(out.write_jsonl(DEDUP_FILE, datasets.values())?.to_string());

        let directory = match options.ror_dump.as_deref() {
            Some(path) => self.load_directory(path).map_err(|err| err.to_string()),
            None => Err("no organisation directory given".to_string()),
        };
        match directory {
            Ok(directory) => {
                phase(sink, "phase=Attribute; resolving author affiliations".to_string());
                let stats = self.institution_stats(&datasets, Some(&directory), &mut diagnostics);
                summary.institution_count = Some(count_active(&stats));
                let table = institutions::institutions_table(&stats, &directory);
                outputs.push(
                    out.write_table(INSTITUTIONS_FILE, &table, TableFormat::Tsv)?
                        .to_string(),
                );
            }
            Err(reason) => {
                tracing::warn!(%reason, "institutions table skipped");
                skipped_outputs.push(SkippedOutput {
                    output: out.path(INSTITUTIONS_FILE).to_string(),
                    reason,
                });
            }
        }

        let summary_file = SummaryFile {
            summary: &summary,
            diagnostics: &diagnostics,
        };
        outputs.push(out.write_json(SUMMARY_FILE, &summary_file)?.to_string());

        sink.event(ProgressEvent {
            message: format!("phase=Done; {} unique DOIs", summary.unique_doi),
            elapsed: Some(start.elapsed()),
        });

        Ok(DedupResult {
            generated_at: iso_timestamp(),
            tool: tool_version(),
            summary,
            outputs,
            skipped_outputs,
            diagnostics,
        })
    }

    pub fn analyze(
        &self,
        options: &AnalyzeOptions,
        sink: &dyn ProgressSink,
    ) -> Result<AnalyzeResult, StatsError> {
        let start = Instant::now();
        let mut diagnostics = Diagnostics::default();

        phase(sink, format!("phase=Read; {}", options.dedup.display()));
        let datasets = read_merged(&options.dedup, &mut diagnostics)?;

        phase(sink, format!("phase=Analyze; {} datasets", datasets.len()));
        let policy = LicensePolicy::with_extra(&self.config.open_license_tokens);
        let analysis = analysis::analyze(datasets.values(), &policy, &mut diagnostics);

        let out = OutputDir::from_path(&options.out_dir)?;
        out.ensure()?;
        let mut outputs = Vec::new();
        let mut skipped_outputs = Vec::new();

        phase(sink, "phase=Store; writing aggregates".to_string());
        outputs.push(
            out.write_table("timeline.tsv", &analysis.timeline.to_table(), TableFormat::Tsv)?
                .to_string(),
        );
        outputs.push(out.write_json("orcid_coverage.json", &analysis.coverage)?.to_string());
        outputs.push(
            out.write_json("license_dataset_summary.json", &analysis.license_summary)?
                .to_string(),
        );
        let tables = [
            ("licenses.tsv", analysis.licenses_table()),
            ("repos_datacite.tsv", analysis.repos_datacite_table()),
            ("repos_crossref.tsv", analysis.repos_crossref_table()),
            ("funders_datacite.tsv", analysis.funders_datacite_table()),
            ("funders_crossref.tsv", analysis.funders_crossref_table()),
        ];
        for (name, table) in &tables {
            outputs.push(out.write_table(name, table, TableFormat::Tsv)?.to_string());
        }
        outputs.push(
            out.write_table("datasets_flat.csv", &analysis.flat_table(), TableFormat::Csv)?
                .to_string(),
        );

        let mut institution_count = None;
        let orcid_path = out.path("orcid_by_institution.tsv");
        let directory = options
            .ror_dump
            .as_deref()
            .map(|path| self.load_directory(path))
            .transpose();
        match directory {
            Ok(directory) => {
                phase(sink, "phase=Attribute; resolving author affiliations".to_string());
                let stats =
                    self.institution_stats(&datasets, directory.as_ref(), &mut diagnostics);
                institution_count = Some(count_active(&stats));
                let names = directory.unwrap_or_default();
                outputs.push(
                    out.write_table(
                        "orcid_by_institution.tsv",
                        &institutions::orcid_table(&stats, &names),
                        TableFormat::Tsv,
                    )?
                    .to_string(),
                );
                if let Some(path) = &options.institutions_out {
                    outputs.push(write_institutions_to(path, &stats, &names)?);
                }
            }
            Err(err) => {
                tracing::warn!(%err, "institution tables skipped");
                skipped_outputs.push(SkippedOutput {
                    output: orcid_path.to_string(),
                    reason: err.to_string(),
                });
                if let Some(path) = &options.institutions_out {
                    skipped_outputs.push(SkippedOutput {
                        output: path.display().to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        sink.event(ProgressEvent {
            message: format!("phase=Done; {} datasets analysed", datasets.len()),
            elapsed: Some(start.elapsed()),
        });

        Ok(AnalyzeResult {
            generated_at: iso_timestamp(),
            tool: tool_version(),
            datasets: datasets.len(),
            unknown_year: analysis.timeline.unknown.total,
            institutions: institution_count,
            coverage: analysis.coverage,
            licenses: analysis.license_summary,
            outputs,
            skipped_outputs,
            diagnostics,
        })
    }

    pub fn collapse_zenodo(
        &self,
        options: &CollapseOptions,
        sink: &dyn ProgressSink,
    ) -> Result<CollapseResult, StatsError> {
        let start = Instant::now();
        let mut diagnostics = Diagnostics::default();

        phase(sink, format!("phase=Read; {}", options.input.display()));
        let mut datasets = read_merged(&options.input, &mut diagnostics)?;
        let input_records = datasets.len();

        phase(sink, "phase=Collapse; matching concept and version DOIs".to_string());
        let outcome = zenodo::plan(&datasets);
        zenodo::apply(&mut datasets, &outcome);

        let mut outputs = Vec::new();
        let output = utf8_path(&options.output)?;
        let out = output_dir_of(&output)?;
        let name = output.file_name().unwrap_or(DEDUP_FILE);
        outputs.push(out.write_jsonl(name, datasets.values())?.to_string());

        if let Some(log) = &options.log {
            let log = utf8_path(log)?;
            let log_dir = output_dir_of(&log)?;
            let name = log.file_name().unwrap_or("zenodo_collapse.tsv");
            outputs.push(
                log_dir
                    .write_table(name, &outcome.log_table(), TableFormat::Tsv)?
                    .to_string(),
            );
        }

        sink.event(ProgressEvent {
            message: format!("phase=Done; dropped {} versions", outcome.dropped.len()),
            elapsed: Some(start.elapsed()),
        });

        Ok(CollapseResult {
            generated_at: iso_timestamp(),
            tool: tool_version(),
            input_records,
            concepts: outcome.concepts.len(),
            dropped_versions: outcome.dropped.len(),
            output_records: datasets.len(),
            outputs,
            diagnostics,
        })
    }

    fn load_directory(&self, path: &Path) -> Result<Directory, StatsError> {
        Directory::load(path, self.config.country.as_deref())
    }

    fn institution_stats(
        &self,
        datasets: &BTreeMap<Doi, MergedDataset>,
        directory: Option<&Directory>,
        diagnostics: &mut Diagnostics,
    ) -> BTreeMap<OrgId, InstitutionStats> {
        let mut filter = OrgFilter::any();
        if let Some(directory) = directory {
            filter = filter.directory(directory);
        }
        if let Some(allow) = self.config.allow_set() {
            filter = filter.allow(allow);
        }
        let edges = affiliation::resolve_all(datasets.values(), &filter, diagnostics);
        institutions::aggregate(&edges)
    }
}

fn count_active(stats: &BTreeMap<OrgId, InstitutionStats>) -> usize {
    stats.values().filter(|s| s.dataset_count > 0).count()
}

fn output_dir_of(path: &camino::Utf8Path) -> Result<OutputDir, StatsError> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .map(|parent| parent.to_path_buf())
        .unwrap_or_else(|| camino::Utf8PathBuf::from("."));
    let dir = OutputDir::new(parent);
    dir.ensure()?;
    Ok(dir)
}

fn write_institutions_to(
    path: &Path,
    stats: &BTreeMap<OrgId, InstitutionStats>,
    directory: &Directory,
) -> Result<String, StatsError> {
    let path = utf8_path(path)?;
    let dir = output_dir_of(&path)?;
    let name = path.file_name().unwrap_or(INSTITUTIONS_FILE);
    let table = institutions::institutions_table(stats, directory);
    Ok(dir.write_table(name, &table, TableFormat::Tsv)?.to_string())
}

pub fn read_raw_records(
    path: &Path,
    expected: Source,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<RawRecord>, StatsError> {
    let mut records = Vec::new();
    for item in JsonLines::<RawRecord>::open(path)? {
        match item {
            Ok(record) if record.source == expected => records.push(record),
            Ok(record) => {
                tracing::debug!(
                    path = %path.display(),
                    found = %record.source,
                    %expected,
                    "record from another source"
                );
                diagnostics.record(SkipReason::SourceMismatch);
            }
            Err(err) if diagnostics.record_error(&err) => {}
            Err(err) => return Err(err),
        }
    }
    tracing::info!(path = %path.display(), %expected, records = records.len(), "read harvested records");
    Ok(records)
}

pub fn read_merged(
    path: &Path,
    diagnostics: &mut Diagnostics,
) -> Result<BTreeMap<Doi, MergedDataset>, StatsError> {
    let mut datasets = Vec::new();
    for item in JsonLines::<MergedDataset>::open(path)? {
        match item {
            Ok(dataset) => datasets.push(dataset),
            Err(err) if diagnostics.record_error(&err) => {}
            Err(err) => return Err(err),
        }
    }
    Ok(merge::index(datasets))
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn tool_version() -> String {
    format!("cz-ds/{}", env!("CARGO_PKG_VERSION"))
}
