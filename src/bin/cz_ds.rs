use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use cz_dataset_stats::app::{
    AnalyzeOptions, AnalyzeResult, App, CollapseOptions, CollapseResult, DedupOptions,
    DedupResult, SkippedOutput,
};
use cz_dataset_stats::config::{ConfigLoader, country_filter};
use cz_dataset_stats::diagnostics::Diagnostics;
use cz_dataset_stats::error::StatsError;
use cz_dataset_stats::output::{JsonOutput, LogSink, OutputMode};

/// Exit status of a run that finished but could not write every output.
const EXIT_INCOMPLETE: u8 = 4;

#[derive(Parser)]
#[command(name = "cz-ds")]
#[command(about = "Deduplicate and attribute Czech research dataset DOIs from DataCite and Crossref")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Config file (default: ./cz-ds.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Country filter for the organisation directory, `*` for all
    #[arg(long, global = true)]
    country: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Merge harvested records by DOI and compute institution stats")]
    Dedup(DedupArgs),
    #[command(about = "Compute timeline, ORCID, licence, repository and funder aggregates")]
    Analyze(AnalyzeArgs),
    #[command(about = "Drop Zenodo version DOIs whose concept DOI is present")]
    CollapseZenodo(CollapseArgs),
}

#[derive(Args)]
struct DedupArgs {
    /// DataCite JSONL file(s), plain or .gz
    #[arg(long, required = true, num_args = 1..)]
    datacite: Vec<PathBuf>,

    /// Crossref JSONL file(s), plain or .gz
    #[arg(long, required = true, num_args = 1..)]
    crossref: Vec<PathBuf>,

    /// ROR data dump used for institution names
    #[arg(long)]
    ror_dump: PathBuf,

    #[arg(long, default_value = "processed")]
    out_dir: PathBuf,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Merged dataset file written by `dedup`
    #[arg(long)]
    dedup: PathBuf,

    #[arg(long, default_value = "analysis")]
    out_dir: PathBuf,

    #[arg(long)]
    ror_dump: Option<PathBuf>,

    /// Additional institutions table path
    #[arg(long)]
    institutions_out: Option<PathBuf>,
}

#[derive(Args)]
struct CollapseArgs {
    #[arg(long)]
    input: PathBuf,

    #[arg(long)]
    output: PathBuf,

    /// TSV log of collapse decisions
    #[arg(long)]
    log: Option<PathBuf>,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(err) = report.downcast_ref::<StatsError>() {
                return ExitCode::from(map_exit_code(err));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &StatsError) -> u8 {
    match error {
        StatsError::InputNotFound(_)
        | StatsError::ConfigRead(_)
        | StatsError::ConfigParse(_)
        | StatsError::InvalidIdentifier { .. } => 2,
        StatsError::DirectoryLoad { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if cli.country.is_some() {
        config.country = country_filter(cli.country.as_deref());
    }
    let app = App::new(config);

    match cli.command {
        Commands::Dedup(args) => run_dedup(args, &app, output_mode),
        Commands::Analyze(args) => run_analyze(args, &app, output_mode),
        Commands::CollapseZenodo(args) => run_collapse(args, &app, output_mode),
    }
}

fn run_dedup(args: DedupArgs, app: &App, output_mode: OutputMode) -> miette::Result<ExitCode> {
    let options = DedupOptions {
        datacite: args.datacite,
        crossref: args.crossref,
        ror_dump: Some(args.ror_dump),
        out_dir: args.out_dir,
    };
    let result = match output_mode {
        OutputMode::NonInteractive => {
            let result = app.dedup(&options, &JsonOutput)?;
            JsonOutput::print_dedup(&result).into_diagnostic()?;
            result
        }
        OutputMode::Interactive => {
            let result = app.dedup(&options, &LogSink)?;
            print_dedup_summary(&result);
            result
        }
    };
    Ok(exit_status(result.is_complete()))
}

fn run_analyze(
    args: AnalyzeArgs,
    app: &App,
    output_mode: OutputMode,
) -> miette::Result<ExitCode> {
    let options = AnalyzeOptions {
        dedup: args.dedup,
        out_dir: args.out_dir,
        ror_dump: args.ror_dump,
        institutions_out: args.institutions_out,
    };
    let result = match output_mode {
        OutputMode::NonInteractive => {
            let result = app.analyze(&options, &JsonOutput)?;
            JsonOutput::print_analyze(&result).into_diagnostic()?;
            result
        }
        OutputMode::Interactive => {
            let result = app.analyze(&options, &LogSink)?;
            print_analyze_summary(&result);
            result
        }
    };
    Ok(exit_status(result.is_complete()))
}

fn run_collapse(
    args: CollapseArgs,
    app: &App,
    output_mode: OutputMode,
) -> miette::Result<ExitCode> {
    let options = CollapseOptions {
        input: args.input,
        output: args.output,
        log: args.log,
    };
    match output_mode {
        OutputMode::NonInteractive => {
            let result = app.collapse_zenodo(&options, &JsonOutput)?;
            JsonOutput::print_collapse(&result).into_diagnostic()?;
        }
        OutputMode::Interactive => {
            let result = app.collapse_zenodo(&options, &LogSink)?;
            print_collapse_summary(&result);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn exit_status(complete: bool) -> ExitCode {
    if complete {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_INCOMPLETE)
    }
}

const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RED: &str = "\x1b[31m";
const RESET: &str = "\x1b[0m";

fn print_dedup_summary(result: &DedupResult) {
    let summary = &result.summary;
    println!("{CYAN}cz-ds dedup summary{RESET}");
    println!(
        "{GREEN}raw records: datacite {}, crossref {}{RESET}",
        summary.raw_counts.datacite, summary.raw_counts.crossref
    );
    println!(
        "{GREEN}unique DOIs: {} (datacite {}, crossref {}, both {}){RESET}",
        summary.unique_doi,
        summary.unique_by_source.datacite,
        summary.unique_by_source.crossref,
        summary.overlap_doi
    );
    if summary.intra_source_duplicates.total() > 0 {
        println!(
            "{YELLOW}replaced duplicates: datacite {}, crossref {}{RESET}",
            summary.intra_source_duplicates.datacite, summary.intra_source_duplicates.crossref
        );
    }
    if let Some(count) = summary.institution_count {
        println!("{GREEN}institutions with datasets: {count}{RESET}");
    }
    print_outputs(&result.outputs, &result.skipped_outputs);
    print_diagnostics(&result.diagnostics);
}

fn print_analyze_summary(result: &AnalyzeResult) {
    println!("{CYAN}cz-ds analysis summary{RESET}");
    println!("{GREEN}datasets: {}{RESET}", result.datasets);
    if result.unknown_year > 0 {
        println!("{YELLOW}datasets without year: {}{RESET}", result.unknown_year);
    }
    println!(
        "{GREEN}with ORCID author: {} ({:.1}%){RESET}",
        result.coverage.datasets_with_orcid, result.coverage.datasets_with_orcid_pct
    );
    println!(
        "{GREEN}licences: open {}, other {}, none {}{RESET}",
        result.licenses.open, result.licenses.non_open_with_license, result.licenses.no_license
    );
    if let Some(count) = result.institutions {
        println!("{GREEN}institutions with datasets: {count}{RESET}");
    }
    print_outputs(&result.outputs, &result.skipped_outputs);
    print_diagnostics(&result.diagnostics);
}

fn print_collapse_summary(result: &CollapseResult) {
    println!("{CYAN}cz-ds zenodo collapse summary{RESET}");
    println!("{GREEN}input records: {}{RESET}", result.input_records);
    println!("{GREEN}concept DOIs: {}{RESET}", result.concepts);
    println!("{YELLOW}dropped versions: {}{RESET}", result.dropped_versions);
    println!("{GREEN}output records: {}{RESET}", result.output_records);
    print_outputs(&result.outputs, &[]);
    print_diagnostics(&result.diagnostics);
}

fn print_outputs(outputs: &[String], skipped: &[SkippedOutput]) {
    for path in outputs {
        println!("{CYAN}   wrote {path}{RESET}");
    }
    for entry in skipped {
        println!("{RED}   skipped {}: {}{RESET}", entry.output, entry.reason);
    }
}

fn print_diagnostics(diagnostics: &Diagnostics) {
    if diagnostics.is_empty() {
        println!("{GREEN}skipped items: 0{RESET}");
        return;
    }
    println!("{YELLOW}skipped items: {}{RESET}", diagnostics.total());
    for (reason, count) in diagnostics.iter() {
        println!("{YELLOW}   {reason}: {count}{RESET}");
    }
}
