//! uidmatrix CLI
//!
//! Natural-language lookups over a local copy of the UniqueID Matrix:
//! - `setup`: import the matrix workbook (or per-sheet CSVs) into the record store
//! - `query`: classify a question with an LLM, then run an exact lookup
//! - `lookup`: exact lookup with an explicit lookup type (no LLM)
//! - `status`: what is imported and which oracle would be used
//!
//! Exit status: 0 on success (including "no results"), 2 when the record
//! store is missing or unusable, 1 for every other failure.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use uidmatrix_ingest::SheetSource;
use uidmatrix_intent::{build_oracle, Intent, IntentClassifier, LookupType};
use uidmatrix_resolve::{lookup, open_store, ResolveError, Resolution, Resolver};
use uidmatrix_store::{RecordStore, DEFAULT_DB_PATH};

mod config;
mod render;

use config::{init_logging, OracleArgs, DB_ENV};

#[derive(Parser)]
#[command(name = "uidmatrix")]
#[command(
    author,
    version,
    about = "Natural-language lookups over the MISMO UniqueID Matrix"
)]
struct Cli {
    /// Record store path
    #[arg(long, global = true, env = DB_ENV, default_value = DEFAULT_DB_PATH)]
    db: PathBuf,

    /// More log output on stderr (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the record store from the matrix workbook or per-sheet CSV exports.
    ///
    /// The existing store is replaced only after every sheet imported cleanly.
    Setup {
        /// e.g. UniqueID_Matrix_v3.6.2_B373.xlsx, or "Container XPaths.csv" ...
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Sheet names for CSV inputs, in input order (default: file stem)
        #[arg(long = "sheet")]
        sheets: Vec<String>,
    },

    /// Ask in plain English, e.g. `uidmatrix query Get xpath for ID MC000001.00001`
    ///
    /// Flags may appear before or after the words; quote the question or put
    /// it after `--` if a word starts with `-`.
    Query {
        #[arg(required = true)]
        words: Vec<String>,

        #[command(flatten)]
        oracle: OracleArgs,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Exact lookup without the LLM.
    Lookup {
        #[arg(long, value_enum)]
        by: LookupBy,

        value: String,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Show what is imported and which oracle `query` would use.
    Status {
        #[command(flatten)]
        oracle: OracleArgs,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LookupBy {
    UniqueId,
    ReferenceId,
    Xpath,
}

impl From<LookupBy> for LookupType {
    fn from(by: LookupBy) -> Self {
        match by {
            LookupBy::UniqueId => LookupType::ByUniqueId,
            LookupBy::ReferenceId => LookupType::ByReferenceId,
            LookupBy::Xpath => LookupType::ByXpath,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Setup { inputs, sheets } => cmd_setup(&cli.db, &inputs, &sheets),
        Commands::Query {
            words,
            oracle,
            json,
        } => cmd_query(&cli.db, &words.join(" "), &oracle, json),
        Commands::Lookup { by, value, json } => cmd_lookup(&cli.db, by.into(), &value, json),
        Commands::Status { oracle } => cmd_status(&cli.db, &oracle),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(&err),
    }
}

fn report(err: &anyhow::Error) -> ExitCode {
    eprintln!("{} {err:#}", "error:".red().bold());

    match err.downcast_ref::<ResolveError>() {
        Some(e) if e.is_store_unavailable() => ExitCode::from(2),
        Some(e) if e.is_not_understood() => {
            eprintln!(
                "{} try e.g. \"Get xpath for ID MC000001.00001\", \"Show all instances of MC000001\" or \"Find ID for MESSAGE/DEAL_SETS\"",
                "hint:".yellow().bold()
            );
            ExitCode::FAILURE
        }
        _ => ExitCode::FAILURE,
    }
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_setup(db: &Path, inputs: &[PathBuf], sheets: &[String]) -> Result<()> {
    if sheets.len() > inputs.len() {
        anyhow::bail!(
            "{} --sheet names given for {} input file(s)",
            sheets.len(),
            inputs.len()
        );
    }

    let mut sources = Vec::new();
    for (i, path) in inputs.iter().enumerate() {
        if uidmatrix_ingest::is_workbook(path) {
            if sheets.get(i).is_some() {
                anyhow::bail!("--sheet applies to CSV inputs only ({})", path.display());
            }
            sources.extend(uidmatrix_ingest::workbook_sources(path)?);
            continue;
        }
        let source = SheetSource::from_path(path);
        sources.push(match sheets.get(i) {
            Some(name) => source.with_sheet(name.clone()),
            None => source,
        });
    }

    let summary = uidmatrix_ingest::import(&sources, db)
        .with_context(|| format!("import into {} failed", db.display()))?;

    for s in &summary.sources {
        eprintln!(
            "  {} {} ({} rows, {} skipped)",
            "imported".green(),
            s.sheet_source,
            s.rows,
            s.skipped
        );
    }
    eprintln!(
        "{} {} records -> {}",
        "ok".green().bold(),
        summary.total_records(),
        summary.db_path.display().to_string().bold()
    );
    Ok(())
}

fn cmd_query(db: &Path, text: &str, oracle_args: &OracleArgs, json: bool) -> Result<()> {
    let oracle_config = oracle_args.resolve()?;
    // The store is checked first so a missing import never costs an oracle call.
    let store = open_store(db)?;
    let oracle = build_oracle(&oracle_config).map_err(ResolveError::OracleUnavailable)?;

    let classifier =
        IntentClassifier::new(oracle).with_max_output_tokens(oracle_config.max_output_tokens);
    let resolver = Resolver::new(classifier, store);
    let resolution = resolver.resolve(text)?;
    print_resolution(&resolution, json)
}

fn cmd_lookup(db: &Path, lookup_type: LookupType, value: &str, json: bool) -> Result<()> {
    let store = open_store(db)?;
    let resolution = lookup(&store, Intent::new(lookup_type, value))?;
    print_resolution(&resolution, json)
}

fn cmd_status(db: &Path, oracle_args: &OracleArgs) -> Result<()> {
    let store = RecordStore::open(db).map_err(ResolveError::from)?;
    let sources = store.sources()?;

    println!("{} {}", "store:".bold(), store.path().display());
    println!("  {} records", store.record_count()?);
    print!("{}", render::sources_text(&sources));

    let config = oracle_args.resolve()?;
    let base_url = if config.base_url.is_empty() {
        "-"
    } else {
        config.base_url.as_str()
    };
    println!(
        "{} {} ({}), timeout {}s, base url {}",
        "oracle:".bold(),
        config.backend,
        config.model,
        config.timeout.as_secs(),
        base_url
    );
    if let Err(e) = build_oracle(&config) {
        println!("  {} {e}", "warning:".yellow().bold());
    }
    Ok(())
}

fn print_resolution(resolution: &Resolution, json: bool) -> Result<()> {
    if json {
        println!("{}", render::resolution_json(resolution)?);
    } else {
        print!("{}", render::resolution_text(resolution));
    }
    Ok(())
}
