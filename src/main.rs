use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use kindex::config::LoadConfig;
use kindex::country::CountryTable;
use kindex::namespace::NamespaceTable;
use kindex::stats::{LoadStats, LoadSummary};
use kindex::store::Store;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "kindex")]
#[command(about = "Index a WeRelate XML dump into SQLite and link its family graph")]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index pass: record namespaces and page byte ranges
    Index(IndexArgs),
    /// Detail pass: countries and links for an already indexed store
    Detail(StoreArgs),
    /// Run the index pass followed by the detail pass
    Load(LoadArgs),
    /// Write a CSV report over a loaded store to stdout
    Report(ReportArgs),
}

#[derive(Args)]
struct StoreArgs {
    /// SQLite database file
    #[arg(long)]
    db: PathBuf,

    /// Uncompressed WeRelate XML dump
    #[arg(long)]
    dump: PathBuf,
}

#[derive(Args)]
struct IndexArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Delete existing namespaces, pages and links before indexing
    #[arg(long)]
    clean: bool,

    /// Skip CREATE TABLE IF NOT EXISTS (schema already present)
    #[arg(long)]
    no_schema: bool,
}

#[derive(Args)]
struct LoadArgs {
    #[command(flatten)]
    index: IndexArgs,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReportKind {
    /// Page totals per namespace
    Namespaces,
    /// Person pages per country
    Countries,
    /// Title and byte range of every page
    Offsets,
}

#[derive(Args)]
struct ReportArgs {
    #[arg(value_enum)]
    kind: ReportKind,

    /// SQLite database file
    #[arg(long)]
    db: PathBuf,
}

impl From<IndexArgs> for LoadConfig {
    fn from(args: IndexArgs) -> Self {
        LoadConfig {
            store_path: args.store.db,
            dump_path: args.store.dump,
            clean: args.clean,
            create_schema: !args.no_schema,
        }
    }
}

fn open_store(config: &LoadConfig) -> Result<Store> {
    let store = Store::open(&config.store_path)?;
    if config.create_schema {
        store.ensure_schema()?;
    }
    if config.clean {
        info!("Cleaning store: {}", config.store_path.display());
        store.clear()?;
    }
    Ok(store)
}

fn index_pass(store: &mut Store, config: &LoadConfig, stats: &LoadStats) -> Result<(NamespaceTable, Duration)> {
    let start = Instant::now();
    let namespaces = kindex::index::build_index(store, &config.dump_path, stats)?;
    let elapsed = start.elapsed();
    info!(duration_secs = elapsed.as_secs_f64(), "Indexing complete");
    Ok((namespaces, elapsed))
}

fn detail_pass(
    store: &mut Store,
    config: &LoadConfig,
    namespaces: &NamespaceTable,
    stats: &LoadStats,
) -> Result<Duration> {
    let dump = File::open(&config.dump_path)
        .with_context(|| format!("Failed to open dump: {}", config.dump_path.display()))?;
    let start = Instant::now();
    kindex::extract::run_extraction(store, &dump, namespaces, &CountryTable, stats)?;
    let elapsed = start.elapsed();
    info!(duration_secs = elapsed.as_secs_f64(), "Detail pass complete");
    Ok(elapsed)
}

fn run_index(args: IndexArgs) -> Result<()> {
    let config = LoadConfig::from(args);
    let mut store = open_store(&config)?;
    let stats = LoadStats::new();
    let (_, elapsed) = index_pass(&mut store, &config, &stats)?;
    print_summary(&stats.summary(), &[("Indexing", elapsed)]);
    Ok(())
}

fn run_detail(args: StoreArgs) -> Result<()> {
    let config = LoadConfig {
        store_path: args.db,
        dump_path: args.dump,
        clean: false,
        create_schema: false,
    };
    let mut store = open_store(&config)?;
    let namespaces = NamespaceTable::load(store.connection())?;
    info!(count = namespaces.len(), "Namespaces loaded from store");
    let stats = LoadStats::new();
    let elapsed = detail_pass(&mut store, &config, &namespaces, &stats)?;
    print_summary(&stats.summary(), &[("Detail", elapsed)]);
    Ok(())
}

fn run_load(args: LoadArgs) -> Result<()> {
    let json = args.json;
    let config = LoadConfig::from(args.index);
    let mut store = open_store(&config)?;
    let stats = LoadStats::new();

    let (namespaces, indexing) = index_pass(&mut store, &config, &stats)?;
    let detail = detail_pass(&mut store, &config, &namespaces, &stats)?;

    let summary = stats.summary();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?
        );
    } else {
        print_summary(&summary, &[("Indexing", indexing), ("Detail", detail)]);
    }
    Ok(())
}

fn run_report(args: ReportArgs) -> Result<()> {
    let store = Store::open(&args.db)?;
    let out = io::stdout().lock();
    let rows = match args.kind {
        ReportKind::Namespaces => kindex::report::namespace_totals(store.connection(), out)?,
        ReportKind::Countries => {
            kindex::report::country_population(store.connection(), &CountryTable, out)?
        }
        ReportKind::Offsets => kindex::report::page_offsets(store.connection(), out)?,
    };
    info!(rows, "Report written");
    Ok(())
}

fn print_summary(summary: &LoadSummary, timings: &[(&str, Duration)]) {
    println!();
    println!("=== Summary ===");
    let mut total = Duration::ZERO;
    for (phase, elapsed) in timings {
        println!("{:<20}{:.2}s", format!("{} time:", phase), elapsed.as_secs_f64());
        total += *elapsed;
    }
    if timings.len() > 1 {
        println!("{:<20}{:.2}s", "Total time:", total.as_secs_f64());
    }
    println!();
    println!("Namespaces:         {}", summary.namespaces_declared);
    println!("Pages indexed:      {}", summary.pages_indexed);
    println!("Unknown namespaces: {}", summary.unknown_namespaces);
    println!("Pages visited:      {}", summary.pages_visited);
    println!("Fragments skipped:  {}", summary.fragments_skipped);
    println!("Redirects skipped:  {}", summary.redirects_skipped);
    println!("Facts failures:     {}", summary.facts_failed);
    println!("Countries assigned: {}", summary.countries_assigned);
    println!("Links inserted:     {}", summary.links_inserted);
    println!("Dangling refs:      {}", summary.dangling_references);
    println!("Store errors:       {}", summary.store_errors);
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    let result = match cli.command {
        Commands::Index(args) => run_index(args),
        Commands::Detail(args) => run_detail(args),
        Commands::Load(args) => run_load(args),
        Commands::Report(args) => run_report(args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
