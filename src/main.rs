//! Command-line entry point for the `climate-ingest` pipeline.
//!
//! Startup sequence:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Establishing a PostgreSQL connection pool
//! - Creating the schema and seeding the reference ecosystems
//! - Dispatching to `ingest`, `clear` or `verify`
//!
//! # Environment Variables
//! - `DATABASE_URL` (**required**) – PostgreSQL connection string
//! - `DB_POOL_MAX` (optional) – maximum number of DB connections (default: 5)
//! - `NOAA_API_KEY` (optional) – NOAA CDO token, needed only for `noaa`
//! - `INGEST_LOG_LEVEL` (optional) – log verbosity (default: `info`)
//! - `INGEST_SPAN_EVENTS` (optional) – span event mode for tracing
//!
//! The process exits non-zero when any selected source failed.
use std::{env, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use climate_wildlife_ingest::config::{self, Config};
use climate_wildlife_ingest::fetch::{Fetch, HttpFetcher};
use climate_wildlife_ingest::memory::MemoryStore;
use climate_wildlife_ingest::orchestrator::{expand, IngestOptions, Orchestrator, SourceSelector};
use climate_wildlife_ingest::schema::{self, default_ecosystems};
use climate_wildlife_ingest::store::{PgStore, Store};
use climate_wildlife_ingest::verify::Check;

#[derive(Debug, Parser)]
#[command(name = "climate-ingest", version, about = "Climate and wildlife data ingestion")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ingest one or more sources, each as its own atomic run
    Ingest(IngestArgs),

    /// Delete all climate and wildlife observations
    Clear,

    /// Report row counts, nulls, date ranges and sources
    Verify {
        #[arg(long, value_enum, num_args = 1.., default_value = "all")]
        checks: Vec<Check>,
    },
}

#[derive(Debug, Args)]
struct IngestArgs {
    #[arg(value_enum, required = true, num_args = 1..)]
    sources: Vec<SourceSelector>,

    /// Scientific names for GBIF
    #[arg(long, num_args = 1..)]
    species: Option<Vec<String>>,

    /// Occurrences fetched per species
    #[arg(long)]
    limit: Option<u32>,

    #[arg(long)]
    start_year: Option<i32>,

    #[arg(long)]
    end_year: Option<i32>,

    /// NOAA station identifiers, e.g. GHCND:USW00014733
    #[arg(long, num_args = 1..)]
    stations: Option<Vec<String>>,

    /// Stage into an in-memory store instead of PostgreSQL
    #[arg(long)]
    dry_run: bool,
}

impl IngestArgs {
    // ---
    fn options(&self) -> IngestOptions {
        let defaults = IngestOptions::default();
        IngestOptions {
            species: self.species.clone().unwrap_or(defaults.species),
            limit_per_species: self.limit.unwrap_or(defaults.limit_per_species),
            start_year: self.start_year.unwrap_or(defaults.start_year),
            end_year: self.end_year.unwrap_or(defaults.end_year),
            stations: self.stations.clone().unwrap_or(defaults.stations),
        }
    }
}

// ---

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // ---
    dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    match cli.command {
        Command::Ingest(args) => ingest(&cfg, &args).await,
        Command::Clear => {
            let store = PgStore::new(connect(&cfg).await?);
            let deleted = store.clear_observations().await?;
            tracing::info!("Cleared {} observation rows", deleted);
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify { checks } => {
            let store = PgStore::new(connect(&cfg).await?);
            let report = store.verify().await?;
            for line in report.render(&checks) {
                println!("{line}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn ingest(cfg: &Config, args: &IngestArgs) -> Result<ExitCode> {
    // ---
    let fetcher: Arc<dyn Fetch> = Arc::new(HttpFetcher::new(cfg.http_timeout)?);

    let store: Box<dyn Store> = if args.dry_run {
        tracing::info!("Dry run: staging into memory, nothing is written to the database");
        Box::new(MemoryStore::new(default_ecosystems()))
    } else {
        Box::new(PgStore::new(connect(cfg).await?))
    };

    let sources = expand(&args.sources);
    let outcomes = Orchestrator::new(store.as_ref(), fetcher, cfg)
        .run(&sources, &args.options())
        .await;

    let mut failed = 0;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(report) => tracing::info!(
                "{}: {} rows, {} skipped",
                outcome.source.as_str(),
                report.rows_staged,
                report.rows_skipped
            ),
            Err(e) => {
                failed += 1;
                tracing::error!("{}: {}", outcome.source.as_str(), e);
            }
        }
    }

    if failed > 0 {
        tracing::error!("{} of {} sources failed", failed, outcomes.len());
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Connect, create the schema and seed the reference ecosystems.
async fn connect(cfg: &Config) -> Result<PgPool> {
    // ---
    tracing::info!("Attempting to connect to database");

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(&cfg.db_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Successfully connected to database");

    schema::create_schema(&pool).await?;
    let seeded = schema::seed_ecosystems(&pool, &default_ecosystems()).await?;
    if seeded > 0 {
        tracing::info!("Seeded {} ecosystems", seeded);
    }

    Ok(pool)
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// This function configures the [`tracing_subscriber`] with:
/// - Log target, file, and line number output enabled
/// - Color output controlled by TTY detection and `FORCE_COLOR` env var:
///   - `FORCE_COLOR=1|true|yes`: force colors on
///   - `FORCE_COLOR=0|false|no`: force colors off
///   - unset or other values: auto-detect TTY
/// - Span event emission mode controlled by the `INGEST_SPAN_EVENTS` env var:
///   - `"full"`       : emit ENTER, EXIT, and CLOSE events with timing
///   - `"enter_exit"` : emit ENTER and EXIT only
///   - unset or other values: emit CLOSE events only (default)
/// - Log level controlled by the `INGEST_LOG_LEVEL` env var
///
/// Call once at startup before any logging macros are invoked.
fn init_tracing() {
    // ---
    let span_events = match env::var("INGEST_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stderr().is_terminal(),
    };

    // Use RUST_LOG if available, otherwise fall back to INGEST_LOG_LEVEL
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("INGEST_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn,hyper=warn,reqwest=warn"))
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
