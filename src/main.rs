//! Binary entry point for schema-cache.
//!
//! This binary provides the CLI interface for fetching, inspecting and
//! clearing the cached GraphQL schema.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use schema_cache::observability::{self, LoggingConfig};
use schema_cache::services::SlotReport;
use schema_cache::{
    CacheSlot, LocalStore, RemoteFetcher, RetryPolicy, RetryingFetcher, SchemaCacheConfig,
    SchemaDocument, SchemaManager, SchemaStatus, validate,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

/// Schema cache - GraphQL schema acquisition with a local TTL cache.
#[derive(Parser)]
#[command(name = "schema-cache")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Cache directory (overrides config).
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// GraphQL endpoint (overrides config).
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Cache TTL in hours (overrides config).
    #[arg(long, global = true)]
    ttl_hours: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Fetch the schema from the endpoint, ignoring the cache TTL.
    Fetch {
        /// Cache the raw introspection JSON instead of SDL.
        #[arg(long)]
        raw_introspection: bool,
    },

    /// Make sure a usable schema is cached and report its state.
    Ensure,

    /// Print the best available schema to stdout.
    Show,

    /// Show cache status without contacting the endpoint.
    Status {
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Validate a schema file (SDL or introspection JSON).
    Validate {
        /// File to validate.
        file: PathBuf,
    },

    /// Remove the cached schema.
    Clear,
}

/// Main entry point.
fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => apply_cli_overrides(config, &cli),
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init_logging(LoggingConfig::from_settings(
        &config.logging,
        cli.verbose,
    )) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli, config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(
    cli: Cli,
    config: SchemaCacheConfig,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Fetch { raw_introspection } => {
            let manager = build_manager(&config, raw_introspection)?;
            let status = manager.force_refresh()?;
            Ok(report_status(&status))
        },
        Commands::Ensure => {
            let manager = build_manager(&config, false)?;
            let status = manager.ensure_schema()?;
            Ok(report_status(&status))
        },
        Commands::Show => {
            let manager = build_manager(&config, false)?;
            let status = manager.ensure_schema()?;
            if let Some(warning) = status.warning() {
                eprintln!("warning: {warning}");
            }
            match status.into_document() {
                Ok(document) => {
                    print!("{}", document.text());
                    if !document.text().ends_with('\n') {
                        println!();
                    }
                    Ok(ExitCode::SUCCESS)
                },
                Err(e) => {
                    eprintln!("{e}");
                    Ok(ExitCode::FAILURE)
                },
            }
        },
        Commands::Status { json } => {
            let manager = build_manager(&config, false)?;
            let report = manager.status()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            Ok(ExitCode::SUCCESS)
        },
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Clear => {
            let store = LocalStore::open(&config.cache_dir)?;
            if store.clear()? {
                println!("Cleared cached schema in {}", store.dir().display());
            } else {
                println!("Nothing cached in {}", store.dir().display());
            }
            Ok(ExitCode::SUCCESS)
        },
    }
}

fn build_manager(
    config: &SchemaCacheConfig,
    raw_introspection: bool,
) -> Result<SchemaManager, Box<dyn std::error::Error>> {
    if !raw_introspection {
        return Ok(SchemaManager::from_config(config)?);
    }

    config.validate()?;
    let store =
        LocalStore::open(&config.cache_dir)?.with_max_document_bytes(config.max_document_bytes);
    let fetcher = RetryingFetcher::new(
        RemoteFetcher::from_config(config)?.with_raw_introspection(true),
        RetryPolicy::from_config(config),
    );
    Ok(
        SchemaManager::new(Arc::new(CacheSlot::new(store)), fetcher, config.effective_ttl_hours())
            .with_bundled_schema(config.bundled_schema_path.clone()),
    )
}

/// Prints a one-line summary; stale warnings go to stderr.
fn report_status(status: &SchemaStatus) -> ExitCode {
    match status {
        SchemaStatus::Fresh { metadata, .. } => {
            println!(
                "fresh: {} bytes, fetched {}",
                metadata.size_bytes,
                metadata.fetched_at.to_rfc3339()
            );
            ExitCode::SUCCESS
        },
        SchemaStatus::Stale {
            metadata, warning, ..
        } => {
            eprintln!("warning: {warning}");
            println!(
                "stale: {} bytes, fetched {} ({})",
                metadata.size_bytes,
                metadata.fetched_at.to_rfc3339(),
                metadata.source
            );
            ExitCode::SUCCESS
        },
        SchemaStatus::Unavailable { reason } => {
            eprintln!("unavailable: {reason}");
            ExitCode::FAILURE
        },
    }
}

fn print_report(report: &SlotReport) {
    println!("State:     {}", report.state);
    println!("Cache dir: {}", report.cache_dir.display());
    println!(
        "Endpoint:  {}",
        report.endpoint.as_deref().unwrap_or("(not configured)")
    );
    println!("TTL:       {}h", report.ttl_hours);
    let Some(metadata) = &report.metadata else {
        println!("Cached:    no");
        return;
    };
    println!("Cached:    {} ({} bytes)", metadata.format, metadata.size_bytes);
    println!("Source:    {}", metadata.source);
    println!("Checksum:  {}", metadata.checksum);
    println!("Fetched:   {}", metadata.fetched_at.to_rfc3339());
    if let Some(age) = report.age_seconds {
        println!(
            "Age:       {}",
            schema_cache::models::format_age(chrono::Duration::seconds(age))
        );
    }
    println!("Fresh:     {}", if report.fresh { "yes" } else { "no" });
}

fn cmd_validate(file: &Path) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(file)?;
    match validate(&SchemaDocument::detect(text)) {
        Ok(report) => {
            println!(
                "valid {}: query root '{}', {} types",
                report.format, report.query_type, report.type_count
            );
            Ok(ExitCode::SUCCESS)
        },
        Err(e) => {
            eprintln!("{}: {e}", file.display());
            Ok(ExitCode::FAILURE)
        },
    }
}

/// Applies CLI flag overrides (highest precedence).
fn apply_cli_overrides(mut config: SchemaCacheConfig, cli: &Cli) -> SchemaCacheConfig {
    if let Some(endpoint) = &cli.endpoint {
        config = config.with_endpoint(endpoint.clone());
    }
    if let Some(dir) = &cli.cache_dir {
        config = config.with_cache_dir(dir.clone());
    }
    if let Some(ttl) = cli.ttl_hours {
        config = config.with_ttl_hours(ttl);
    }
    config
}

/// Loads configuration from file or defaults.
fn load_config(path: Option<&str>) -> Result<SchemaCacheConfig, Box<dyn std::error::Error>> {
    // If a path is provided, load from that file
    if let Some(config_path) = path {
        return SchemaCacheConfig::load_from_file(Path::new(config_path))
            .map_err(std::convert::Into::into);
    }

    // Otherwise, load from default location (honours SCHEMA_CACHE_CONFIG_PATH)
    Ok(SchemaCacheConfig::load_default())
}
