//! partsouq-harvester main entry point
//!
//! This is the command-line interface for the catalog harvester.

use anyhow::Context;
use clap::Parser;
use partsouq_harvester::config::{load_config_with_hash, Config};
use partsouq_harvester::output::{
    print_harvest_summary, print_reconcile_report, print_search_hits, print_statistics,
    CatalogStatistics,
};
use partsouq_harvester::Coordinator;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// partsouq-harvester: a vehicle parts catalog harvester
///
/// Renders the catalog's group tree and diagram pages for one vehicle
/// session, extracts groups, diagrams and parts, and reconciles them into
/// a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "partsouq-harvester")]
#[command(version)]
#[command(about = "A vehicle parts catalog harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Harvest the group tree only
    #[arg(long, group = "mode")]
    groups: bool,

    /// Crawl diagrams pages of stored groups (default)
    #[arg(long, group = "mode")]
    diagrams: bool,

    /// Crawl a single stored group
    #[arg(long, value_name = "ID", group = "mode")]
    group: Option<i64>,

    /// Search the catalog for a part number
    #[arg(long, value_name = "PART", group = "mode")]
    search: Option<String>,

    /// Show statistics from the database and exit
    #[arg(long, group = "mode")]
    stats: bool,

    /// Delete all stored groups, diagrams, parts and cached pages
    #[arg(long, group = "mode")]
    wipe: bool,

    /// Number of groups to crawl (defaults to crawler.page-size)
    #[arg(long, value_name = "N")]
    page_size: Option<usize>,

    /// Number of groups with diagrams to skip
    #[arg(long, value_name = "N", default_value_t = 0)]
    offset: usize,

    /// Extract from cached pages only, without rendering
    #[arg(long)]
    from_cache: bool,

    /// Fail on the first rejected group, diagram or part
    #[arg(long)]
    strict: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);
    if cli.strict {
        config.reconcile.strict = true;
    }

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let page_size = cli.page_size.unwrap_or(config.crawler.page_size);
    let coordinator = Coordinator::new(config, cli.from_cache, cancel)
        .context("Failed to initialize harvester")?;

    let result = run_mode(&cli, &coordinator, page_size).await;

    if let Err(e) = coordinator.close().await {
        tracing::warn!("Failed to close render sessions: {}", e);
    }

    result.map_err(Into::into)
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("partsouq_harvester=info,warn"),
            1 => EnvFilter::new("partsouq_harvester=debug,info"),
            2 => EnvFilter::new("partsouq_harvester=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Cancels the token on the first Ctrl-C
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current page and stopping");
            cancel.cancel();
        }
    });
}

async fn run_mode(cli: &Cli, coordinator: &Coordinator, page_size: usize) -> anyhow::Result<()> {
    if cli.stats {
        handle_stats(coordinator)
    } else if cli.wipe {
        handle_wipe(coordinator)
    } else if cli.groups {
        handle_groups(coordinator).await
    } else if let Some(group_id) = cli.group {
        handle_group(coordinator, group_id).await
    } else if let Some(term) = &cli.search {
        handle_search(coordinator, term).await
    } else {
        handle_diagrams(coordinator, page_size, cli.offset).await
    }
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(coordinator: &Coordinator) -> anyhow::Result<()> {
    print_database_path(coordinator.config());

    let counts = coordinator
        .statistics()
        .context("Failed to load statistics")?;
    print_statistics(&CatalogStatistics::from_counts(counts));

    Ok(())
}

/// Handles the --wipe mode
fn handle_wipe(coordinator: &Coordinator) -> anyhow::Result<()> {
    print_database_path(coordinator.config());

    let removed = coordinator.wipe().context("Failed to wipe catalog")?;
    println!(
        "✓ Removed {} groups, {} diagrams, {} parts, {} cached pages",
        removed.groups, removed.diagrams, removed.parts, removed.cached_pages
    );

    Ok(())
}

/// Handles the --groups mode: harvests the group tree
async fn handle_groups(coordinator: &Coordinator) -> anyhow::Result<()> {
    let report = coordinator
        .harvest_groups()
        .await
        .context("Group harvest failed")?;
    print_reconcile_report(&report);
    Ok(())
}

/// Handles the --group mode: crawls one stored group
async fn handle_group(coordinator: &Coordinator, group_id: i64) -> anyhow::Result<()> {
    let summary = coordinator
        .harvest_group(group_id)
        .await
        .with_context(|| format!("Harvest of group {} failed", group_id))?;
    print_harvest_summary(&summary);
    Ok(())
}

/// Handles the --search mode
async fn handle_search(coordinator: &Coordinator, term: &str) -> anyhow::Result<()> {
    let hits = coordinator
        .search(term)
        .await
        .with_context(|| format!("Search for '{}' failed", term))?;
    print_search_hits(term, &hits);
    Ok(())
}

/// Handles the main diagrams crawl
async fn handle_diagrams(
    coordinator: &Coordinator,
    page_size: usize,
    offset: usize,
) -> anyhow::Result<()> {
    tracing::info!(
        "Starting diagrams crawl: {} groups from offset {}",
        page_size,
        offset
    );

    let summary = coordinator
        .harvest_diagrams(page_size, offset)
        .await
        .context("Diagrams crawl failed")?;

    if summary.outcome.cancelled {
        tracing::warn!(
            "Crawl cancelled after {} groups; rerun with --offset {} to continue",
            summary.outcome.succeeded.len(),
            offset + summary.outcome.succeeded.len() + summary.outcome.failed.len()
        );
    }

    print_harvest_summary(&summary);
    Ok(())
}

fn print_database_path(config: &Config) {
    println!("Database: {}\n", config.output.database_path);
}
