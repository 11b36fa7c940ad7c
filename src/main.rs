//! Sumi-Harvest main entry point
//!
//! This is the command-line interface for the Sumi-Harvest listing harvester.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use sumi_harvest::config::{load_config_with_hash, CategoryEntry, Config};
use sumi_harvest::crawler::{CategoryPaths, Harvester};
use sumi_harvest::output::print_run_stats;
use tracing_subscriber::EnvFilter;

/// Sumi-Harvest: a polite, resumable listing harvester
///
/// Sumi-Harvest walks the listing pages of each configured category, extracts
/// one product record per item page and appends the records to a CSV or
/// SQLite file. Interrupted runs resume where they stopped.
#[derive(Parser, Debug)]
#[command(name = "sumi-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A polite, resumable listing harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Harvest only the named category
    #[arg(long, value_name = "NAME")]
    category: Option<String>,

    /// Delete the link cache first so discovery runs again (the ledger is kept)
    #[arg(long)]
    fresh: bool,

    /// Stop a category when its sample record comes back without a title
    #[arg(long)]
    strict_sample: bool,

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);
    if cli.strict_sample {
        config.harvest.abort_on_bad_sample = true;
    }

    let categories = select_categories(&config, cli.category.as_deref())?;

    if cli.dry_run {
        handle_dry_run(&config, &categories);
        return Ok(());
    }

    handle_harvest(&config, &categories, cli.fresh).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_harvest=info,warn"),
            1 => EnvFilter::new("sumi_harvest=debug,info"),
            2 => EnvFilter::new("sumi_harvest=trace,debug"),
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

fn select_categories<'a>(
    config: &'a Config,
    only: Option<&str>,
) -> anyhow::Result<Vec<&'a CategoryEntry>> {
    match only {
        Some(name) => match config.category(name) {
            Some(category) => Ok(vec![category]),
            None => bail!("category '{}' is not configured", name),
        },
        None if config.categories.is_empty() => bail!("no [[category]] entries configured"),
        None => Ok(config.categories.iter().collect()),
    }
}

/// Handles the --dry-run mode: shows what would be harvested
fn handle_dry_run(config: &Config, categories: &[&CategoryEntry]) {
    println!("=== Sumi-Harvest Dry Run ===\n");

    println!("Harvest Configuration:");
    println!("  Workers: {}", config.harvest.max_workers);
    println!("  Chunk size: {}", config.harvest.chunk_size);
    println!("  Batch size: {}", config.harvest.batch_size);
    println!("  Output: {:?} in {}", config.harvest.output_format, config.harvest.output_dir.display());
    println!("  Respect robots.txt: {}", config.harvest.respect_robots_txt);
    println!("  Abort on bad sample: {}", config.harvest.abort_on_bad_sample);

    println!("\nThrottle:");
    println!(
        "  Delay: {}ms (floor {}ms, ceiling {}ms, jitter up to {}ms)",
        config.throttle.base_delay_ms,
        config.throttle.floor().as_millis(),
        config.throttle.max_delay_ms,
        config.throttle.jitter_ms
    );
    println!(
        "  Attempts per URL: {} (time unit {}ms)",
        config.retry.max_attempts, config.retry.time_unit_ms
    );

    println!("\nIdentities ({} user agents):", config.identity.user_agents.len());
    for agent in &config.identity.user_agents {
        println!("  - {}", agent);
    }

    println!("\nCategories ({}):", categories.len());
    for category in categories {
        let paths = CategoryPaths::new(
            &config.harvest.output_dir,
            &category.name,
            config.harvest.output_format,
        );
        println!("  - {} <{}>", category.name, category.url);
        if !category.link_filters.is_empty() {
            println!("    filters: {}", category.link_filters.join(", "));
        }
        println!(
            "    links: {}{}",
            paths.links.display(),
            if paths.links.exists() { " (cached)" } else { "" }
        );
        println!("    ledger: {}", paths.progress.display());
        println!("    records: {}", paths.records.display());
    }

    println!("\n✓ Configuration is valid");
}

/// Harvests each selected category in turn
///
/// A failing category is logged and the next one still runs. The process
/// exits non-zero if any category failed.
async fn handle_harvest(
    config: &Config,
    categories: &[&CategoryEntry],
    fresh: bool,
) -> anyhow::Result<()> {
    let pause = Duration::from_secs(config.harvest.category_pause_secs);
    let mut failed = Vec::new();

    for (i, category) in categories.iter().enumerate() {
        if i > 0 && !pause.is_zero() {
            tracing::info!("Pausing {}s before the next category", pause.as_secs());
            tokio::time::sleep(pause).await;
        }

        match harvest_category(config, category, fresh).await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Category '{}' failed: {:#}", category.name, e);
                failed.push(category.name.as_str());
            }
        }
    }

    if !failed.is_empty() {
        bail!(
            "{} of {} categories failed: {}",
            failed.len(),
            categories.len(),
            failed.join(", ")
        );
    }

    tracing::info!("All {} categories harvested", categories.len());
    Ok(())
}

async fn harvest_category(
    config: &Config,
    category: &CategoryEntry,
    fresh: bool,
) -> anyhow::Result<()> {
    let harvester = Harvester::new(config, category)
        .with_context(|| format!("cannot set up category '{}'", category.name))?;

    if fresh && harvester.clear_link_cache()? {
        tracing::info!("Removed link cache {}", harvester.paths().links.display());
    }

    let stats = harvester.run().await.map_err(|e| {
        if e.is_fatal_discovery() {
            tracing::error!("Discovery aborted for '{}'", category.name);
        }
        e
    })?;

    print_run_stats(&stats);
    Ok(())
}
