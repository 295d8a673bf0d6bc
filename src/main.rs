//! gh-harvest main entry point
//!
//! This is the command-line interface for the gh-harvest code search harvester.

use clap::Parser;
use gh_harvest::config::{load_config_with_hash, Config};
use gh_harvest::crawler::{crawl, enrich, outer_partitions};
use gh_harvest::storage::RunStatus;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// gh-harvest: a resumable code search harvester
///
/// gh-harvest walks the code search API over query × filename-prefix
/// partitions, rotating credentials and waiting out rate limits, and
/// stores every repository it finds in Parquet files it can resume from.
#[derive(Parser, Debug)]
#[command(name = "gh-harvest")]
#[command(version)]
#[command(about = "A resumable code search harvester", long_about = None)]
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

    /// Also write logs to a timestamped file in this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,

    /// Walk every partition again, ignoring recorded progress
    #[arg(long, conflicts_with_all = ["enrich", "dry_run", "stats", "inspect"])]
    fresh: bool,

    /// Fetch repository metadata for everything crawled so far
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "inspect"])]
    enrich: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["stats", "inspect"])]
    dry_run: bool,

    /// Show statistics for the data directory and ledger and exit
    #[arg(long, conflicts_with = "inspect")]
    stats: bool,

    /// Print the head of one Parquet file and exit
    #[arg(long, value_name = "FILE")]
    inspect: Option<PathBuf>,

    /// Number of rows shown by --inspect
    #[arg(long, default_value_t = 5, requires = "inspect")]
    rows: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet, cli.log_dir.as_deref())?;

    if let Some(path) = &cli.inspect {
        return handle_inspect(path, cli.rows);
    }

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.enrich {
        handle_enrich(config, &config_hash).await?;
    } else {
        handle_crawl(config, cli.fresh, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// With a log directory, a second plain-text layer mirrors everything into
/// `gh_harvest_<YYYYmmdd_HHMMSS>.log`.
fn setup_logging(
    verbose: u8,
    quiet: bool,
    log_dir: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("gh_harvest=info,warn"),
            1 => EnvFilter::new("gh_harvest=debug,info"),
            2 => EnvFilter::new("gh_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let file_layer = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let name = format!(
                "gh_harvest_{}.log",
                chrono::Local::now().format("%Y%m%d_%H%M%S")
            );
            let file = File::create(dir.join(name))?;
            Some(
                fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false),
        )
        .with(file_layer)
        .init();

    Ok(())
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== gh-harvest Dry Run ===\n");

    println!("API:");
    println!("  Base URL: {}", config.api.base_url);
    println!("  Language: {}", config.api.language);
    println!("  Results per page: {}", config.api.per_page);
    println!("  User agent: {}", config.api.user_agent);

    println!("\nCredentials ({} variables):", config.credentials.env_vars.len());
    for var in &config.credentials.env_vars {
        let state = match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => "set",
            _ => "missing",
        };
        println!("  - {} ({})", var, state);
    }

    println!("\nCrawler Configuration:");
    println!("  Max pages per partition: {}", config.crawler.max_pages);
    println!("  Failure budget: {}", config.crawler.failure_budget);
    println!(
        "  Politeness delay: {}ms",
        config.crawler.politeness_delay_ms
    );
    println!(
        "  Max rate-limit retries: {}",
        config.crawler.max_rate_limit_retries
    );
    println!("  Outer alphabet: {}", config.crawler.outer_alphabet);
    println!("  Inner alphabet: {}", config.crawler.inner_alphabet);

    println!("\nOutput:");
    println!("  Data directory: {}", config.data_dir().display());
    println!("  Path template: {}", config.output.path_template);
    println!("  Ledger: {}", config.ledger_path().display());

    println!("\nQueries ({}):", config.queries.len());
    for query in &config.queries {
        println!("  - {}: {}", query.name, query.text);
    }

    let outer = outer_partitions(&config.queries, &config.crawler);
    let inner = config.crawler.inner_alphabet.chars().count();
    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would walk {} outer partitions ({} search partitions)",
        outer.len(),
        outer.len() * inner
    );
}

/// Handles the --stats mode: shows statistics for the data directory
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use gh_harvest::output::{collect_statistics, print_statistics};
    use gh_harvest::storage::SqliteLedger;

    println!("Data directory: {}", config.data_dir().display());
    println!("Ledger: {}\n", config.ledger_path().display());

    let ledger = SqliteLedger::new(&config.ledger_path())?;
    let stats = collect_statistics(&config.data_dir(), &ledger)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --inspect mode: prints the head of one file
fn handle_inspect(path: &Path, rows: usize) -> Result<(), Box<dyn std::error::Error>> {
    use gh_harvest::output::{inspect_file, print_inspection};

    let inspection = inspect_file(path, rows)?;
    print_inspection(&inspection);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    fresh: bool,
    config_hash: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring recorded progress)");
    } else {
        tracing::info!("Starting crawl (completed partitions are skipped)");
    }
    tracing::info!("Queries: {}", config.queries.len());

    match crawl(config, fresh, config_hash).await {
        Ok(report) => {
            if report.status == RunStatus::Aborted {
                tracing::warn!(
                    "Crawl stopped early after {} failures; rerun to resume",
                    report.failures
                );
            } else {
                tracing::info!("Crawl completed successfully");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handles the --enrich mode
async fn handle_enrich(config: Config, config_hash: &str) -> Result<(), Box<dyn std::error::Error>> {
    match enrich(config, config_hash).await {
        Ok(report) => {
            if report.status == RunStatus::Aborted {
                tracing::warn!(
                    "Enrichment stopped early after {} failures; rerun to resume",
                    report.failures
                );
            } else {
                tracing::info!("Enrichment completed successfully");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Enrichment failed: {}", e);
            Err(e.into())
        }
    }
}
