//! cctld-crawler main entry point
//!
//! This is the command-line interface for the focused-domain crawler.

use cctld_crawler::config::{load_config_with_hash, validate, Config};
use cctld_crawler::crawler::crawl;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// cctld-crawler: a crawler for one national top-level domain family
///
/// Starting from seed URLs, it follows links that stay inside the configured
/// suffix family, records site identities and response headers, and keeps
/// one copy of every distinct page structure it meets.
#[derive(Parser, Debug)]
#[command(name = "cctld-crawler")]
#[command(version = "1.0.0")]
#[command(about = "A focused ccTLD web crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in `.pt` defaults when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            match load_config_with_hash(path) {
                Ok((cfg, hash)) => {
                    tracing::info!("Configuration loaded successfully (hash: {})", hash);
                    cfg
                }
                Err(e) => {
                    tracing::error!("Failed to load configuration: {}", e);
                    return Err(e.into());
                }
            }
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            let cfg = Config::default();
            validate(&cfg)?;
            cfg
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("cctld_crawler=info,warn"),
            1 => EnvFilter::new("cctld_crawler=debug,info"),
            2 => EnvFilter::new("cctld_crawler=trace,debug"),
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

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== cctld-crawler Dry Run ===\n");

    println!("Fetch Stage:");
    println!("  Workers: {}", config.crawler.max_concurrent_fetches);
    println!("  Tries per URL: {}", config.crawler.tries);
    println!("  Retry backoff: {}ms", config.crawler.retry_backoff_ms);
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!(
        "  Honor rate-limit headers: {}",
        config.crawler.honor_rate_limit_headers
    );

    println!("\nFilter:");
    println!("  Suffixes: {}", config.filter.allowed_suffixes.join(", "));
    println!(
        "  Extensions: {}",
        config
            .filter
            .allowed_extensions
            .iter()
            .map(|e| if e.is_empty() { "(none)" } else { e.as_str() })
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Extra sites: {}", config.filter.allowed_sites.join(", "));

    println!("\nClassifier:");
    println!("  Keywords: {}", config.classifier.keywords.len());
    println!("  Store raw HTML: {}", config.classifier.store_raw_html);
    println!("  Flush batch size: {}", config.classifier.flush_batch_size);

    println!("\nTermination:");
    println!(
        "  Observation interval: {}ms",
        config.termination.observation_interval_ms
    );
    println!("  Poll interval: {}ms", config.termination.poll_interval_ms);
    println!("  Ack timeout: {}ms", config.termination.ack_timeout_ms);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\nSeeds ({}):", config.crawler.seeds.len());
    for seed in &config.crawler.seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows sink counts from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use cctld_crawler::output::{load_statistics, print_statistics};
    use cctld_crawler::storage::open_gateway;
    use std::path::Path;

    println!("Database: {}\n", config.output.database_path);

    let gateway = open_gateway(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&gateway)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Starting crawl: {} seeds, {} suffixes, {} workers",
        config.crawler.seeds.len(),
        config.filter.allowed_suffixes.len(),
        config.crawler.max_concurrent_fetches
    );

    match crawl(config).await {
        Ok(report) => {
            println!("{}", report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
