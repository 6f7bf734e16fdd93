//! catalog-crawler main entry point
//!
//! This is the command-line interface for the resumable catalog crawler.

use catalog_crawler::config::{load_config_with_hash, Config};
use catalog_crawler::crawler::{run_crawl, RunOptions, TraversalOutcome};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// catalog-crawler: a resumable e-commerce catalog crawler
///
/// Walks the category tree of a catalog site depth-first, pages through
/// every leaf category and stores the products it lists. An interrupted
/// crawl resumes from its last checkpoint.
#[derive(Parser, Debug)]
#[command(name = "catalog-crawler")]
#[command(version)]
#[command(about = "A resumable e-commerce catalog crawler", long_about = None)]
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

    /// Start a fresh crawl, discarding saved progress
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Maximum number of leaf categories to process, across resumed runs
    #[arg(long, value_name = "N")]
    category_limit: Option<u64>,

    /// Maximum number of products taken from each leaf category
    #[arg(long, value_name = "N")]
    product_limit: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

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

    let options = RunOptions {
        fresh: cli.fresh,
        category_limit: cli.category_limit,
        product_limit: cli.product_limit,
    };

    if cli.dry_run {
        handle_dry_run(&config, &options);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, &config_hash, options).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_crawler=info,warn"),
            1 => EnvFilter::new("catalog_crawler=debug,info"),
            2 => EnvFilter::new("catalog_crawler=trace,debug"),
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

fn describe_limit<T: std::fmt::Display>(limit: Option<T>) -> String {
    limit.map_or_else(|| "unlimited".to_string(), |n| n.to_string())
}

/// Handles the --dry-run mode: shows the effective settings
fn handle_dry_run(config: &Config, options: &RunOptions) {
    println!("=== catalog-crawler Dry Run ===\n");

    println!("Site:");
    println!("  Root URL: {}", config.site.root_url);
    println!("  API base URL: {}", config.site.api_base_url);
    if let Some(filter) = &config.site.listing_filter {
        println!("  Listing filter: {}", filter);
    }

    println!("\nCrawler Configuration:");
    println!(
        "  Category limit: {}",
        describe_limit(options.category_limit.or(config.crawler.category_limit))
    );
    println!(
        "  Product limit per category: {}",
        describe_limit(options.product_limit.or(config.crawler.product_limit))
    );
    println!(
        "  Checkpoint every {} leaf categories",
        config.crawler.checkpoint_interval
    );
    println!("  Delay between products: {}ms", config.crawler.product_delay_ms);
    println!(
        "  Retries: {} (base delay {}ms)",
        config.crawler.max_retries, config.crawler.retry_base_delay_ms
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);
    println!("  State file: {}", config.storage.state_file);
    println!("  Session id: {}", config.storage.session_id);

    println!("\n✓ Configuration is valid");
    if options.fresh {
        println!("✓ Would discard saved progress and start over");
    } else {
        println!("✓ Would resume from saved progress if any");
    }
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use catalog_crawler::output::{load_statistics, print_statistics};
    use catalog_crawler::state::{DocumentStateStore, FallbackStateStore, FileStateStore};
    use catalog_crawler::storage::SqliteStorage;
    use std::path::Path;
    use std::sync::Mutex;

    println!("Database: {}\n", config.storage.database_path);

    let database = Path::new(&config.storage.database_path);
    let storage = SqliteStorage::new(database)?;
    let state_store = FallbackStateStore::new(
        Box::new(DocumentStateStore::new(
            Arc::new(Mutex::new(SqliteStorage::new(database)?)),
            config.storage.session_id.clone(),
        )),
        Box::new(FileStateStore::new(&config.storage.state_file)),
    );

    let stats = load_statistics(&storage, &state_store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: &str,
    options: RunOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    if options.fresh {
        tracing::info!("Starting fresh crawl (ignoring previous state)");
    } else {
        tracing::info!("Starting crawl (will resume from saved progress)");
    }
    tracing::info!("Root category: {}", config.site.root_url);

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current product");
            flag.store(true, Ordering::SeqCst);
        }
    });

    match run_crawl(config, config_hash, options, shutdown).await {
        Ok(report) => {
            match report.outcome {
                TraversalOutcome::Completed => tracing::info!("Crawl completed successfully"),
                TraversalOutcome::Halted => {
                    tracing::info!("Category limit reached, progress saved for the next run")
                }
            }
            tracing::info!(
                "Leaf categories: {}, products: {}, failed leaves: {}, failed fetches: {}",
                report.categories_processed,
                report.products_processed,
                report.failed_leaves,
                report.failed_fetches
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
