//! Crawler coordinator - main crawl orchestration logic
//!
//! This module wires the crawl together:
//! - Initializing storage and the crawl state stores
//! - Building the HTTP client, session and fetcher
//! - Assembling the listing handler and product pipeline
//! - Running the category traversal and recording the run outcome

use crate::config::Config;
use crate::crawler::extractor::HtmlLinkExtractor;
use crate::crawler::fetcher::{ClientSettings, HttpFetcher};
use crate::crawler::listing::ListingHandler;
use crate::crawler::pagination::PaginationPlanner;
use crate::crawler::session::{SessionProvider, WarmupSession};
use crate::crawler::traversal::{
    CategoryTraversal, TraversalOptions, TraversalOutcome, TraversalReport,
};
use crate::product::{ApiProductExtractor, DocumentProductRepository, ProductPipeline};
use crate::state::{
    DocumentStateStore, FallbackStateStore, FileStateStore, StateStore,
};
use crate::storage::{lock_storage, RunStatus, SqliteStorage, Storage};
use crate::{CrawlError, Result};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Command-line overrides for a crawl
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Discard any saved progress and start over
    pub fresh: bool,
    /// Overrides `crawler.category-limit`
    pub category_limit: Option<u64>,
    /// Overrides `crawler.product-limit`
    pub product_limit: Option<usize>,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: Arc<Mutex<SqliteStorage>>,
    state_store: FallbackStateStore,
    fetcher: Arc<HttpFetcher>,
    link_extractor: Arc<HtmlLinkExtractor>,
    options: RunOptions,
    shutdown: Arc<AtomicBool>,
    run_id: i64,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `config_hash` - Hash of the configuration file, recorded with the run
    /// * `options` - Command-line overrides
    /// * `shutdown` - Flag that stops the crawl at the next safe point
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(CrawlError)` - Failed to initialize
    pub fn new(
        config: Config,
        config_hash: &str,
        options: RunOptions,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self> {
        let storage = SqliteStorage::new(Path::new(&config.storage.database_path))?;
        let storage = Arc::new(Mutex::new(storage));

        let state_store = FallbackStateStore::new(
            Box::new(DocumentStateStore::new(
                storage.clone(),
                config.storage.session_id.clone(),
            )),
            Box::new(FileStateStore::new(&config.storage.state_file)),
        );

        if options.fresh {
            tracing::info!("Fresh crawl requested, discarding saved progress");
            state_store.clear()?;
        }

        let warmup_url = config
            .session
            .warmup_url
            .clone()
            .unwrap_or_else(|| config.site.root_url.clone());
        let session: Arc<dyn SessionProvider> = Arc::new(WarmupSession::new(
            ClientSettings::from_config(&config),
            warmup_url,
            Duration::from_secs(config.session.max_age_minutes * 60),
        ));
        let fetcher = Arc::new(HttpFetcher::from_config(&config, session));
        let link_extractor = Arc::new(HtmlLinkExtractor::new(&config.selectors)?);

        let run_id = lock_storage(&storage)?.create_run(config_hash)?;
        tracing::info!("Starting crawl run {}", run_id);

        Ok(Self {
            config: Arc::new(config),
            storage,
            state_store,
            fetcher,
            link_extractor,
            options,
            shutdown,
            run_id,
        })
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    fn category_limit(&self) -> Option<u64> {
        self.options
            .category_limit
            .or(self.config.crawler.category_limit)
    }

    fn product_limit(&self) -> Option<usize> {
        self.options
            .product_limit
            .or(self.config.crawler.product_limit)
    }

    fn build_handler(&self) -> ListingHandler {
        let extractor = Arc::new(ApiProductExtractor::new(
            self.fetcher.clone(),
            &self.config.site.api_base_url,
            self.config.supplier.clone(),
        ));
        let repository = Arc::new(DocumentProductRepository::new(self.storage.clone()));

        let pipeline = ProductPipeline::new(
            extractor,
            repository,
            Duration::from_millis(self.config.crawler.product_delay_ms),
        )
        .with_shutdown(self.shutdown.clone());

        ListingHandler::new(
            self.fetcher.clone(),
            self.link_extractor.clone(),
            PaginationPlanner::new(self.config.site.listing_filter.clone()),
            pipeline,
        )
        .with_product_limit(self.product_limit())
        .with_shutdown(self.shutdown.clone())
    }

    /// Runs the crawl and records its outcome
    pub async fn run(&self) -> Result<TraversalReport> {
        let prior_state = self.state_store.load()?;
        let mut handler = self.build_handler();

        let options = TraversalOptions {
            category_limit: self.category_limit(),
            checkpoint_interval: self.config.crawler.checkpoint_interval,
        };

        let start_time = std::time::Instant::now();
        let result = CategoryTraversal::new(
            self.fetcher.as_ref(),
            self.link_extractor.as_ref(),
            &self.state_store,
        )
        .with_options(options)
        .with_shutdown(self.shutdown.clone())
        .run(&self.config.site.root_url, &mut handler, prior_state)
        .await;

        let (status, categories, products) = match &result {
            Ok(report) => {
                let status = match report.outcome {
                    TraversalOutcome::Completed => RunStatus::Completed,
                    TraversalOutcome::Halted => RunStatus::Halted,
                };
                (status, report.categories_processed, report.products_processed)
            }
            Err(e) => {
                let status = match e {
                    CrawlError::Interrupted => RunStatus::Interrupted,
                    _ => RunStatus::Failed,
                };
                let (categories, products) = self
                    .state_store
                    .load()
                    .ok()
                    .flatten()
                    .map_or((0, 0), |s| {
                        (s.categories_processed_count, s.products_processed_count)
                    });
                (status, categories, products)
            }
        };

        tracing::info!(
            "Run {} finished as {} after {:.1}s",
            self.run_id,
            status.to_db_string(),
            start_time.elapsed().as_secs_f64()
        );

        if let Err(e) =
            lock_storage(&self.storage)?.finish_run(self.run_id, status, categories, products)
        {
            tracing::error!("Could not record run {}: {}", self.run_id, e);
        }

        result
    }
}

/// Runs the main crawl operation
///
/// # Example
///
/// ```no_run
/// use catalog_crawler::config::load_config_with_hash;
/// use catalog_crawler::crawler::{run_crawl, RunOptions};
/// use std::path::Path;
/// use std::sync::atomic::AtomicBool;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("crawler.toml"))?;
/// let shutdown = Arc::new(AtomicBool::new(false));
/// run_crawl(config, &hash, RunOptions::default(), shutdown).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    config_hash: &str,
    options: RunOptions,
    shutdown: Arc<AtomicBool>,
) -> Result<TraversalReport> {
    let coordinator = Coordinator::new(config, config_hash, options, shutdown)?;
    coordinator.run().await
}
