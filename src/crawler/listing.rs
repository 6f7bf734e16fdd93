//! Leaf handler that reads a category's listing pages

use crate::crawler::extractor::LinkExtractor;
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::pagination::PaginationPlanner;
use crate::crawler::traversal::{LeafCategory, LeafHandler};
use crate::product::ProductPipeline;
use crate::{CrawlError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Collects product links from every listing page of a leaf and runs them
/// through the product pipeline
pub struct ListingHandler {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn LinkExtractor>,
    planner: PaginationPlanner,
    pipeline: ProductPipeline,
    product_limit: Option<usize>,
    shutdown: Option<Arc<AtomicBool>>,
}

impl ListingHandler {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<dyn LinkExtractor>,
        planner: PaginationPlanner,
        pipeline: ProductPipeline,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            planner,
            pipeline,
            product_limit: None,
            shutdown: None,
        }
    }

    /// Caps the number of products taken from one category
    pub fn with_product_limit(mut self, limit: Option<usize>) -> Self {
        self.product_limit = limit;
        self
    }

    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::SeqCst))
    }

    fn limit_reached(&self, collected: usize) -> bool {
        self.product_limit.map_or(false, |limit| collected >= limit)
    }

    /// Reads listing pages until they run out or the product limit is met
    ///
    /// Fails only if no page could be fetched at all.
    async fn collect_links(&self, category: &LeafCategory) -> Result<Vec<String>> {
        let category_url = Url::parse(&category.url)?;
        let pages = self.planner.page_urls(&category_url, category.total_items);
        debug!("{} has {} listing pages", category.url, pages.len());

        let mut links = Vec::new();
        let mut seen = HashSet::new();
        let mut last_error = None;
        let mut fetched = 0;

        for page in &pages {
            if self.limit_reached(links.len()) {
                break;
            }
            if self.is_shutdown() {
                return Err(CrawlError::Interrupted);
            }

            let content = match self.fetcher.fetch(page).await {
                Ok(content) => content,
                Err(e) => {
                    warn!("Skipping listing page {}: {}", page, e);
                    last_error = Some(e);
                    continue;
                }
            };
            fetched += 1;

            let page_url = Url::parse(page)?;
            for link in self.extractor.extract_product_links(&content, &page_url) {
                if self.limit_reached(links.len()) {
                    break;
                }
                if seen.insert(link.clone()) {
                    links.push(link);
                }
            }
        }

        match last_error {
            Some(e) if fetched == 0 => Err(e.into()),
            _ => Ok(links),
        }
    }
}

#[async_trait]
impl LeafHandler for ListingHandler {
    async fn handle_leaf(&mut self, category: &LeafCategory, sequence: u64) -> Result<usize> {
        let links = self.collect_links(category).await?;

        if links.is_empty() {
            warn!("No products found in category #{} {}", sequence, category.url);
            return Ok(0);
        }

        info!(
            "Category #{} {}: {} products",
            sequence,
            category.url,
            links.len()
        );

        let report = self.pipeline.process(&links).await?;
        info!(
            "Category #{} done: {} saved, {} skipped, {} failed",
            sequence,
            report.saved(),
            report.error_tagged + report.unidentifiable,
            report.extraction_failures + report.persist_failures
        );

        Ok(report.saved())
    }
}
