use crate::crawler::Throttle;
use crate::product::extractor::{ProductExtractor, ProductRef};
use crate::product::repository::ProductRepository;
use crate::storage::WriteOutcome;
use crate::url::extract_product_id;
use crate::{CrawlError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Counters for one batch of product links
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub attempted: usize,
    pub inserted: usize,
    pub updated: usize,
    /// Links without a product identifier
    pub unidentifiable: usize,
    pub extraction_failures: usize,
    /// Products extracted without usable data
    pub error_tagged: usize,
    pub persist_failures: usize,
}

impl PipelineReport {
    /// Products written to the repository
    pub fn saved(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Extracts and stores products one link at a time
pub struct ProductPipeline {
    extractor: Arc<dyn ProductExtractor>,
    repository: Arc<dyn ProductRepository>,
    throttle: Throttle,
    shutdown: Option<Arc<AtomicBool>>,
}

impl ProductPipeline {
    pub fn new(
        extractor: Arc<dyn ProductExtractor>,
        repository: Arc<dyn ProductRepository>,
        delay: Duration,
    ) -> Self {
        Self {
            extractor,
            repository,
            throttle: Throttle::new(delay),
            shutdown: None,
        }
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

    /// Processes product links in order
    ///
    /// Failures of individual products are counted and logged. Returns
    /// [`CrawlError::Interrupted`] if shutdown is requested between products.
    pub async fn process(&mut self, links: &[String]) -> Result<PipelineReport> {
        let mut report = PipelineReport::default();

        for (i, link) in links.iter().enumerate() {
            if self.is_shutdown() {
                return Err(CrawlError::Interrupted);
            }

            let Some(article) = extract_product_id(link) else {
                let error = CrawlError::UnidentifiableProduct { url: link.clone() };
                warn!("Skipping link: {}", error);
                report.unidentifiable += 1;
                continue;
            };

            report.attempted += 1;
            info!("Product {}/{}: {}", i + 1, links.len(), article);
            self.throttle.wait().await;

            let product_ref = ProductRef {
                article,
                url: link.clone(),
            };

            let product = match self.extractor.extract(&product_ref).await {
                Ok(product) => product,
                Err(e) => {
                    error!("Could not extract {}: {}", link, e);
                    report.extraction_failures += 1;
                    continue;
                }
            };

            if product.is_error_tagged() {
                warn!(
                    "Skipping product {} without usable data: {}",
                    product.article, product.title
                );
                report.error_tagged += 1;
                continue;
            }

            match self.repository.upsert(&product) {
                Ok(WriteOutcome::Inserted) => report.inserted += 1,
                Ok(WriteOutcome::Updated) => report.updated += 1,
                Err(e) => {
                    error!("Could not save product {}: {}", product.article, e);
                    report.persist_failures += 1;
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::extractor::ExtractionError;
    use crate::product::model::{Product, NO_DATA};
    use crate::storage::{StorageError, StorageResult};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Titles by article; a missing article fails extraction
    struct FakeExtractor {
        titles: HashMap<String, String>,
    }

    #[async_trait]
    impl ProductExtractor for FakeExtractor {
        async fn extract(
            &self,
            product: &ProductRef,
        ) -> std::result::Result<Product, ExtractionError> {
            match self.titles.get(&product.article) {
                Some(title) => {
                    let mut p = Product::empty(product.article.clone());
                    p.title = title.clone();
                    Ok(p)
                }
                None => Err(ExtractionError::NoData {
                    article: product.article.clone(),
                    reason: "both APIs failed".to_string(),
                }),
            }
        }
    }

    #[derive(Default)]
    struct MemoryRepository {
        products: Mutex<HashMap<String, Product>>,
        fail: bool,
    }

    impl ProductRepository for MemoryRepository {
        fn upsert(&self, product: &Product) -> StorageResult<WriteOutcome> {
            if self.fail {
                return Err(StorageError::Database("disk full".to_string()));
            }
            let previous = self
                .products
                .lock()
                .unwrap()
                .insert(product.article.clone(), product.clone());
            Ok(if previous.is_some() {
                WriteOutcome::Updated
            } else {
                WriteOutcome::Inserted
            })
        }
    }

    fn extractor(entries: &[(&str, &str)]) -> Arc<FakeExtractor> {
        Arc::new(FakeExtractor {
            titles: entries
                .iter()
                .map(|(a, t)| (a.to_string(), t.to_string()))
                .collect(),
        })
    }

    fn link(article: &str) -> String {
        format!("https://shop.test/katalog/p/{}/", article)
    }

    #[tokio::test]
    async fn test_skips_unusable_products() {
        let repo = Arc::new(MemoryRepository::default());
        let mut pipeline = ProductPipeline::new(
            extractor(&[("1", "Ручка"), ("2", NO_DATA), ("3", "Ошибка: таймаут")]),
            repo.clone(),
            Duration::ZERO,
        );

        let links = vec![
            link("1"),
            link("2"),
            link("3"),
            link("4"),
            "https://shop.test/katalog/akcii/".to_string(),
            link("1"),
        ];
        let report = pipeline.process(&links).await.unwrap();

        assert_eq!(report.attempted, 5);
        assert_eq!(report.inserted, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.error_tagged, 2);
        assert_eq!(report.extraction_failures, 1);
        assert_eq!(report.unidentifiable, 1);
        assert_eq!(report.saved(), 2);

        let stored = repo.products.lock().unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored.contains_key("1"));
    }

    #[tokio::test]
    async fn test_persist_failure_is_counted() {
        let repo = Arc::new(MemoryRepository {
            fail: true,
            ..Default::default()
        });
        let mut pipeline = ProductPipeline::new(extractor(&[("1", "Ручка")]), repo, Duration::ZERO);

        let report = pipeline.process(&[link("1")]).await.unwrap();

        assert_eq!(report.persist_failures, 1);
        assert_eq!(report.saved(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_between_products() {
        let repo = Arc::new(MemoryRepository::default());
        let shutdown = Arc::new(AtomicBool::new(true));
        let mut pipeline = ProductPipeline::new(extractor(&[("1", "Ручка")]), repo.clone(), Duration::ZERO)
            .with_shutdown(shutdown);

        let result = pipeline.process(&[link("1")]).await;

        assert!(matches!(result, Err(CrawlError::Interrupted)));
        assert!(repo.products.lock().unwrap().is_empty());
    }
}
