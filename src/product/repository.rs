use crate::product::model::Product;
use crate::storage::{lock_storage, Storage, StorageResult, WriteOutcome};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Collection holding products, keyed by article
pub const PRODUCT_COLLECTION: &str = "products";

/// Persists products keyed by article
pub trait ProductRepository: Send + Sync {
    /// Inserts the product or replaces the stored one with the same article
    fn upsert(&self, product: &Product) -> StorageResult<WriteOutcome>;
}

/// Product repository on top of the document store
pub struct DocumentProductRepository<S> {
    storage: Arc<Mutex<S>>,
}

impl<S: Storage> DocumentProductRepository<S> {
    pub fn new(storage: Arc<Mutex<S>>) -> Self {
        Self { storage }
    }

    /// Loads a stored product
    pub fn get(&self, article: &str) -> StorageResult<Option<Product>> {
        let doc = lock_storage(&self.storage)?.get_document(PRODUCT_COLLECTION, article)?;
        match doc {
            Some(doc) => Ok(Some(serde_json::from_value(doc.body)?)),
            None => Ok(None),
        }
    }

    pub fn count(&self) -> StorageResult<u64> {
        lock_storage(&self.storage)?.count_documents(PRODUCT_COLLECTION)
    }
}

impl<S: Storage + Send> ProductRepository for DocumentProductRepository<S> {
    /// Keeps the `created_at` of a product that is already stored
    fn upsert(&self, product: &Product) -> StorageResult<WriteOutcome> {
        let mut storage = lock_storage(&self.storage)?;

        let mut body = serde_json::to_value(product)?;
        if let Some(existing) = storage.get_document(PRODUCT_COLLECTION, &product.article)? {
            if let Some(created_at) = existing.body.get("created_at") {
                body["created_at"] = created_at.clone();
            }
        }

        let outcome = storage.put_document(PRODUCT_COLLECTION, &product.article, &body)?;
        match outcome {
            WriteOutcome::Inserted => info!("Saved product {}", product.article),
            WriteOutcome::Updated => info!("Updated product {}", product.article),
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;
    use chrono::{Duration, Utc};

    fn repository() -> DocumentProductRepository<SqliteStorage> {
        DocumentProductRepository::new(Arc::new(Mutex::new(
            SqliteStorage::new_in_memory().unwrap(),
        )))
    }

    fn product(article: &str, title: &str) -> Product {
        let mut product = Product::empty(article);
        product.title = title.to_string();
        product
    }

    #[test]
    fn test_upsert_by_article() {
        let repo = repository();

        assert_eq!(
            repo.upsert(&product("1", "Ручка")).unwrap(),
            WriteOutcome::Inserted
        );
        assert_eq!(
            repo.upsert(&product("1", "Ручка синяя")).unwrap(),
            WriteOutcome::Updated
        );
        repo.upsert(&product("2", "Карандаш")).unwrap();

        assert_eq!(repo.count().unwrap(), 2);
        assert_eq!(repo.get("1").unwrap().unwrap().title, "Ручка синяя");
    }

    #[test]
    fn test_update_keeps_created_at() {
        let repo = repository();

        let mut first = product("7", "Степлер");
        first.created_at = Utc::now() - Duration::days(3);
        repo.upsert(&first).unwrap();

        repo.upsert(&product("7", "Степлер №24")).unwrap();

        let stored = repo.get("7").unwrap().unwrap();
        assert_eq!(stored.title, "Степлер №24");
        assert_eq!(stored.created_at, first.created_at);
    }

    #[test]
    fn test_get_missing() {
        assert!(repository().get("404").unwrap().is_none());
    }
}
