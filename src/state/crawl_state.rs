use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Persisted traversal progress
///
/// A snapshot of this struct is what makes a crawl resumable. Category URLs
/// stored here are always normalized, so set membership is identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlState {
    /// Every category URL a fetch was attempted for
    #[serde(default)]
    pub visited: BTreeSet<String>,

    /// Leaf categories whose handler completed
    #[serde(default)]
    pub processed_leaf_categories: BTreeSet<String>,

    /// Categories entered whose work is not yet settled
    ///
    /// A branch stays here while part of its subtree is pending, and a leaf
    /// stays here until its handler succeeds. Resume re-enters these even
    /// though they are in `visited`.
    #[serde(default)]
    pub unfinished: BTreeSet<String>,

    /// Index of the first top-level child that still needs work
    #[serde(default)]
    pub resume_cursor: usize,

    #[serde(default)]
    pub categories_processed_count: u64,

    #[serde(default)]
    pub products_processed_count: u64,

    pub started_at: DateTime<Utc>,

    /// Stamped by the state store on every save
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl CrawlState {
    /// Creates an empty state for a new crawl
    pub fn new() -> Self {
        Self {
            visited: BTreeSet::new(),
            processed_leaf_categories: BTreeSet::new(),
            unfinished: BTreeSet::new(),
            resume_cursor: 0,
            categories_processed_count: 0,
            products_processed_count: 0,
            started_at: Utc::now(),
            last_updated: None,
        }
    }

    /// Records a fetch attempt for a category
    pub fn mark_visited(&mut self, url: &str) {
        self.visited.insert(url.to_string());
    }

    /// Records that a category was fetched and still has work pending
    pub fn mark_unfinished(&mut self, url: &str) {
        self.unfinished.insert(url.to_string());
    }

    /// Records that nothing remains to do for a category
    pub fn mark_settled(&mut self, url: &str) {
        self.unfinished.remove(url);
    }

    /// Records a completed leaf and the products it persisted
    pub fn record_leaf(&mut self, url: &str, products: usize) {
        self.processed_leaf_categories.insert(url.to_string());
        self.unfinished.remove(url);
        self.categories_processed_count += 1;
        self.products_processed_count += products as u64;
    }

    /// Advances the top-level cursor; it never moves backwards
    pub fn advance_cursor(&mut self, index: usize) {
        if index > self.resume_cursor {
            self.resume_cursor = index;
        }
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn is_processed_leaf(&self, url: &str) -> bool {
        self.processed_leaf_categories.contains(url)
    }

    pub fn is_unfinished(&self, url: &str) -> bool {
        self.unfinished.contains(url)
    }

    /// Returns true if a category needs no further work on resume
    pub fn is_settled(&self, url: &str) -> bool {
        self.is_processed_leaf(url) || (self.is_visited(url) && !self.is_unfinished(url))
    }
}

impl Default for CrawlState {
    fn default() -> Self {
        Self::new()
    }
}
