//! Resumable depth-first category traversal
//!
//! The traversal walks the category tree from a root URL with an explicit
//! work stack. Every category is fetched and classified:
//!
//! | Classification | Action |
//! |----------------|--------|
//! | Leaf | Hand to the [`LeafHandler`] unless already processed |
//! | Branch | Descend into each subcategory, in page order |
//! | Dead end | Nothing |
//!
//! Progress lives in a [`CrawlState`] that is checkpointed every
//! `checkpoint_interval` completed leaves, on interruption and on any error
//! escaping the walk. A category that was entered but still has pending work
//! is kept in `CrawlState::unfinished`, so a resumed run re-enters exactly
//! the branches that need it and skips everything else.

use crate::crawler::extractor::{Classification, LinkExtractor};
use crate::crawler::fetcher::PageFetcher;
use crate::state::{CrawlState, StateStore};
use crate::url::normalize_absolute_url;
use crate::{CrawlError, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;

/// A leaf category ready to be processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafCategory {
    /// Normalized category URL
    pub url: String,
    /// Item count shown on the category page
    pub total_items: Option<u64>,
}

/// Processes the products of a leaf category
#[async_trait]
pub trait LeafHandler: Send {
    /// Handles one leaf and returns the number of products persisted
    ///
    /// `sequence` is the 1-based number of this leaf across the whole crawl,
    /// including leaves processed by earlier runs. Returning
    /// [`CrawlError::Interrupted`] stops the traversal; any other error is
    /// logged and the leaf is retried on the next run.
    async fn handle_leaf(&mut self, category: &LeafCategory, sequence: u64) -> Result<usize>;
}

/// Traversal tuning
#[derive(Debug, Clone, Copy)]
pub struct TraversalOptions {
    /// Maximum number of leaf categories for the whole crawl
    pub category_limit: Option<u64>,
    /// Checkpoint after this many completed leaves
    pub checkpoint_interval: u32,
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self {
            category_limit: None,
            checkpoint_interval: 5,
        }
    }
}

/// How a traversal ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalOutcome {
    /// Every reachable category was visited
    Completed,
    /// The category limit was reached
    Halted,
}

/// Summary of a traversal run
#[derive(Debug, Clone)]
pub struct TraversalReport {
    pub outcome: TraversalOutcome,
    /// Leaves processed across all runs of this crawl
    pub categories_processed: u64,
    /// Products persisted across all runs of this crawl
    pub products_processed: u64,
    /// Leaves processed by this run
    pub leaves_handled: u64,
    /// Leaves whose handler failed in this run
    pub failed_leaves: u64,
    /// Categories that could not be fetched in this run
    pub failed_fetches: u64,
    /// True if the crawl finished and its persisted state was removed
    pub state_cleared: bool,
    /// Progress at the end of the run
    pub state: CrawlState,
}

enum Frame {
    /// Enter a category. `index` is its position among its siblings.
    Visit {
        url: String,
        depth: usize,
        index: usize,
    },
    /// All children of a branch have been walked
    Close {
        url: String,
        depth: usize,
        children: Vec<String>,
    },
}

/// Mutable bookkeeping of one run
struct Walk {
    state: CrawlState,
    category_limit: Option<u64>,
    /// categories_processed_count when the run started
    prior_count: u64,
    /// Handler invocations in this run
    invocations: u64,
    leaves_handled: u64,
    failed_leaves: u64,
    failed_fetches: u64,
    since_checkpoint: u32,
    /// Categories entered in this run
    seen: HashSet<String>,
    /// Branches whose subtree is being walked
    open_path: HashSet<String>,
    /// Children of the root, in page order
    top_children: Vec<String>,
}

impl Walk {
    fn new(state: CrawlState, category_limit: Option<u64>) -> Self {
        let prior_count = state.categories_processed_count;
        Self {
            state,
            category_limit,
            prior_count,
            invocations: 0,
            leaves_handled: 0,
            failed_leaves: 0,
            failed_fetches: 0,
            since_checkpoint: 0,
            seen: HashSet::new(),
            open_path: HashSet::new(),
            top_children: Vec::new(),
        }
    }

    fn budget_reached(&self) -> bool {
        self.category_limit
            .map_or(false, |limit| self.prior_count + self.invocations >= limit)
    }

    fn should_skip(&self, url: &str, depth: usize, index: usize) -> bool {
        (depth == 1 && index < self.state.resume_cursor)
            || self.seen.contains(url)
            || self.state.is_settled(url)
    }

    /// Returns true if a child needs nothing more from its parent
    fn child_settled(&self, child: &str, child_depth: usize, index: usize) -> bool {
        (child_depth == 1 && index < self.state.resume_cursor)
            || self.open_path.contains(child)
            || self.state.is_settled(child)
    }

    /// Moves the resume cursor past settled top-level children
    fn advance_cursor(&mut self) {
        let mut cursor = self.state.resume_cursor;
        while cursor < self.top_children.len() && self.state.is_settled(&self.top_children[cursor])
        {
            cursor += 1;
        }
        self.state.advance_cursor(cursor);
    }
}

/// Depth-first category walker
pub struct CategoryTraversal<'a> {
    fetcher: &'a dyn PageFetcher,
    extractor: &'a dyn LinkExtractor,
    store: &'a dyn StateStore,
    options: TraversalOptions,
    shutdown: Option<Arc<AtomicBool>>,
}

impl<'a> CategoryTraversal<'a> {
    pub fn new(
        fetcher: &'a dyn PageFetcher,
        extractor: &'a dyn LinkExtractor,
        store: &'a dyn StateStore,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            store,
            options: TraversalOptions::default(),
            shutdown: None,
        }
    }

    pub fn with_options(mut self, options: TraversalOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets a flag that stops the traversal between categories
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown
            .as_ref()
            .map_or(false, |flag| flag.load(Ordering::SeqCst))
    }

    /// Walks the tree below `root`, resuming from `prior_state` if given
    ///
    /// # Returns
    ///
    /// * `Ok(TraversalReport)` - The walk completed or stopped at the category limit
    /// * `Err(CrawlError::Interrupted)` - Shutdown was requested; state was checkpointed
    /// * `Err(CrawlError)` - The root could not be fetched; state was checkpointed
    pub async fn run(
        &self,
        root: &str,
        handler: &mut dyn LeafHandler,
        prior_state: Option<CrawlState>,
    ) -> Result<TraversalReport> {
        let root = normalize_absolute_url(root)?.to_string();
        let mut walk = Walk::new(
            prior_state.unwrap_or_default(),
            self.options.category_limit,
        );

        if walk.prior_count > 0 || !walk.state.visited.is_empty() {
            info!(
                "Resuming crawl: {} categories done, cursor at {}",
                walk.prior_count, walk.state.resume_cursor
            );
        }

        let outcome = match self.walk(&root, handler, &mut walk).await {
            Ok(outcome) => outcome,
            Err(e) => {
                match &e {
                    CrawlError::Interrupted => warn!("Crawl interrupted, saving progress"),
                    other => error!("Crawl stopped: {}", other),
                }
                self.checkpoint(&mut walk.state);
                return Err(e);
            }
        };

        let mut state_cleared = false;
        if outcome == TraversalOutcome::Completed && walk.state.unfinished.is_empty() {
            match self.store.clear() {
                Ok(()) => state_cleared = true,
                Err(e) => error!("Could not clear crawl state: {}", e),
            }
        } else {
            self.checkpoint(&mut walk.state);
        }

        info!(
            "Traversal {:?}: {} leaves this run, {} total, {} failed leaves, {} failed fetches",
            outcome,
            walk.leaves_handled,
            walk.state.categories_processed_count,
            walk.failed_leaves,
            walk.failed_fetches
        );

        Ok(TraversalReport {
            outcome,
            categories_processed: walk.state.categories_processed_count,
            products_processed: walk.state.products_processed_count,
            leaves_handled: walk.leaves_handled,
            failed_leaves: walk.failed_leaves,
            failed_fetches: walk.failed_fetches,
            state_cleared,
            state: walk.state,
        })
    }

    async fn walk(
        &self,
        root: &str,
        handler: &mut dyn LeafHandler,
        walk: &mut Walk,
    ) -> Result<TraversalOutcome> {
        let mut stack = vec![Frame::Visit {
            url: root.to_string(),
            depth: 0,
            index: 0,
        }];

        while let Some(frame) = stack.pop() {
            if self.is_shutdown() {
                return Err(CrawlError::Interrupted);
            }

            let (url, depth, index) = match frame {
                Frame::Close {
                    url,
                    depth,
                    children,
                } => {
                    // A branch listing itself does not wait on itself
                    let settled = children.iter().enumerate().all(|(i, child)| {
                        child == &url || walk.child_settled(child, depth + 1, i)
                    });
                    walk.open_path.remove(&url);
                    if settled {
                        walk.state.mark_settled(&url);
                    }
                    if depth == 1 {
                        walk.advance_cursor();
                    }
                    continue;
                }
                Frame::Visit { url, depth, index } => (url, depth, index),
            };

            if depth > 0 && walk.should_skip(&url, depth, index) {
                debug!("Skipping {}", url);
                if depth == 1 {
                    walk.advance_cursor();
                }
                continue;
            }

            if depth > 0 && walk.budget_reached() {
                info!("Category limit reached, stopping traversal");
                return Ok(TraversalOutcome::Halted);
            }

            walk.seen.insert(url.clone());
            walk.state.mark_visited(&url);

            debug!("Fetching category {} (depth {})", url, depth);
            let content = match self.fetcher.fetch(&url).await {
                Ok(content) => content,
                Err(e) if depth == 0 => return Err(e.into()),
                Err(e) => {
                    error!("Abandoning category {}: {}", url, e);
                    walk.failed_fetches += 1;
                    if depth == 1 {
                        walk.advance_cursor();
                    }
                    continue;
                }
            };
            walk.state.mark_unfinished(&url);

            let classification = self.classify(&url, &content);

            if classification.is_leaf {
                if walk.state.is_processed_leaf(&url) {
                    debug!("Leaf {} already processed", url);
                    walk.state.mark_settled(&url);
                } else if walk.budget_reached() {
                    info!("Category limit reached, stopping traversal");
                    return Ok(TraversalOutcome::Halted);
                } else {
                    let leaf = LeafCategory {
                        url: url.clone(),
                        total_items: classification.total_items,
                    };
                    self.handle_leaf(&leaf, handler, walk).await?;
                }
            } else if classification.subcategory_links.is_empty() {
                debug!("Dead end: {}", url);
                walk.state.mark_settled(&url);
            } else {
                let children = classification.subcategory_links;
                debug!("{} has {} subcategories", url, children.len());

                walk.open_path.insert(url.clone());
                stack.push(Frame::Close {
                    url,
                    depth,
                    children: children.clone(),
                });
                for (i, child) in children.iter().enumerate().rev() {
                    stack.push(Frame::Visit {
                        url: child.clone(),
                        depth: depth + 1,
                        index: i,
                    });
                }
                if depth == 0 {
                    walk.top_children = children;
                    walk.advance_cursor();
                }
                continue;
            }

            if depth == 1 {
                walk.advance_cursor();
            }
        }

        Ok(TraversalOutcome::Completed)
    }

    /// Classifies a page; unclassifiable pages are dead ends
    fn classify(&self, url: &str, content: &str) -> Classification {
        let page_url = match Url::parse(url) {
            Ok(u) => u,
            Err(e) => {
                warn!("Treating {} as a dead end: {}", url, e);
                return Classification::default();
            }
        };

        match self.extractor.classify(content, &page_url) {
            Ok(classification) => classification,
            Err(e) => {
                let error = CrawlError::Classification {
                    url: url.to_string(),
                    message: e.to_string(),
                };
                warn!("{}, treating as a dead end", error);
                Classification::default()
            }
        }
    }

    async fn handle_leaf(
        &self,
        leaf: &LeafCategory,
        handler: &mut dyn LeafHandler,
        walk: &mut Walk,
    ) -> Result<()> {
        walk.invocations += 1;
        let sequence = walk.prior_count + walk.invocations;
        info!("Processing leaf category #{}: {}", sequence, leaf.url);

        match handler.handle_leaf(leaf, sequence).await {
            Ok(products) => {
                walk.state.record_leaf(&leaf.url, products);
                walk.leaves_handled += 1;
                walk.since_checkpoint += 1;
                info!("Leaf {} done: {} products", leaf.url, products);

                if walk.since_checkpoint >= self.options.checkpoint_interval.max(1) {
                    self.checkpoint(&mut walk.state);
                    walk.since_checkpoint = 0;
                }
                Ok(())
            }
            Err(CrawlError::Interrupted) => Err(CrawlError::Interrupted),
            Err(e) => {
                error!("Leaf category {} failed: {}", leaf.url, e);
                walk.failed_leaves += 1;
                Ok(())
            }
        }
    }

    /// Saves progress; a failing store only costs durability
    fn checkpoint(&self, state: &mut CrawlState) {
        match self.store.save(state) {
            Ok(()) => debug!(
                "Checkpoint saved: {} categories, cursor {}",
                state.categories_processed_count, state.resume_cursor
            ),
            Err(e) => error!("Could not save crawl state, continuing in memory: {}", e),
        }
    }
}

/// Runs a traversal and returns the cumulative number of processed leaves
///
/// Convenience wrapper around [`CategoryTraversal::run`].
pub async fn run_traversal(
    fetcher: &dyn PageFetcher,
    extractor: &dyn LinkExtractor,
    store: &dyn StateStore,
    root: &str,
    handler: &mut dyn LeafHandler,
    budget: Option<u64>,
    prior_state: Option<CrawlState>,
) -> Result<u64> {
    let options = TraversalOptions {
        category_limit: budget,
        ..TraversalOptions::default()
    };

    let report = CategoryTraversal::new(fetcher, extractor, store)
        .with_options(options)
        .run(root, handler, prior_state)
        .await?;

    Ok(report.categories_processed)
}
