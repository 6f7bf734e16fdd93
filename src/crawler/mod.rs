//! Crawler module for category traversal and product harvesting
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic and session cookies
//! - Category page classification and link extraction
//! - Depth-first category traversal with checkpoints
//! - Listing pagination and the leaf handler feeding the product pipeline
//! - Overall crawl coordination

mod coordinator;
mod extractor;
mod fetcher;
mod listing;
mod pagination;
mod session;
mod throttle;
mod traversal;

pub use coordinator::{run_crawl, Coordinator, RunOptions};
pub use extractor::{Classification, ClassificationError, HtmlLinkExtractor, LinkExtractor};
pub use fetcher::{
    backoff_delay, classify_status, ClientSettings, FetchError, HttpFetcher, PageFetcher,
};
pub use listing::ListingHandler;
pub use pagination::{page_count, parse_item_count, PaginationPlanner, PAGE_SIZE};
pub use session::{NoSession, SessionError, SessionProvider, WarmupSession};
pub use throttle::Throttle;
pub use traversal::{
    run_traversal, CategoryTraversal, LeafCategory, LeafHandler, TraversalOptions,
    TraversalOutcome, TraversalReport,
};
