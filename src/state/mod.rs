//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: the serializable traversal progress (visited categories,
//!   processed leaves, resume cursor, counters)
//! - `StateStore`: single-snapshot persistence, with document, file and
//!   fallback implementations

mod crawl_state;
mod store;

pub use crawl_state::CrawlState;
pub use store::{
    DocumentStateStore, FallbackStateStore, FileStateStore, MemoryStateStore, StateStore,
    StateStoreError, StateStoreResult, STATE_COLLECTION,
};
