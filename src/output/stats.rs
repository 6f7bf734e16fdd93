//! Statistics generation from the crawl database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::product::PRODUCT_COLLECTION;
use crate::state::{CrawlState, StateStore};
use crate::storage::{RunRecord, Storage};
use crate::Result;

/// Number of runs shown by `--stats`
pub const RECENT_RUN_LIMIT: usize = 10;

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Products stored in the database
    pub total_products: u64,

    /// Most recent runs, newest first
    pub recent_runs: Vec<RunRecord>,

    /// Saved progress of an unfinished crawl
    pub pending_state: Option<CrawlState>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `state_store` - Where an unfinished crawl keeps its progress
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(CrawlError)` - Failed to query statistics
pub fn load_statistics(
    storage: &dyn Storage,
    state_store: &dyn StateStore,
) -> Result<CrawlStatistics> {
    Ok(CrawlStatistics {
        total_products: storage.count_documents(PRODUCT_COLLECTION)?,
        recent_runs: storage.recent_runs(RECENT_RUN_LIMIT)?,
        pending_state: state_store.load()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("Overview:");
    println!("  Products stored: {}", stats.total_products);
    println!();

    match &stats.pending_state {
        Some(state) => {
            println!("Unfinished Crawl:");
            println!("  Started: {}", state.started_at.to_rfc3339());
            if let Some(updated) = state.last_updated {
                println!("  Last checkpoint: {}", updated.to_rfc3339());
            }
            println!("  Categories visited: {}", state.visited.len());
            println!(
                "  Leaf categories processed: {}",
                state.categories_processed_count
            );
            println!("  Products processed: {}", state.products_processed_count);
            println!("  Resume cursor: {}", state.resume_cursor);
        }
        None => println!("No unfinished crawl"),
    }
    println!();

    if stats.recent_runs.is_empty() {
        println!("No crawl runs recorded");
        return;
    }

    println!("Recent Runs ({}):", stats.recent_runs.len());
    for run in &stats.recent_runs {
        println!(
            "  #{} {} [{}] categories: {}, products: {}",
            run.id,
            run.started_at,
            run.status.to_db_string(),
            run.categories_processed,
            run.products_processed
        );
    }
}
