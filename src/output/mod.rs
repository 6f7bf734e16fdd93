//! Output module for crawl reports
//!
//! This module handles reading crawl statistics back out of the database
//! and printing them for the `--stats` mode.

pub mod stats;

pub use stats::{load_statistics, print_statistics, CrawlStatistics, RECENT_RUN_LIMIT};
