//! catalog-crawler: a resumable e-commerce catalog crawler
//!
//! This crate walks a catalog site's category tree depth-first, finds the
//! leaf categories that list products, pages through their listings, pulls
//! product details from the site's JSON API and upserts them into a SQLite
//! document store. Traversal progress is checkpointed so an interrupted
//! crawl resumes where it stopped.

pub mod config;
pub mod crawler;
pub mod output;
pub mod product;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for catalog-crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Could not classify {url}: {message}")]
    Classification { url: String, message: String },

    #[error("No product identifier in {url}")]
    UnidentifiableProduct { url: String },

    #[error("Extraction error: {0}")]
    Extraction(#[from] product::ExtractionError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("State store error: {0}")]
    StateStore(#[from] state::StateStoreError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crawl interrupted")]
    Interrupted,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for catalog-crawler operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_traversal, CategoryTraversal, TraversalOptions, TraversalReport};
pub use product::Product;
pub use state::CrawlState;
pub use url::{extract_product_id, normalize_category_url};
