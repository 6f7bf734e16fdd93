use serde::Deserialize;

/// Main configuration structure for catalog-crawler
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub supplier: SupplierConfig,
}

/// Target site locations
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Catalog page the traversal starts from
    #[serde(rename = "root-url")]
    pub root_url: String,

    /// Base of the product JSON API (e.g. `https://www.komus.ru/api`)
    #[serde(rename = "api-base-url")]
    pub api_base_url: String,

    /// Optional path segment inserted before the page parameter of listing URLs
    #[serde(rename = "listing-filter", default)]
    pub listing_filter: Option<String>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Persist crawl state after every N completed leaf categories
    #[serde(rename = "checkpoint-interval", default = "default_checkpoint_interval")]
    pub checkpoint_interval: u32,

    /// Delay between product requests (milliseconds)
    #[serde(rename = "product-delay-ms", default = "default_product_delay_ms")]
    pub product_delay_ms: u64,

    /// Maximum number of leaf categories to process (unbounded if absent)
    #[serde(rename = "category-limit", default)]
    pub category_limit: Option<u64>,

    /// Maximum number of products taken from each leaf category
    #[serde(rename = "product-limit", default)]
    pub product_limit: Option<usize>,

    /// Attempts per request before giving up
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay of the exponential backoff (milliseconds)
    #[serde(rename = "retry-base-delay-ms", default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Timeout of a single HTTP request (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: default_checkpoint_interval(),
            product_delay_ms: default_product_delay_ms(),
            category_limit: None,
            product_limit: None,
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Session cookie handling
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Page requested to obtain fresh session cookies (root URL if absent)
    #[serde(rename = "warmup-url", default)]
    pub warmup_url: Option<String>,

    /// Session lifetime before a proactive refresh (minutes)
    #[serde(rename = "max-age-minutes", default = "default_session_max_age")]
    pub max_age_minutes: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            warmup_url: None,
            max_age_minutes: default_session_max_age(),
        }
    }
}

/// CSS selectors used to classify category pages
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    /// Links to subcategories
    #[serde(rename = "category-link", default = "default_category_link")]
    pub category_link: String,

    /// Links to product detail pages on a listing
    #[serde(rename = "product-link", default = "default_product_link")]
    pub product_link: String,

    /// Element holding the advertised number of items in a category
    #[serde(rename = "item-count", default = "default_item_count")]
    pub item_count: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            category_link: default_category_link(),
            product_link: default_product_link(),
            item_count: default_item_count(),
        }
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// JSON file used when the database cannot store the crawl state
    #[serde(rename = "state-file")]
    pub state_file: String,

    /// Key of the crawl state document
    #[serde(rename = "session-id", default = "default_session_id")]
    pub session_id: String,
}

/// Supplier identity attached to every product
#[derive(Debug, Clone, Deserialize)]
pub struct SupplierConfig {
    #[serde(default = "default_supplier_name")]
    pub name: String,

    #[serde(default = "default_supplier_phone")]
    pub phone: String,
}

impl Default for SupplierConfig {
    fn default() -> Self {
        Self {
            name: default_supplier_name(),
            phone: default_supplier_phone(),
        }
    }
}

fn default_checkpoint_interval() -> u32 {
    5
}

fn default_product_delay_ms() -> u64 {
    3000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_session_max_age() -> u64 {
    120
}

fn default_category_link() -> String {
    "li.categories__subcategory a.categories__link".to_string()
}

fn default_product_link() -> String {
    "a.product-plain__name".to_string()
}

fn default_item_count() -> String {
    "span.catalog__header-sup".to_string()
}

fn default_session_id() -> String {
    "catalog_crawl_state".to_string()
}

fn default_supplier_name() -> String {
    "komus".to_string()
}

fn default_supplier_phone() -> String {
    "8 (495) 651-651-1".to_string()
}
