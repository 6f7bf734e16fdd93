use crate::config::types::{
    Config, CrawlerConfig, SelectorConfig, SessionConfig, SiteConfig, StorageConfig,
    UserAgentConfig,
};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_session_config(&config.session)?;
    validate_selectors(&config.selectors)?;
    validate_storage_config(&config.storage)?;
    Ok(())
}

/// Validates the target site locations
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    validate_http_url("root-url", &config.root_url)?;
    validate_http_url("api-base-url", &config.api_base_url)?;

    if let Some(filter) = &config.listing_filter {
        if filter.trim_matches('/').is_empty() {
            return Err(ConfigError::Validation(
                "listing-filter cannot be empty when present".to_string(),
            ));
        }
        if filter.contains('?') || filter.contains('#') {
            return Err(ConfigError::Validation(format!(
                "listing-filter must be a path segment, got '{}'",
                filter
            )));
        }
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.checkpoint_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "checkpoint-interval must be >= 1, got {}",
            config.checkpoint_interval
        )));
    }

    if config.max_retries < 1 || config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be between 1 and 10, got {}",
            config.max_retries
        )));
    }

    if config.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "request-timeout-secs must be >= 1, got {}",
            config.request_timeout_secs
        )));
    }

    if config.category_limit == Some(0) {
        return Err(ConfigError::Validation(
            "category-limit must be >= 1 when present".to_string(),
        ));
    }

    if config.product_limit == Some(0) {
        return Err(ConfigError::Validation(
            "product-limit must be >= 1 when present".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler-name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact-url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

fn validate_session_config(config: &SessionConfig) -> Result<(), ConfigError> {
    if let Some(warmup) = &config.warmup_url {
        validate_http_url("warmup-url", warmup)?;
    }

    if config.max_age_minutes < 1 {
        return Err(ConfigError::Validation(
            "session max-age-minutes must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Checks that every selector parses
fn validate_selectors(config: &SelectorConfig) -> Result<(), ConfigError> {
    for (name, selector) in [
        ("category-link", &config.category_link),
        ("product-link", &config.product_link),
        ("item-count", &config.item_count),
    ] {
        Selector::parse(selector).map_err(|e| {
            ConfigError::InvalidSelector(format!("{} '{}': {:?}", name, selector, e))
        })?;
    }
    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    if config.state_file.is_empty() {
        return Err(ConfigError::Validation(
            "state-file cannot be empty".to_string(),
        ));
    }

    if config.session_id.is_empty() {
        return Err(ConfigError::Validation(
            "session-id cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_http_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            name, value
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact-email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !parts[1].contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
