//! Listing page planning
//!
//! Category listings show a fixed number of products per page. Given the
//! item count printed in the category header, [`PaginationPlanner`] works
//! out how many listing pages exist and builds their URLs.

use url::Url;

/// Products shown per listing page
pub const PAGE_SIZE: u64 = 30;

/// Number of listing pages for an item count
///
/// A missing count still yields one page, so a leaf is always read at least
/// once.
pub fn page_count(total_items: Option<u64>) -> u64 {
    match total_items {
        Some(total) => total.div_ceil(PAGE_SIZE).max(1),
        None => 1,
    }
}

/// Parses an item count such as `"1 234"` or `"65"`
///
/// Digits separated by ordinary or non-breaking spaces are joined; any other
/// character makes the count unparseable.
pub fn parse_item_count(text: &str) -> Option<u64> {
    let digits: String = text
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}' && *c != '\u{202f}')
        .collect();

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    digits.parse().ok()
}

/// Builds listing page URLs for a leaf category
#[derive(Debug, Clone, Default)]
pub struct PaginationPlanner {
    /// Optional path segment inserted before the page query, e.g.
    /// `f/stocklevelstatus=instock`
    listing_filter: Option<String>,
}

impl PaginationPlanner {
    pub fn new(listing_filter: Option<String>) -> Self {
        let listing_filter = listing_filter
            .map(|f| f.trim_matches('/').to_string())
            .filter(|f| !f.is_empty());
        Self { listing_filter }
    }

    /// Returns the zero-based listing page URLs for a category
    pub fn page_urls(&self, category: &Url, total_items: Option<u64>) -> Vec<String> {
        let mut base = category.clone();
        base.set_query(None);
        base.set_fragment(None);
        let base = base.as_str().trim_end_matches('/').to_string();

        let prefix = match &self.listing_filter {
            Some(filter) => format!("{}/{}/", base, filter),
            None => format!("{}/", base),
        };

        (0..page_count(total_items))
            .map(|page| format!("{}?page={}", prefix, page))
            .collect()
    }
}
