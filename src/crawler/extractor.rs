//! Category page classification and link extraction
//!
//! A category page is one of three things:
//! - a branch, listing links to subcategories
//! - a leaf, listing products (and usually an item count)
//! - a dead end, with neither

use crate::config::SelectorConfig;
use crate::crawler::pagination::parse_item_count;
use crate::url::normalize_category_url;
use crate::ConfigError;
use scraper::{Html, Selector};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// What a category page turned out to be
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
    pub is_leaf: bool,
    /// Normalized subcategory URLs in page order, without duplicates
    pub subcategory_links: Vec<String>,
    /// Item count from the category header, if present and parseable
    pub total_items: Option<u64>,
}

impl Classification {
    pub fn is_dead_end(&self) -> bool {
        !self.is_leaf && self.subcategory_links.is_empty()
    }
}

/// A page that could not be classified
#[derive(Debug, Error)]
pub enum ClassificationError {
    #[error("page has no content")]
    EmptyPage,
}

/// Turns category page content into a classification and product links
pub trait LinkExtractor: Send + Sync {
    fn classify(&self, content: &str, page_url: &Url)
        -> Result<Classification, ClassificationError>;

    /// Returns absolute product links in page order
    fn extract_product_links(&self, content: &str, page_url: &Url) -> Vec<String>;
}

/// CSS-selector based extractor
pub struct HtmlLinkExtractor {
    category_link: Selector,
    product_link: Selector,
    item_count: Selector,
}

impl HtmlLinkExtractor {
    pub fn new(selectors: &SelectorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            category_link: parse_selector(&selectors.category_link)?,
            product_link: parse_selector(&selectors.product_link)?,
            item_count: parse_selector(&selectors.item_count)?,
        })
    }
}

/// Link targets of the elements matching `selector`
fn hrefs<'a>(document: &'a Html, selector: &'a Selector) -> impl Iterator<Item = &'a str> + 'a {
    document
        .select(selector)
        .filter_map(|element| element.value().attr("href"))
        .map(str::trim)
        .filter(|href| !is_ignored_href(href))
}

fn parse_selector(selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("{}: {:?}", selector, e)))
}

/// Hrefs that never point at a page
fn is_ignored_href(href: &str) -> bool {
    href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
}

impl LinkExtractor for HtmlLinkExtractor {
    fn classify(
        &self,
        content: &str,
        page_url: &Url,
    ) -> Result<Classification, ClassificationError> {
        if content.trim().is_empty() {
            return Err(ClassificationError::EmptyPage);
        }

        let document = Html::parse_document(content);
        let own_url = normalize_category_url(page_url.as_str(), page_url)
            .map(|u| u.to_string())
            .ok();

        let mut seen = HashSet::new();
        let subcategory_links: Vec<String> = hrefs(&document, &self.category_link)
            .filter_map(|href| normalize_category_url(href, page_url).ok())
            .map(|u| u.to_string())
            .filter(|u| own_url.as_deref() != Some(u.as_str()))
            .filter(|u| seen.insert(u.clone()))
            .collect();

        let count_element = document.select(&self.item_count).next();
        let total_items = count_element
            .as_ref()
            .and_then(|e| parse_item_count(&e.text().collect::<String>()));

        let has_products = hrefs(&document, &self.product_link).next().is_some();
        let is_leaf = subcategory_links.is_empty() && (has_products || count_element.is_some());

        Ok(Classification {
            is_leaf,
            subcategory_links: if is_leaf { Vec::new() } else { subcategory_links },
            total_items,
        })
    }

    fn extract_product_links(&self, content: &str, page_url: &Url) -> Vec<String> {
        let document = Html::parse_document(content);

        hrefs(&document, &self.product_link)
            .filter_map(|href| page_url.join(href).ok())
            .filter(|u| u.scheme() == "http" || u.scheme() == "https")
            .map(|mut u| {
                u.set_fragment(None);
                u.to_string()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> HtmlLinkExtractor {
        HtmlLinkExtractor::new(&SelectorConfig::default()).unwrap()
    }

    fn page_url() -> Url {
        Url::parse("https://shop.test/katalog/c/0/").unwrap()
    }

    #[test]
    fn test_branch_page() {
        let html = r#"
            <div class="categories__item"><ul>
              <li class="categories__subcategory"><a class="categories__link" href="/katalog/bumaga/c/1/">Бумага</a></li>
              <li class="categories__subcategory"><a class="categories__link" href="/katalog/ruchki/c/2/?from=menu">Ручки</a></li>
              <li class="categories__subcategory"><a class="categories__link" href="/katalog/bumaga/c/1">Бумага</a></li>
              <li class="categories__subcategory"><a class="categories__link" href="/katalog/c/0/">Все</a></li>
            </ul></div>"#;

        let result = extractor().classify(html, &page_url()).unwrap();

        assert!(!result.is_leaf);
        assert_eq!(
            result.subcategory_links,
            vec![
                "https://shop.test/katalog/bumaga/c/1",
                "https://shop.test/katalog/ruchki/c/2",
            ]
        );
    }

    #[test]
    fn test_leaf_page() {
        let html = r#"
            <h1>Ручки <span class="catalog__header-sup">65</span></h1>
            <a class="product-plain__name" href="/katalog/ruchki/p/100001/">Ручка</a>"#;

        let result = extractor().classify(html, &page_url()).unwrap();

        assert!(result.is_leaf);
        assert!(result.subcategory_links.is_empty());
        assert_eq!(result.total_items, Some(65));
    }

    #[test]
    fn test_leaf_without_count() {
        let html = r#"<a class="product-plain__name" href="/p/1/">Ручка</a>"#;
        let result = extractor().classify(html, &page_url()).unwrap();
        assert!(result.is_leaf);
        assert_eq!(result.total_items, None);
    }

    #[test]
    fn test_dead_end() {
        let html = "<html><body><p>Раздел пуст</p></body></html>";
        let result = extractor().classify(html, &page_url()).unwrap();
        assert!(result.is_dead_end());
    }

    #[test]
    fn test_empty_page_is_error() {
        assert!(matches!(
            extractor().classify("  ", &page_url()),
            Err(ClassificationError::EmptyPage)
        ));
    }

    #[test]
    fn test_product_links_are_absolute() {
        let html = r##"
            <a class="product-plain__name js-product-variant-name" href="/katalog/ruchki/p/100001/#reviews">A</a>
            <a class="product-plain__name" href="javascript:void(0)">B</a>
            <a class="product-plain__name" href="https://shop.test/katalog/ruchki/p/100002/">C</a>"##;

        let links = extractor().extract_product_links(html, &page_url());

        assert_eq!(
            links,
            vec![
                "https://shop.test/katalog/ruchki/p/100001/",
                "https://shop.test/katalog/ruchki/p/100002/",
            ]
        );
    }
}
