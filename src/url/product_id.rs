use url::Url;

/// Extracts the numeric product identifier (article) from a product URL
///
/// Product pages live under `.../p/<digits>/`; the digits are the article
/// the product is stored under. Returns `None` for any other URL shape.
///
/// # Examples
///
/// ```
/// use catalog_crawler::url::extract_product_id;
///
/// let id = extract_product_id("https://www.komus.ru/katalog/ruchka-x/p/1572674/?from=block");
/// assert_eq!(id.as_deref(), Some("1572674"));
/// assert_eq!(extract_product_id("https://www.komus.ru/katalog/c/0/"), None);
/// ```
pub fn extract_product_id(product_url: &str) -> Option<String> {
    let url = Url::parse(product_url).ok()?;
    let segments: Vec<&str> = url.path_segments()?.collect();

    segments
        .windows(2)
        .find(|pair| {
            pair[0] == "p" && !pair[1].is_empty() && pair[1].chars().all(|c| c.is_ascii_digit())
        })
        .map(|pair| pair[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_id_with_trailing_slash() {
        assert_eq!(
            extract_product_id("https://www.komus.ru/katalog/bumaga/p/47299/").as_deref(),
            Some("47299")
        );
    }

    #[test]
    fn test_extracts_id_without_trailing_slash() {
        assert_eq!(
            extract_product_id("https://www.komus.ru/katalog/bumaga/p/47299").as_deref(),
            Some("47299")
        );
    }

    #[test]
    fn test_ignores_query_string() {
        assert_eq!(
            extract_product_id("https://www.komus.ru/x/p/1/?tabId=specifications").as_deref(),
            Some("1")
        );
    }

    #[test]
    fn test_rejects_non_numeric_id() {
        assert_eq!(extract_product_id("https://www.komus.ru/x/p/abc/"), None);
    }

    #[test]
    fn test_rejects_category_url() {
        assert_eq!(extract_product_id("https://www.komus.ru/katalog/c/10/"), None);
    }

    #[test]
    fn test_rejects_relative_url() {
        assert_eq!(extract_product_id("/katalog/p/123/"), None);
    }
}
