use crate::UrlError;
use url::Url;

/// Query parameters that only track navigation and never change the page
const TRACKING_PARAMS: &[&str] = &[
    "from",
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "yclid",
    "ref",
];

/// Normalizes a category link into the URL that identifies the category
///
/// Two links that point at the same category must produce the same string,
/// otherwise the visited set stops protecting against cycles.
///
/// # Normalization Steps
///
/// 1. Resolve `href` against `base` (absolute hrefs are kept as they are)
/// 2. Reject anything that is not http(s) or has no host
/// 3. Remove dot segments, duplicate slashes and the trailing slash
///    (the root path `/` is kept)
/// 4. Remove the fragment
/// 5. Remove tracking query parameters, sort the rest, drop an empty query
///
/// # Examples
///
/// ```
/// use catalog_crawler::url::normalize_category_url;
/// use url::Url;
///
/// let base = Url::parse("https://www.komus.ru/katalog/c/0/").unwrap();
/// let url = normalize_category_url("/katalog/bumaga/c/1/?from=menu", &base).unwrap();
/// assert_eq!(url.as_str(), "https://www.komus.ru/katalog/bumaga/c/1");
/// ```
pub fn normalize_category_url(href: &str, base: &Url) -> Result<Url, UrlError> {
    let mut url = base
        .join(href.trim())
        .map_err(|e| UrlError::Parse(format!("{}: {}", href, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            let query_string = params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&query_string));
        }
    }

    Ok(url)
}

/// Parses and normalizes an absolute category URL (e.g. the crawl root)
pub fn normalize_absolute_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_category_url(url.as_str(), &url)
}

/// Removes dot segments, empty segments and the trailing slash
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    format!("/{}", segments.join("/"))
}

fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort_by(|a, b| a.0.cmp(&b.0));
    params
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://www.komus.ru/katalog/c/0/").unwrap()
    }

    #[test]
    fn test_resolves_relative_link() {
        let result = normalize_category_url("/katalog/papka/c/12/", &base()).unwrap();
        assert_eq!(result.as_str(), "https://www.komus.ru/katalog/papka/c/12");
    }

    #[test]
    fn test_keeps_absolute_link() {
        let result =
            normalize_category_url("https://www.komus.ru/katalog/ruchki/c/7", &base()).unwrap();
        assert_eq!(result.as_str(), "https://www.komus.ru/katalog/ruchki/c/7");
    }

    #[test]
    fn test_trailing_slash_variants_are_identical() {
        let a = normalize_category_url("/katalog/papka/c/12/", &base()).unwrap();
        let b = normalize_category_url("/katalog/papka/c/12", &base()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_keep_root_slash() {
        let result = normalize_category_url("https://www.komus.ru/", &base()).unwrap();
        assert_eq!(result.as_str(), "https://www.komus.ru/");
    }

    #[test]
    fn test_remove_fragment_and_tracking() {
        let result =
            normalize_category_url("/katalog/c/5/?from=menu-v1&utm_source=x#top", &base())
                .unwrap();
        assert_eq!(result.as_str(), "https://www.komus.ru/katalog/c/5");
    }

    #[test]
    fn test_sort_remaining_query_params() {
        let result = normalize_category_url("/katalog/c/5/?b=2&a=1", &base()).unwrap();
        assert_eq!(result.as_str(), "https://www.komus.ru/katalog/c/5?a=1&b=2");
    }

    #[test]
    fn test_dot_segments_and_double_slashes() {
        let result = normalize_category_url("/katalog//x/../c/9/./", &base()).unwrap();
        assert_eq!(result.as_str(), "https://www.komus.ru/katalog/c/9");
    }

    #[test]
    fn test_lowercases_host() {
        let result = normalize_category_url("https://WWW.KOMUS.RU/Katalog", &base()).unwrap();
        assert_eq!(result.as_str(), "https://www.komus.ru/Katalog");
    }

    #[test]
    fn test_invalid_scheme() {
        let result = normalize_category_url("mailto:shop@komus.ru", &base());
        assert!(matches!(result, Err(UrlError::InvalidScheme(_))));
    }

    #[test]
    fn test_normalize_absolute_url() {
        let result = normalize_absolute_url("https://www.komus.ru/katalog/c/0/?from=menu").unwrap();
        assert_eq!(result.as_str(), "https://www.komus.ru/katalog/c/0");

        assert!(normalize_absolute_url("not a url").is_err());
    }
}
