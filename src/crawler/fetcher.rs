//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building cookie-aware HTTP clients with proper user agent strings
//! - GET requests for category pages, listings and the product API
//! - Empty-body POST requests for the price API
//! - Retry logic with exponential backoff for transient failures
//! - Session refresh when the site denies access
//! - Error classification

use crate::config::Config;
use crate::crawler::session::SessionProvider;
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::{Client, Method, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// A failed fetch
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Worth retrying: rate limiting, access denied, server errors, timeouts
    #[error("Transient failure fetching {url}: {reason}")]
    Transient {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    /// Retrying will not help: missing page, client errors, bad URLs
    #[error("Permanent failure fetching {url}: {reason}")]
    Permanent {
        url: String,
        status: Option<u16>,
        reason: String,
    },
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Transient { url, .. } | Self::Permanent { url, .. } => url,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transient { status, .. } | Self::Permanent { status, .. } => *status,
        }
    }

    /// Returns true if the site refused the request and a new session may help
    pub fn is_access_denied(&self) -> bool {
        matches!(self.status(), Some(403 | 429 | 503))
    }
}

/// Fetches raw page content
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Settings shared by every HTTP client the crawler builds
#[derive(Debug, Clone)]
pub struct ClientSettings {
    user_agent: String,
    timeout: Duration,
}

impl ClientSettings {
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            user_agent: user_agent.into(),
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.user_agent.header_value(),
            Duration::from_secs(config.crawler.request_timeout_secs),
        )
    }

    /// Builds an HTTP client that keeps its cookies in `jar`
    ///
    /// # Returns
    ///
    /// * `Ok(Client)` - Successfully built HTTP client
    /// * `Err(reqwest::Error)` - Failed to build client
    pub fn build(&self, jar: Arc<Jar>) -> Result<Client, reqwest::Error> {
        Client::builder()
            .user_agent(self.user_agent.as_str())
            .timeout(self.timeout)
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .cookie_provider(jar)
            .build()
    }
}

/// Maps a non-success HTTP status to a fetch error
///
/// | Status | Result |
/// |--------|--------|
/// | 403, 429, 503 | Transient, access denied (session refresh) |
/// | Other 5xx | Transient |
/// | 404, other 4xx | Permanent |
pub fn classify_status(url: &str, status: StatusCode) -> FetchError {
    let code = status.as_u16();
    let reason = format!("HTTP {}", code);

    if status.is_server_error()
        || status == StatusCode::FORBIDDEN
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        FetchError::Transient {
            url: url.to_string(),
            status: Some(code),
            reason,
        }
    } else {
        FetchError::Permanent {
            url: url.to_string(),
            status: Some(code),
            reason,
        }
    }
}

fn classify_network_error(url: &str, error: &reqwest::Error) -> FetchError {
    if error.is_timeout() || error.is_connect() || error.is_request() || error.is_body() {
        FetchError::Transient {
            url: url.to_string(),
            status: None,
            reason: error.to_string(),
        }
    } else {
        FetchError::Permanent {
            url: url.to_string(),
            status: None,
            reason: error.to_string(),
        }
    }
}

/// Delay before retry number `attempt` (zero-based): `base * 2^attempt`
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// reqwest-backed fetcher with retries and session handling
pub struct HttpFetcher {
    session: Arc<dyn SessionProvider>,
    max_attempts: u32,
    base_delay: Duration,
}

impl HttpFetcher {
    pub fn new(session: Arc<dyn SessionProvider>, max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            session,
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &Config, session: Arc<dyn SessionProvider>) -> Self {
        Self::new(
            session,
            config.crawler.max_retries,
            Duration::from_millis(config.crawler.retry_base_delay_ms),
        )
    }

    /// Issues a GET request
    pub async fn get(&self, url: &str) -> Result<String, FetchError> {
        self.request(Method::GET, url).await
    }

    /// Issues a POST request with an empty body
    pub async fn post_empty(&self, url: &str) -> Result<String, FetchError> {
        self.request(Method::POST, url).await
    }

    async fn request(&self, method: Method, url: &str) -> Result<String, FetchError> {
        let mut attempt = 0;

        loop {
            let error = match self.send_once(method.clone(), url).await {
                Ok(body) => return Ok(body),
                Err(e) => e,
            };

            attempt += 1;
            if !error.is_transient() || attempt >= self.max_attempts {
                return Err(error);
            }

            if error.is_access_denied() {
                if let Err(e) = self.session.refresh().await {
                    warn!("Session refresh failed: {}", e);
                }
            }

            let delay = backoff_delay(self.base_delay, attempt - 1);
            warn!(
                "{} (attempt {}/{}), retrying in {:?}",
                error, attempt, self.max_attempts, delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn send_once(&self, method: Method, url: &str) -> Result<String, FetchError> {
        let client = self
            .session
            .client()
            .await
            .map_err(|e| FetchError::Transient {
                url: url.to_string(),
                status: None,
                reason: e.to_string(),
            })?;

        let mut request = client.request(method.clone(), url);
        if method == Method::POST {
            request = request.body(Vec::new());
        }

        debug!("{} {}", method, url);
        let response = request
            .send()
            .await
            .map_err(|e| classify_network_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(url, status));
        }

        response
            .text()
            .await
            .map_err(|e| classify_network_error(url, &e))
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.get(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::session::{NoSession, SessionError, WarmupSession};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct CountingSession {
        client: Client,
        refreshes: AtomicUsize,
    }

    #[async_trait]
    impl SessionProvider for CountingSession {
        async fn client(&self) -> Result<Client, SessionError> {
            Ok(self.client.clone())
        }

        async fn refresh(&self) -> Result<(), SessionError> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn fetcher(session: Arc<dyn SessionProvider>, attempts: u32) -> HttpFetcher {
        HttpFetcher::new(session, attempts, Duration::from_millis(1))
    }

    fn no_session() -> Arc<dyn SessionProvider> {
        Arc::new(NoSession::new(Client::new()))
    }

    #[test]
    fn test_classify_status() {
        let url = "https://shop.test/";
        assert!(classify_status(url, StatusCode::FORBIDDEN).is_transient());
        assert!(classify_status(url, StatusCode::TOO_MANY_REQUESTS).is_transient());
        assert!(classify_status(url, StatusCode::SERVICE_UNAVAILABLE).is_access_denied());
        assert!(classify_status(url, StatusCode::BAD_GATEWAY).is_transient());
        assert!(!classify_status(url, StatusCode::BAD_GATEWAY).is_access_denied());
        assert!(!classify_status(url, StatusCode::NOT_FOUND).is_transient());
        assert!(!classify_status(url, StatusCode::BAD_REQUEST).is_transient());
    }

    #[test]
    fn test_backoff_doubles() {
        let base = Duration::from_millis(1000);
        assert_eq!(backoff_delay(base, 0), Duration::from_millis(1000));
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(2000));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(4000));
    }

    #[tokio::test]
    async fn test_get_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let body = fetcher(no_session(), 3)
            .fetch(&format!("{}/page", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<html></html>");
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = fetcher(no_session(), 3)
            .fetch(&server.uri())
            .await
            .unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(err.status(), Some(404));
    }

    #[tokio::test]
    async fn test_access_denied_refreshes_session_and_gives_up() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let session = Arc::new(CountingSession {
            client: Client::new(),
            refreshes: AtomicUsize::new(0),
        });
        let err = fetcher(session.clone(), 3)
            .fetch(&server.uri())
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(session.refreshes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_post_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/priceBlock/42"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .mount(&server)
            .await;

        let body = fetcher(no_session(), 1)
            .post_empty(&format!("{}/api/priceBlock/42", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "{}");
    }

    #[tokio::test]
    async fn test_retry_sends_cookie_set_by_failed_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).append_header("set-cookie", "sid=old; Path=/"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header("cookie", "sid=old"))
            .respond_with(ResponseTemplate::new(502).append_header("set-cookie", "sid=new; Path=/"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header("cookie", "sid=new"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let session = Arc::new(WarmupSession::new(
            ClientSettings::new("TestCrawler/1.0", Duration::from_secs(5)),
            format!("{}/", server.uri()),
            Duration::from_secs(600),
        ));
        let body = fetcher(session, 2)
            .fetch(&format!("{}/page", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "ok");
    }
}
