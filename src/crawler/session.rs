//! Session handling for sites that gate pages behind cookies
//!
//! A session is an HTTP client with its own cookie jar. Every response that
//! passes through the client updates the jar, so cookies the site sets or
//! rotates later are sent back without any extra work. The fetcher asks its
//! [`SessionProvider`] for the current client before every request and asks
//! it to refresh when the site answers with an access-denied status.

use crate::crawler::fetcher::ClientSettings;
use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Errors raised while obtaining a session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Warm-up request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Warm-up page {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

/// Supplies the client for the current session and can renew it on demand
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Returns the client carrying the current session cookies
    async fn client(&self) -> Result<Client, SessionError>;

    /// Discards the current session and obtains a new one
    async fn refresh(&self) -> Result<(), SessionError>;
}

/// Provider for sites that need no session
pub struct NoSession {
    client: Client,
}

impl NoSession {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SessionProvider for NoSession {
    async fn client(&self) -> Result<Client, SessionError> {
        Ok(self.client.clone())
    }

    async fn refresh(&self) -> Result<(), SessionError> {
        Ok(())
    }
}

struct ActiveSession {
    client: Client,
    started_at: Instant,
}

/// Obtains cookies by loading a warm-up page
///
/// Each session gets a fresh cookie jar seeded by the warm-up response. The
/// session is replaced once it is older than `max_age` or a refresh is
/// requested.
pub struct WarmupSession {
    settings: ClientSettings,
    warmup_url: String,
    max_age: Duration,
    current: Mutex<Option<ActiveSession>>,
}

impl WarmupSession {
    pub fn new(settings: ClientSettings, warmup_url: impl Into<String>, max_age: Duration) -> Self {
        Self {
            settings,
            warmup_url: warmup_url.into(),
            max_age,
            current: Mutex::new(None),
        }
    }

    fn new_client(&self) -> Result<Client, SessionError> {
        Ok(self.settings.build(Arc::new(Jar::default()))?)
    }

    async fn warm_up(&self) -> Result<ActiveSession, SessionError> {
        let client = self.new_client()?;

        debug!("Loading warm-up page {}", self.warmup_url);
        let response = client.get(&self.warmup_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SessionError::Status {
                url: self.warmup_url.clone(),
                status: status.as_u16(),
            });
        }

        Ok(ActiveSession {
            client,
            started_at: Instant::now(),
        })
    }
}

#[async_trait]
impl SessionProvider for WarmupSession {
    /// Falls back to a client without cookies if the warm-up fails; the next
    /// request tries again
    async fn client(&self) -> Result<Client, SessionError> {
        let mut current = self.current.lock().await;

        if let Some(session) = current.as_ref() {
            if session.started_at.elapsed() < self.max_age {
                return Ok(session.client.clone());
            }
        }

        match self.warm_up().await {
            Ok(session) => {
                let client = session.client.clone();
                *current = Some(session);
                Ok(client)
            }
            Err(e) => {
                warn!("Could not establish session: {}", e);
                *current = None;
                self.new_client()
            }
        }
    }

    async fn refresh(&self) -> Result<(), SessionError> {
        let mut current = self.current.lock().await;
        *current = None;
        let session = self.warm_up().await?;
        info!("Session refreshed");
        *current = Some(session);
        Ok(())
    }
}
