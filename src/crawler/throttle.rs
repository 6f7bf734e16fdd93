//! Minimum spacing between product requests

use std::time::{Duration, Instant};

/// Enforces a minimum delay between consecutive requests
#[derive(Debug, Clone)]
pub struct Throttle {
    min_delay: Duration,
    last_request_time: Option<Instant>,
}

impl Throttle {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_request_time: None,
        }
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now.
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let elapsed = now.duration_since(last);
        if elapsed < self.min_delay {
            Some(self.min_delay - elapsed)
        } else {
            None
        }
    }

    /// Waits out the remaining delay, then records the request
    pub async fn wait(&mut self) {
        if let Some(remaining) = self.time_until_next_request(Instant::now()) {
            tokio::time::sleep(remaining).await;
        }
        self.last_request_time = Some(Instant::now());
    }
}
