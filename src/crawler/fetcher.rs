//! HTTP fetcher with throttling and retry
//!
//! This module handles every request the harvester makes, including:
//! - Picking an identity from the pool for the whole retry sequence
//! - Sleeping the throttle delay before each attempt
//! - Classifying responses into success, rate limit and generic errors
//! - Cooling down or backing off between attempts

use crate::config::RetryConfig;
use crate::crawler::identity::IdentityPool;
use crate::crawler::throttle::{AdaptiveThrottle, ErrorSignal};
use crate::{FetchError, FetchFailure};
use rand::Rng;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;

/// Rate-limit cooldown, in time units, multiplied by the attempt number
pub const RATE_LIMIT_COOLDOWN_UNITS: u32 = 10;

/// Bounds of the randomized backoff after a generic error, in time units
pub const BACKOFF_UNITS: (f64, f64) = (2.0, 5.0);

/// Throttled, retrying page fetcher shared by discovery and the workers
#[derive(Debug, Clone)]
pub struct Fetcher {
    identities: Arc<IdentityPool>,
    throttle: Arc<AdaptiveThrottle>,
    max_attempts: u32,
    time_unit: Duration,
}

impl Fetcher {
    pub fn new(
        identities: Arc<IdentityPool>,
        throttle: Arc<AdaptiveThrottle>,
        retry: &RetryConfig,
    ) -> Self {
        Self {
            identities,
            throttle,
            max_attempts: retry.max_attempts.max(1),
            time_unit: retry.time_unit(),
        }
    }

    pub fn throttle(&self) -> &Arc<AdaptiveThrottle> {
        &self.throttle
    }

    pub fn identities(&self) -> &Arc<IdentityPool> {
        &self.identities
    }

    /// Fetches a URL with full retry logic
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 2xx | record success, return body |
    /// | HTTP 429 | rate-limit signal, cool down `attempt * 10` units |
    /// | other status | generic error, back off 2–5 units |
    /// | transport failure | generic error, back off 2–5 units |
    ///
    /// The throttle delay is slept before every attempt. Nothing is slept
    /// after the final attempt.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - The page body
    /// * `Err(FetchFailure)` - Every attempt failed; carries the last error
    pub async fn fetch(&self, url: &str) -> Result<String, FetchFailure> {
        let identity = self.identities.assign();
        let mut last = FetchError::Transport("no attempt made".to_string());

        for attempt in 1..=self.max_attempts {
            tokio::time::sleep(self.throttle.delay_before_next()).await;

            let error = match fetch_once(identity.client(), url).await {
                Ok(body) => {
                    self.throttle.record_success();
                    return Ok(body);
                }
                Err(e) => e,
            };

            let is_last = attempt == self.max_attempts;
            match &error {
                FetchError::RateLimited => {
                    self.throttle.record_error(ErrorSignal::RateLimited);
                    if !is_last {
                        let cooldown = self.time_unit * (attempt * RATE_LIMIT_COOLDOWN_UNITS);
                        tracing::warn!(
                            "Rate limited on {} (attempt {}), cooling down {:.1}s",
                            url,
                            attempt,
                            cooldown.as_secs_f64()
                        );
                        tokio::time::sleep(cooldown).await;
                    }
                }
                FetchError::Transport(_) | FetchError::UnexpectedStatus(_) => {
                    self.throttle.record_error(ErrorSignal::Generic);
                    tracing::warn!("Fetch error for {} (attempt {}): {}", url, attempt, error);
                    if !is_last {
                        tokio::time::sleep(self.backoff()).await;
                    }
                }
            }

            last = error;
        }

        Err(FetchFailure {
            url: url.to_string(),
            attempts: self.max_attempts,
            last,
        })
    }

    fn backoff(&self) -> Duration {
        let (low, high) = BACKOFF_UNITS;
        self.time_unit.mul_f64(rand::rng().random_range(low..=high))
    }
}

/// Performs a single GET and classifies the outcome
pub async fn fetch_once(client: &Client, url: &str) -> Result<String, FetchError> {
    let response = client.get(url).send().await.map_err(classify_transport)?;
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(FetchError::RateLimited);
    }

    if !status.is_success() {
        return Err(FetchError::UnexpectedStatus(status.as_u16()));
    }

    response.text().await.map_err(classify_transport)
}

fn classify_transport(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Transport("request timeout".to_string())
    } else if e.is_connect() {
        FetchError::Transport(format!("connection failed: {}", e))
    } else {
        FetchError::Transport(e.to_string())
    }
}
