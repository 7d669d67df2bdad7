//! HTTP retry policy for the CMS sink.
//!
//! One pooled [`reqwest::Client`] is shared by every CMS call. Each call gets
//! the first attempt plus up to `max_retries` retries when the server answers
//! 429 or 5xx, or when the connection fails or times out. GET and POST are
//! both retried. Any other response (including other 4xx) is handed straight
//! back to the caller.
//!
//! # Backoff
//!
//! ```text
//! delay(retry) = min(base_delay * 2^(retry-1), max_delay)
//! ```
//!
//! A `Retry-After: <seconds>` header on 429/503 replaces the computed delay
//! when it is not longer than `max_delay`.

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; `3` means at most 4 requests.
    pub max_retries: u32,
    /// Delay before the first retry; doubles for each one after.
    pub base_delay: Duration,
    /// Upper bound for any single delay, including `Retry-After`.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), Duration::from_secs(30))
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << shift).min(self.max_delay)
    }

    /// 429 and every 5xx.
    pub fn is_retryable_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    fn is_retryable_error(e: &reqwest::Error) -> bool {
        e.is_connect() || e.is_timeout()
    }

    fn retry_after(&self, response: &Response) -> Option<Duration> {
        let status = response.status();
        if status != StatusCode::TOO_MANY_REQUESTS && status != StatusCode::SERVICE_UNAVAILABLE {
            return None;
        }
        response
            .headers()
            .get(RETRY_AFTER)?
            .to_str()
            .ok()?
            .trim()
            .parse::<u64>()
            .ok()
            .map(Duration::from_secs)
            .filter(|d| *d <= self.max_delay)
    }
}

/// A pooled client that applies a [`RetryPolicy`] to every call.
#[derive(Debug, Clone)]
pub struct RetryingClient {
    client: Client,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    /// Send the request produced by `build`, rebuilding it for every attempt.
    ///
    /// Returns the last response even when its status is still retryable;
    /// deciding what a non-2xx means is left to the caller.
    #[instrument(level = "debug", skip_all, fields(%label))]
    pub async fn send<F>(&self, label: &str, build: F) -> Result<Response, reqwest::Error>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let t0 = Instant::now();
        let mut retries = 0u32;

        loop {
            let result = build(&self.client).send().await;
            let can_retry = retries < self.policy.max_retries;

            let delay = match &result {
                Ok(response) if can_retry && RetryPolicy::is_retryable_status(response.status()) => {
                    let delay = self
                        .policy
                        .retry_after(response)
                        .unwrap_or_else(|| self.policy.delay_for(retries + 1));
                    warn!(
                        %label,
                        status = response.status().as_u16(),
                        retry = retries + 1,
                        max = self.policy.max_retries,
                        ?delay,
                        "Retryable status; backing off"
                    );
                    Some(delay)
                }
                Err(e) if can_retry && RetryPolicy::is_retryable_error(e) => {
                    let delay = self.policy.delay_for(retries + 1);
                    warn!(
                        %label,
                        error = %e,
                        retry = retries + 1,
                        max = self.policy.max_retries,
                        ?delay,
                        "Request failed; backing off"
                    );
                    Some(delay)
                }
                _ => None,
            };

            match delay {
                Some(delay) => {
                    retries += 1;
                    sleep(delay).await;
                }
                None => {
                    debug!(%label, retries, elapsed_ms = t0.elapsed().as_millis() as u64, "Request finished");
                    return result;
                }
            }
        }
    }
}
