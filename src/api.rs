//! Text-generation client with exponential backoff retry logic.
//!
//! This module talks to an OpenAI-compatible chat completions endpoint.
//!
//! # Architecture
//!
//! - [`TextGenerator`]: core trait, one chat request in, one completion out
//! - [`OpenAiChat`]: `reqwest` implementation against `/chat/completions`
//! - [`RetryGenerate`]: decorator that retries transient failures of any
//!   [`TextGenerator`]
//!
//! # Retry Strategy
//!
//! Only transient failures are retried (timeouts, connection errors, HTTP 429
//! and 5xx). The delay doubles from `base_delay`, is capped at `max_delay`,
//! and gets 0-250ms of random jitter.

use rand::{Rng, rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

use crate::config::LlmConfig;
use crate::utils::truncate_for_log;

/// Why a completion could not be produced.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("text generation is not configured: {0}")]
    Config(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("response contained no text")]
    Empty,
}

impl GenerationError {
    /// Failures worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::Http(e) => e.is_timeout() || e.is_connect(),
            GenerationError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// A two-message conversation: instructions plus the actual prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
}

/// Something that turns a [`ChatRequest`] into generated text.
pub trait TextGenerator {
    async fn complete(&self, request: &ChatRequest) -> Result<String, GenerationError>;
}

/// OpenAI-compatible chat completions client.
pub struct OpenAiChat {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl OpenAiChat {
    /// Build the client. Fails when no API key is configured; this is the one
    /// error that stops a run before any segment is written.
    pub fn from_config(config: &LlmConfig) -> Result<Self, GenerationError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| GenerationError::Config("OPENAI_API_KEY is not set".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    temperature: f32,
    messages: [WireMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl TextGenerator for OpenAiChat {
    #[instrument(level = "debug", skip_all, fields(model = %self.model))]
    async fn complete(&self, request: &ChatRequest) -> Result<String, GenerationError> {
        let body = CompletionBody {
            model: &self.model,
            temperature: self.temperature,
            messages: [
                WireMessage {
                    role: "system",
                    content: &request.system,
                },
                WireMessage {
                    role: "user",
                    content: &request.user,
                },
            ],
        };

        let t0 = Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&text, 300),
            });
        }

        let raw = response.text().await?;
        let parsed: CompletionResponse = serde_json::from_str(&raw)
            .map_err(|e| GenerationError::Malformed(format!("{e}: {}", truncate_for_log(&raw, 200))))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(GenerationError::Empty)?;

        debug!(elapsed_ms = t0.elapsed().as_millis() as u64, chars = text.len(), "Completion received");
        Ok(text)
    }
}

/// Wrapper that adds exponential backoff retry logic to any [`TextGenerator`].
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..=jitter)
/// ```
pub struct RetryGenerate<T> {
    inner: T,
    max_retries: usize,
    base_delay: Duration,
    max_delay: Duration,
    jitter: Duration,
}

impl<T: TextGenerator> RetryGenerate<T> {
    pub fn new(inner: T, max_retries: usize, base_delay: Duration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(30),
            jitter: Duration::from_millis(250),
        }
    }

    #[cfg(test)]
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    fn delay_for(&self, attempt: usize) -> Duration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter_ms: u64 = rng().random_range(0..=jitter_ms);
        delay + Duration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryGenerate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryGenerate")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T: TextGenerator> TextGenerator for RetryGenerate<T> {
    #[instrument(level = "debug", skip_all)]
    async fn complete(&self, request: &ChatRequest) -> Result<String, GenerationError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            match self.inner.complete(request).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    attempt += 1;
                    if !e.is_transient() || attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                            error = %e,
                            "complete() giving up"
                        );
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        ?delay,
                        error = %e,
                        "complete() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// The production generator: OpenAI chat with the configured retry budget.
pub fn build_generator(config: &LlmConfig) -> Result<RetryGenerate<OpenAiChat>, GenerationError> {
    let chat = OpenAiChat::from_config(config)?;
    Ok(RetryGenerate::new(chat, config.max_retries, Duration::from_millis(500)))
}
