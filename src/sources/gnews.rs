//! GNews search API source.
//!
//! Queries `/api/v4/search` pinned to one language and country, capped at a
//! few results and filtered server-side with `from=<today>`. The first result
//! whose `publishedAt` starts with today's ISO date wins.
//!
//! `publishedAt` is whatever timezone the API reports (UTC in practice) while
//! `as_of` is the run's local date; the comparison is a plain string prefix.

use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::HeadlineSource;
use crate::config::SearchConfig;
use crate::models::Headline;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("search API key is not configured")]
    MissingKey,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("search API returned HTTP {0}")]
    Status(u16),
    #[error("malformed search response: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    title: Option<String>,
    description: Option<String>,
    #[serde(rename = "publishedAt", default)]
    published_at: Option<String>,
}

/// Client for a GNews-compatible search endpoint.
#[derive(Debug)]
pub struct GNewsSource {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    language: String,
    country: String,
    max_results: u32,
}

impl GNewsSource {
    pub fn new(config: &SearchConfig) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let api_key = config.api_key.clone().filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            warn!("GNEWS_API_KEY is not set; every segment will fall back to the no-news placeholder");
        }
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            language: config.language.clone(),
            country: config.country.clone(),
            max_results: config.max_results,
        })
    }

    /// One search call with its failure spelled out.
    async fn search(&self, search_term: &str, as_of: NaiveDate) -> Result<Option<Headline>, SourceError> {
        let api_key = self.api_key.as_deref().ok_or(SourceError::MissingKey)?;
        let from = as_of.format("%Y-%m-%d").to_string();
        let max = self.max_results.to_string();

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", search_term),
                ("lang", self.language.as_str()),
                ("country", self.country.as_str()),
                ("max", max.as_str()),
                ("from", from.as_str()),
                ("token", api_key),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let parsed: SearchResponse = serde_json::from_str(&body)?;
        debug!(results = parsed.articles.len(), "Search results received");
        Ok(select_same_day(parsed.articles, as_of))
    }
}

/// First article published on `as_of`, by ISO date prefix of `publishedAt`.
fn select_same_day(articles: Vec<Article>, as_of: NaiveDate) -> Option<Headline> {
    let day = as_of.format("%Y-%m-%d").to_string();
    articles
        .into_iter()
        .find(|a| a.published_at.as_deref().is_some_and(|p| p.starts_with(&day)))
        .map(|a| match a.title {
            Some(title) => Headline::new(title, a.description),
            None => Headline::absent(),
        })
}

impl HeadlineSource for GNewsSource {
    #[instrument(level = "info", skip_all, fields(%search_term, %as_of))]
    async fn fetch(&self, search_term: &str, as_of: NaiveDate) -> Headline {
        match self.search(search_term, as_of).await {
            Ok(Some(headline)) => {
                info!(title = headline.title.as_deref().unwrap_or(""), "Found same-day headline");
                headline
            }
            Ok(None) => {
                info!("No same-day article for this term");
                Headline::absent()
            }
            Err(e) => {
                warn!(error = %e, "Search failed; treating as no news");
                Headline::absent()
            }
        }
    }
}
