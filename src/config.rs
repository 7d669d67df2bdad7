//! Run configuration.
//!
//! Every endpoint, credential and tunable of the pipeline lives in
//! [`AppConfig`]. Values are layered, lowest precedence first:
//!
//! 1. built-in defaults (`Default` impls below)
//! 2. an optional YAML file passed with `--config`
//! 3. `.env` / process environment / command-line flags (see [`crate::cli`])
//!
//! Secrets have no default and are never compiled in.

use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cli::Cli;
use crate::delivery::retry::RetryPolicy;
use crate::models::TopicList;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Search API settings (GNews-compatible).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Full search URL, e.g. `https://gnews.io/api/v4/search`.
    pub endpoint: String,
    /// Sent as `token`; without it every topic is "no news".
    pub api_key: Option<String>,
    /// `lang` pin.
    pub language: String,
    /// `country` pin.
    pub country: String,
    /// `max`: articles requested per topic.
    pub max_results: u32,
    /// Per-request timeout. Searches are never retried.
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://gnews.io/api/v4/search".to_string(),
            api_key: None,
            language: "pt".to_string(),
            country: "br".to_string(),
            max_results: 3,
            timeout_secs: 30,
        }
    }
}

/// Text-generation service settings (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL without the `/chat/completions` suffix.
    pub base_url: String,
    /// Bearer token; required, the run stops without it.
    pub api_key: Option<String>,
    pub model: String,
    /// Sampling temperature, `0.0..=2.0`.
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Retries on transient failures, on top of the first attempt.
    pub max_retries: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

/// Mail submission settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Submission server, reached with STARTTLS.
    pub smtp_host: String,
    pub smtp_port: u16,
    /// SMTP login.
    pub username: Option<String>,
    /// Application password for `username`.
    pub password: Option<String>,
    /// Sender address; falls back to `username`.
    pub from: Option<String>,
    /// Recipients, comma-separated.
    pub to: Option<String>,
    /// Copy recipients, comma-separated.
    pub cc: Option<String>,
    pub subject: String,
    /// Timeout for the whole SMTP session.
    pub timeout_secs: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            username: None,
            password: None,
            from: None,
            to: None,
            cc: None,
            subject: "📰 Telejornal Diário com IA (GNews + OpenAI)".to_string(),
            timeout_secs: 30,
        }
    }
}

impl EmailConfig {
    pub fn sender(&self) -> Option<&str> {
        self.from.as_deref().or(self.username.as_deref())
    }
}

/// WordPress REST API settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CmsConfig {
    /// Site root; `wp-json/...` paths are joined onto it.
    pub base_url: Option<String>,
    /// Basic-auth user.
    pub username: Option<String>,
    /// WordPress application password for `username`.
    pub app_password: Option<String>,
    /// Sent on every CMS request. Must be a valid header value.
    pub user_agent: String,
    /// Timeout of the API root check.
    pub probe_timeout_secs: u64,
    /// Timeout of the media upload and the post creation.
    pub request_timeout_secs: u64,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            username: None,
            app_password: None,
            user_agent: "newscast-bot/1.3".to_string(),
            probe_timeout_secs: 30,
            request_timeout_secs: 60,
        }
    }
}

/// Cover rendering settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CoverConfig {
    pub title: String,
    /// `None` renders "Edição de dd/mm/yyyy".
    pub subtitle: Option<String>,
    /// Font files tried before the platform candidates, bold face.
    pub bold_fonts: Vec<PathBuf>,
    /// Font files tried before the platform candidates, regular face.
    pub regular_fonts: Vec<PathBuf>,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            title: "NOTÍCIAS DO DIA".to_string(),
            subtitle: None,
            bold_fonts: Vec::new(),
            regular_fonts: Vec::new(),
        }
    }
}

/// CMS retry tuning, in milliseconds so it reads naturally in YAML.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// See [`RetryPolicy::max_retries`].
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(c: &RetryConfig) -> Self {
        RetryPolicy::new(
            c.max_retries,
            Duration::from_millis(c.base_delay_ms),
            Duration::from_millis(c.max_delay_ms),
        )
    }
}

/// Everything a run needs, injected into each stage.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub search: SearchConfig,
    pub llm: LlmConfig,
    pub email: EmailConfig,
    pub cms: CmsConfig,
    pub cover: CoverConfig,
    pub retry: RetryConfig,
    pub topics: TopicList,
}

impl AppConfig {
    /// Parse a YAML document; missing keys keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an optional YAML file, then layer CLI/env values on top.
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match cli.config.as_deref() {
            Some(path) => Self::from_file(path)?,
            None => {
                debug!("No config file given; using built-in defaults");
                AppConfig::default()
            }
        };
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml_str(&yaml)?;
        info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Values given on the command line or in the environment win.
    pub fn apply_cli(&mut self, cli: &Cli) {
        fn set(slot: &mut Option<String>, value: &Option<String>) {
            if let Some(v) = value {
                *slot = Some(v.clone());
            }
        }

        set(&mut self.search.api_key, &cli.gnews_api_key);
        set(&mut self.llm.api_key, &cli.openai_api_key);
        if let Some(model) = &cli.openai_model {
            self.llm.model = model.clone();
        }
        set(&mut self.email.username, &cli.smtp_username);
        set(&mut self.email.password, &cli.smtp_password);
        set(&mut self.email.from, &cli.email_from);
        set(&mut self.email.to, &cli.email_to);
        set(&mut self.email.cc, &cli.email_cc);
        set(&mut self.cms.base_url, &cli.wp_base_url);
        set(&mut self.cms.username, &cli.wp_user);
        set(&mut self.cms.app_password, &cli.wp_app_password);
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.topics.is_empty() {
            return Err(ConfigError::Invalid("topic list is empty".into()));
        }
        if self.search.max_results == 0 {
            return Err(ConfigError::Invalid("search.max_results must be at least 1".into()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid(format!(
                "llm.temperature {} is outside 0.0..=2.0",
                self.llm.temperature
            )));
        }
        if HeaderValue::from_str(&self.cms.user_agent).is_err() {
            return Err(ConfigError::Invalid(format!(
                "cms.user_agent {:?} is not a valid header value",
                self.cms.user_agent
            )));
        }
        Ok(())
    }
}

/// Load a `.env` file if one is present.
///
/// Tries the working directory first, then `~/.config/daily_newscast/.env`.
/// A missing file is fine: the variables may already be in the environment.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => {
            debug!(path = %path.display(), "Loaded .env");
            return;
        }
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "Ignoring unreadable .env in the working directory"),
    }
    if let Some(home) = std::env::var_os("HOME") {
        let path = PathBuf::from(home)
            .join(".config")
            .join("daily_newscast")
            .join(".env");
        if path.exists() {
            if let Err(e) = load_dotenv_file(&path) {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable .env");
            }
        }
    }
}

fn load_dotenv_file(path: &Path) -> Result<(), dotenvy::Error> {
    dotenvy::from_path(path)?;
    debug!(path = %path.display(), "Loaded .env");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    #[test]
    fn test_defaults_have_no_secrets() {
        let config = AppConfig::default();
        assert!(config.search.api_key.is_none());
        assert!(config.llm.api_key.is_none());
        assert!(config.email.password.is_none());
        assert!(config.cms.app_password.is_none());
        assert_eq!(config.topics.len(), 7);
        assert_eq!(config.search.max_results, 3);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
llm:
  model: "gpt-4.1-mini"
cms:
  base_url: "https://news.example.org"
topics:
  - display_title: "💰 Economia"
    search_term: "economia"
"#;
        let config = AppConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.llm.model, "gpt-4.1-mini");
        assert_eq!(config.llm.temperature, 0.3);
        assert_eq!(config.cms.base_url.as_deref(), Some("https://news.example.org"));
        assert_eq!(config.cms.user_agent, "newscast-bot/1.3");
        assert_eq!(config.topics.len(), 1);
        assert_eq!(config.email.smtp_port, 587);
    }

    #[test]
    fn test_empty_topic_list_is_rejected() {
        let err = AppConfig::from_yaml_str("topics: []").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_bad_temperature_is_rejected() {
        let err = AppConfig::from_yaml_str("llm:\n  temperature: 7.5").unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn test_cli_values_override_file_values() {
        let mut config = AppConfig::from_yaml_str(
            "llm:\n  model: from-file\nemail:\n  to: file@example.org\n",
        )
        .unwrap();
        let cli = Cli::parse_from([
            "daily_newscast",
            "--openai-model",
            "from-cli",
            "--email-to",
            "cli@example.org",
            "--wp-user",
            "editor",
        ]);
        config.apply_cli(&cli);
        assert_eq!(config.llm.model, "from-cli");
        assert_eq!(config.email.to.as_deref(), Some("cli@example.org"));
        assert_eq!(config.cms.username.as_deref(), Some("editor"));
    }

    #[test]
    fn test_control_character_in_user_agent_is_rejected() {
        let err = AppConfig::from_yaml_str("cms:\n  user_agent: \"bot/1.3\\n\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("user_agent"));
    }

    #[test]
    fn test_sender_falls_back_to_username() {
        let mut email = EmailConfig {
            username: Some("bot@example.org".into()),
            ..EmailConfig::default()
        };
        assert_eq!(email.sender(), Some("bot@example.org"));
        email.from = Some("redacao@example.org".into());
        assert_eq!(email.sender(), Some("redacao@example.org"));
    }

    #[test]
    fn test_retry_config_converts_to_policy() {
        let policy = RetryPolicy::from(&RetryConfig::default());
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_malformed_dotenv_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "NEWSCAST_TEST_UNCLOSED=\"never closed").unwrap();
        assert!(load_dotenv_file(file.path()).is_err());
    }

    #[test]
    fn test_dotenv_file_sets_variables() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "NEWSCAST_TEST_DOTENV_VALUE=from-file").unwrap();
        load_dotenv_file(file.path()).unwrap();
        assert_eq!(std::env::var("NEWSCAST_TEST_DOTENV_VALUE").unwrap(), "from-file");
    }

    #[test]
    fn test_missing_file_reports_path() {
        let cli = Cli::parse_from(["daily_newscast", "--config", "/nonexistent/newscast.yaml"]);
        let err = AppConfig::load(&cli).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/newscast.yaml"));
    }
}
