//! WordPress sink.
//!
//! Three calls against the REST API, all through one [`RetryingClient`]:
//!
//! 1. `GET  wp-json/`            unauthenticated probe, logged and otherwise ignored
//! 2. `POST wp-json/wp/v2/media` cover upload, best effort
//! 3. `POST wp-json/wp/v2/posts` the post itself
//!
//! A failed cover never stops the post; it is only left without
//! `featured_media`. The post call is the one step that can fail the sink.

use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use url::Url;

use super::retry::{RetryPolicy, RetryingClient};
use super::{DeliveryError, Sink};
use crate::config::CmsConfig;
use crate::cover::CoverRenderer;
use crate::models::{Script, SinkKind};
use crate::utils::truncate_for_log;

const API_ROOT: &str = "wp-json/";
const MEDIA_PATH: &str = "wp-json/wp/v2/media";
const POSTS_PATH: &str = "wp-json/wp/v2/posts";
const LOG_BODY_MAX: usize = 800;

#[derive(Debug, Deserialize)]
struct MediaResponse {
    id: u64,
}

#[derive(Debug, Default, Deserialize)]
struct CreatedPost {
    id: Option<u64>,
    link: Option<String>,
}

/// JSON body of the post-create call.
#[derive(Debug, Serialize)]
struct PostPayload {
    title: String,
    content: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    featured_media: Option<u64>,
}

/// Base URL and credentials, checked at delivery time.
struct Target {
    base: Url,
    username: String,
    password: String,
}

/// Publishes the script as a WordPress post with a generated cover.
#[derive(Debug)]
pub struct WordPressPublisher<R> {
    http: RetryingClient,
    config: CmsConfig,
    cover: R,
}

impl<R: CoverRenderer> WordPressPublisher<R> {
    /// Build the pooled client. Credentials are only checked when publishing.
    pub fn new(config: CmsConfig, policy: RetryPolicy, cover: R) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            http: RetryingClient::new(client, policy),
            config,
            cover,
        })
    }

    fn target(&self) -> Result<Target, DeliveryError> {
        let missing = |what: &str| DeliveryError::Config(format!("CMS {what} missing"));
        let raw = self.config.base_url.as_deref().ok_or_else(|| missing("base URL (WP_BASE_URL)"))?;
        let username = self.config.username.clone().ok_or_else(|| missing("user (WP_USER)"))?;
        let password = self
            .config
            .app_password
            .clone()
            .ok_or_else(|| missing("application password (WP_APP_PASSWORD)"))?;

        // Trailing slash so `join` appends instead of replacing the last segment.
        let base = Url::parse(&format!("{}/", raw.trim_end_matches('/')))
            .map_err(|e| DeliveryError::Config(format!("invalid CMS base URL {raw:?}: {e}")))?;
        Ok(Target {
            base,
            username,
            password,
        })
    }

    fn endpoint(target: &Target, path: &str) -> Result<Url, DeliveryError> {
        target
            .base
            .join(path)
            .map_err(|e| DeliveryError::Config(format!("cannot build {path} URL: {e}")))
    }

    fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.config.probe_timeout_secs)
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.request_timeout_secs)
    }

    /// Diagnostic only: the outcome never changes what happens next.
    async fn probe(&self, target: &Target) {
        let url = match Self::endpoint(target, API_ROOT) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Skipping API probe");
                return;
            }
        };
        let timeout = self.probe_timeout();
        match self.http.send("probe", |c| c.get(url.clone()).timeout(timeout)).await {
            Ok(response) => info!(%url, status = response.status().as_u16(), "CMS API probe"),
            Err(e) => warn!(%url, error = %e, "CMS API probe failed"),
        }
    }

    /// Render and upload the cover; returns the media id.
    async fn upload_cover(&self, target: &Target) -> Result<u64, DeliveryError> {
        let cover = self.cover.render()?;
        let url = Self::endpoint(target, MEDIA_PATH)?;
        let disposition = format!("attachment; filename=\"{}\"", cover.filename);
        let timeout = self.request_timeout();

        let response = self
            .http
            .send("media upload", |c| {
                let mut part_headers = HeaderMap::new();
                part_headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));
                let part = Part::bytes(cover.bytes.clone())
                    .file_name(cover.filename.clone())
                    .headers(part_headers);
                c.post(url.clone())
                    .basic_auth(&target.username, Some(&target.password))
                    .header(CONTENT_DISPOSITION, disposition.as_str())
                    .timeout(timeout)
                    .multipart(Form::new().part("file", part))
            })
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body, LOG_BODY_MAX),
            });
        }
        let media: MediaResponse = serde_json::from_str(&body).map_err(|e| {
            DeliveryError::Malformed(format!("media response: {e}: {}", truncate_for_log(&body, LOG_BODY_MAX)))
        })?;
        Ok(media.id)
    }

    async fn create_post(&self, target: &Target, payload: &PostPayload) -> Result<CreatedPost, DeliveryError> {
        let url = Self::endpoint(target, POSTS_PATH)?;
        let timeout = self.request_timeout();

        let response = self
            .http
            .send("post create", |c| {
                c.post(url.clone())
                    .basic_auth(&target.username, Some(&target.password))
                    .timeout(timeout)
                    .json(payload)
            })
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let body = truncate_for_log(&body, LOG_BODY_MAX);
            error!(status = status.as_u16(), %body, "Post creation rejected");
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }
        // A 2xx is a published post even if the body is not what we expect.
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }
}

impl<R: CoverRenderer> Sink for WordPressPublisher<R> {
    fn kind(&self) -> SinkKind {
        SinkKind::Cms
    }

    #[instrument(level = "info", skip_all, fields(date = %script.date))]
    async fn deliver(&self, script: &Script) -> Result<String, DeliveryError> {
        let target = self.target()?;
        self.probe(&target).await;

        let featured_media = match self.upload_cover(&target).await {
            Ok(id) => {
                info!(media_id = id, "Cover uploaded");
                Some(id)
            }
            Err(e) => {
                warn!(error = %e, "Cover upload failed; publishing without featured image");
                None
            }
        };

        let payload = PostPayload {
            title: script.post_title(),
            content: script.to_html(),
            status: "publish",
            featured_media,
        };
        let post = self.create_post(&target, &payload).await?;
        info!(post_id = ?post.id, link = ?post.link, ?featured_media, "Post published");

        let mut detail = match (post.id, post.link) {
            (_, Some(link)) => format!("published {link}"),
            (Some(id), None) => format!("published post {id}"),
            (None, None) => "published".to_string(),
        };
        if featured_media.is_none() {
            detail.push_str(" (without cover)");
        }
        Ok(detail)
    }
}
