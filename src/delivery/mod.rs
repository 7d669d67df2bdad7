//! Delivery of the assembled script.
//!
//! Each [`Sink`] consumes the same [`Script`] independently. The
//! [`Dispatcher`] runs them one after the other and turns every outcome into
//! a [`PublishResult`]; a failing sink never stops the next one.

pub mod cms;
pub mod email;
pub mod retry;

use thiserror::Error;
use tracing::{error, info, instrument};

use crate::cover::CoverError;
use crate::models::{PublishResult, Script, SinkKind};

pub use cms::WordPressPublisher;
pub use email::SmtpMailer;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("not configured: {0}")]
    Config(String),
    #[error("invalid message: {0}")]
    Message(String),
    #[error("SMTP error: {0}")]
    Smtp(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("cover rendering failed: {0}")]
    Cover(#[from] CoverError),
}

/// A terminal delivery channel.
pub trait Sink {
    fn kind(&self) -> SinkKind;

    /// Deliver `script`; the `Ok` string is a short human-readable detail.
    async fn deliver(&self, script: &Script) -> Result<String, DeliveryError>;
}

/// Runs the enabled sinks in order: email first, then CMS.
#[derive(Debug)]
pub struct Dispatcher<E, C> {
    email: Option<E>,
    cms: Option<C>,
    /// Sinks that could not be set up; reported after the others.
    unavailable: Vec<PublishResult>,
}

impl<E: Sink, C: Sink> Dispatcher<E, C> {
    /// `None` disables a sink; it then does not appear in the results.
    pub fn new(email: Option<E>, cms: Option<C>) -> Self {
        Self {
            email,
            cms,
            unavailable: Vec::new(),
        }
    }

    /// Report `sink` as failed with `error` without running it.
    pub fn with_unavailable(mut self, sink: SinkKind, error: DeliveryError) -> Self {
        self.unavailable.push(PublishResult {
            sink,
            ok: false,
            detail: error.to_string(),
        });
        self
    }

    #[instrument(level = "info", skip_all, fields(date = %script.date))]
    pub async fn dispatch(&self, script: &Script) -> Vec<PublishResult> {
        let mut results = Vec::with_capacity(2);
        if let Some(email) = &self.email {
            info!("[2/3] Sending email");
            results.push(run_sink(email, script).await);
        }
        if let Some(cms) = &self.cms {
            info!("[3/3] Publishing to CMS");
            results.push(run_sink(cms, script).await);
        }
        for failed in &self.unavailable {
            error!(sink = %failed.sink, detail = %failed.detail, "Sink unavailable");
            results.push(failed.clone());
        }
        results
    }
}

async fn run_sink<S: Sink>(sink: &S, script: &Script) -> PublishResult {
    let sink_kind = sink.kind();
    match sink.deliver(script).await {
        Ok(detail) => {
            info!(sink = %sink_kind, %detail, "Delivered");
            PublishResult {
                sink: sink_kind,
                ok: true,
                detail,
            }
        }
        Err(e) => {
            error!(sink = %sink_kind, error = %e, "Delivery failed");
            PublishResult {
                sink: sink_kind,
                ok: false,
                detail: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Segment, SegmentBody};
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubSink {
        kind: SinkKind,
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubSink {
        fn new(kind: SinkKind, fail: bool) -> Self {
            Self {
                kind,
                fail,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Sink for StubSink {
        fn kind(&self) -> SinkKind {
            self.kind
        }

        async fn deliver(&self, script: &Script) -> Result<String, DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(script.segments.len(), 1);
            if self.fail {
                Err(DeliveryError::Smtp("535 authentication failed".into()))
            } else {
                Ok("done".into())
            }
        }
    }

    fn script() -> Script {
        Script {
            date: NaiveDate::from_ymd_opt(2025, 5, 6).unwrap(),
            title: "📆 Telejornal – 06/05/2025".into(),
            segments: vec![Segment {
                heading: "h".into(),
                body: SegmentBody::NoNews,
            }],
        }
    }

    #[tokio::test]
    async fn test_failing_email_does_not_stop_cms() {
        let dispatcher = Dispatcher::new(
            Some(StubSink::new(SinkKind::Email, true)),
            Some(StubSink::new(SinkKind::Cms, false)),
        );

        let results = dispatcher.dispatch(&script()).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].sink, SinkKind::Email);
        assert!(!results[0].ok);
        assert!(results[0].detail.contains("535"));
        assert_eq!(
            results[1],
            PublishResult {
                sink: SinkKind::Cms,
                ok: true,
                detail: "done".into()
            }
        );
        assert_eq!(dispatcher.cms.as_ref().unwrap().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cms_that_cannot_be_built_is_reported_after_email() {
        use crate::config::CmsConfig;
        use crate::cover::CoverCompositor;
        use crate::cover::fonts::FontSet;
        use retry::RetryPolicy;

        let config = CmsConfig {
            user_agent: "bot/1.3\n".into(),
            ..CmsConfig::default()
        };
        let compositor = CoverCompositor::new(FontSet::bitmap(), "T", None);
        let err = WordPressPublisher::new(config, RetryPolicy::default(), &compositor).unwrap_err();
        assert!(matches!(err, DeliveryError::Http(_)));

        let email = StubSink::new(SinkKind::Email, false);
        let dispatcher: Dispatcher<StubSink, StubSink> =
            Dispatcher::new(Some(email), None).with_unavailable(SinkKind::Cms, err);
        let results = dispatcher.dispatch(&script()).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].sink, SinkKind::Email);
        assert!(results[0].ok);
        assert_eq!(results[1].sink, SinkKind::Cms);
        assert!(!results[1].ok);
        assert!(results[1].detail.starts_with("request failed"));
        assert_eq!(dispatcher.email.as_ref().unwrap().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_sinks_are_not_reported() {
        let dispatcher: Dispatcher<StubSink, StubSink> =
            Dispatcher::new(None, Some(StubSink::new(SinkKind::Cms, true)));
        let results = dispatcher.dispatch(&script()).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].sink, SinkKind::Cms);
        assert!(!results[0].ok);

        let none: Dispatcher<StubSink, StubSink> = Dispatcher::new(None, None);
        assert!(none.dispatch(&script()).await.is_empty());
    }
}
