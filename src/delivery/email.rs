//! Email sink: the script as one HTML message over authenticated STARTTLS SMTP.
//!
//! A single attempt per run. Any failure (bad address, missing credential,
//! transport or auth error) becomes a [`DeliveryError`] for this sink only.

use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::{info, instrument};

use super::{DeliveryError, Sink};
use crate::config::EmailConfig;
use crate::models::{Script, SinkKind};

/// Sends the script through an SMTP submission server.
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    config: EmailConfig,
}

fn parse_mailbox(role: &str, address: &str) -> Result<Mailbox, DeliveryError> {
    address
        .trim()
        .parse()
        .map_err(|e| DeliveryError::Message(format!("invalid {role} address {address:?}: {e}")))
}

/// Comma-separated list of addresses; blanks are skipped.
fn parse_mailboxes(role: &str, list: &str) -> Result<Vec<Mailbox>, DeliveryError> {
    list.split(',')
        .filter(|a| !a.trim().is_empty())
        .map(|a| parse_mailbox(role, a))
        .collect()
}

impl SmtpMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    /// Build the message for `script`: From/To/Cc/Subject and one HTML part.
    pub fn build_message(&self, script: &Script) -> Result<Message, DeliveryError> {
        let from = self
            .config
            .sender()
            .ok_or_else(|| DeliveryError::Config("no sender address (email.from / SMTP_USERNAME)".into()))?;
        let to = parse_mailboxes("recipient", self.config.to.as_deref().unwrap_or(""))?;
        if to.is_empty() {
            return Err(DeliveryError::Config("no recipient (email.to / EMAIL_TO)".into()));
        }
        let cc = parse_mailboxes("copy", self.config.cc.as_deref().unwrap_or(""))?;

        let mut builder = Message::builder()
            .from(parse_mailbox("sender", from)?)
            .subject(self.config.subject.as_str());
        for mailbox in to {
            builder = builder.to(mailbox);
        }
        for mailbox in cc {
            builder = builder.cc(mailbox);
        }

        builder
            .multipart(MultiPart::mixed().singlepart(SinglePart::html(script.to_html())))
            .map_err(|e| DeliveryError::Message(format!("failed to build message: {e}")))
    }

    fn credentials(&self) -> Result<Credentials, DeliveryError> {
        match (&self.config.username, &self.config.password) {
            (Some(user), Some(pass)) => Ok(Credentials::new(user.clone(), pass.clone())),
            _ => Err(DeliveryError::Config(
                "SMTP credentials missing (SMTP_USERNAME / SMTP_PASSWORD)".into(),
            )),
        }
    }
}

impl Sink for SmtpMailer {
    fn kind(&self) -> SinkKind {
        SinkKind::Email
    }

    #[instrument(level = "info", skip_all, fields(host = %self.config.smtp_host, port = self.config.smtp_port))]
    async fn deliver(&self, script: &Script) -> Result<String, DeliveryError> {
        let message = self.build_message(script)?;
        let credentials = self.credentials()?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_host)
            .map_err(|e| DeliveryError::Smtp(format!("failed to create transport: {e}")))?
            .port(self.config.smtp_port)
            .credentials(credentials)
            .timeout(Some(Duration::from_secs(self.config.timeout_secs)))
            .build();

        mailer
            .send(message)
            .await
            .map_err(|e| DeliveryError::Smtp(format!("failed to send email: {e}")))?;

        let to = self.config.to.as_deref().unwrap_or_default();
        info!(%to, "Email sent");
        Ok(format!("sent to {to}"))
    }
}
