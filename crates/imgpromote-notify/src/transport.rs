//! Mail delivery boundary.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use crate::config::SmtpConfig;
use crate::error::{NotifyError, Result};

/// File attached to an email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAttachment {
    pub filename: String,
    pub content_type: String,
    pub body: Vec<u8>,
    /// Set for inline parts referenced from the HTML as `cid:<id>`.
    pub content_id: Option<String>,
}

impl EmailAttachment {
    pub fn file(filename: impl Into<String>, content_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            body,
            content_id: None,
        }
    }

    pub fn inline(
        content_id: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        body: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            body,
            content_id: Some(content_id.into()),
        }
    }
}

/// Transport-neutral message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    pub attachments: Vec<EmailAttachment>,
}

/// Delivers a message. Implementations make a single attempt.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;
}

/// SMTP delivery via lettre.
pub struct SmtpMailer {
    config: SmtpConfig,
}

impl SmtpMailer {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SmtpConfig {
        &self.config
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = if self.config.tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
                .map_err(|e| NotifyError::Config(format!("SMTP relay {}: {}", self.config.host, e)))?
        } else {
            // Plain connection for local relays.
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.host)
        };
        let mut builder = builder.port(self.config.port);

        if let Some(username) = &self.config.username {
            let password = self.config.password.clone().unwrap_or_default();
            builder = builder.credentials(Credentials::new(username.clone(), password));
        }

        Ok(builder.build())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        let message = build_message(email)?;
        let transport = self.transport()?;

        debug!(host = %self.config.host, port = self.config.port, "sending via SMTP");
        transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(())
    }
}

fn mailbox(address: &str) -> Result<Mailbox> {
    address.parse().map_err(|e: lettre::address::AddressError| NotifyError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

fn attachment_part(attachment: &EmailAttachment) -> Result<SinglePart> {
    let content_type = ContentType::parse(&attachment.content_type)
        .map_err(|e| NotifyError::Build(format!("{}: {}", attachment.filename, e)))?;
    let part = match &attachment.content_id {
        Some(id) => Attachment::new_inline(id.clone()),
        None => Attachment::new(attachment.filename.clone()),
    };
    Ok(part.body(attachment.body.clone(), content_type))
}

/// Build the MIME message: the HTML body and inline parts in a
/// `multipart/related`, wrapped with file attachments in a `multipart/mixed`.
pub fn build_message(email: &OutgoingEmail) -> Result<Message> {
    if email.to.is_empty() {
        return Err(NotifyError::NoRecipients);
    }

    let mut builder = Message::builder()
        .from(mailbox(&email.from)?)
        .subject(email.subject.clone());
    for recipient in &email.to {
        builder = builder.to(mailbox(recipient)?);
    }

    let mut related = MultiPart::related().singlepart(SinglePart::html(email.html.clone()));
    let mut files = Vec::new();
    for attachment in &email.attachments {
        if attachment.content_id.is_some() {
            related = related.singlepart(attachment_part(attachment)?);
        } else {
            files.push(attachment_part(attachment)?);
        }
    }

    let mut body = MultiPart::mixed().multipart(related);
    for part in files {
        body = body.singlepart(part);
    }

    builder
        .multipart(body)
        .map_err(|e| NotifyError::Build(e.to_string()))
}
