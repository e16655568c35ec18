//! Render a job report and hand it to the mailer once.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use imgpromote_core::emit_notification_sent;
use tracing::{info, warn};

use crate::error::{NotifyError, Result};
use crate::payload::NotificationPayload;
use crate::render::{render, Templates};
use crate::transport::{EmailAttachment, Mailer, OutgoingEmail};

const LOGO_CONTENT_ID: &str = "logo";

/// What was delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationReceipt {
    pub subject: String,
    pub recipients: Vec<String>,
    /// Attached file names, logo included.
    pub attachments: Vec<String>,
    /// Log files that could not be read and were left out.
    pub skipped: Vec<PathBuf>,
}

pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    from: String,
    templates: Templates,
    logo_url: String,
    logo_file: Option<PathBuf>,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, from: impl Into<String>) -> Self {
        Self {
            mailer,
            from: from.into(),
            templates: Templates::Builtin,
            logo_url: String::new(),
            logo_file: None,
        }
    }

    pub fn with_templates(mut self, templates: Templates) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_logo_url(mut self, url: impl Into<String>) -> Self {
        self.logo_url = url.into();
        self
    }

    /// Attach this image inline and reference it as `cid:logo`.
    pub fn with_logo_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.logo_file = Some(path.into());
        self
    }

    /// Render and deliver the report. Delivery is attempted once; its
    /// failure is returned without touching the recorded results.
    pub async fn notify(&self, payload: &NotificationPayload) -> Result<NotificationReceipt> {
        if payload.recipients.is_empty() {
            return Err(NotifyError::NoRecipients);
        }

        let mut attachments = Vec::new();
        let mut skipped = Vec::new();

        let logo = match &self.logo_file {
            Some(path) => read_logo(path).await,
            None => None,
        };
        let logo_url = match &logo {
            Some(_) => format!("cid:{}", LOGO_CONTENT_ID),
            None => self.logo_url.clone(),
        };

        let rendered = render(payload, &self.templates, &logo_url);

        for path in &payload.log_files {
            match tokio::fs::read(path).await {
                Ok(body) => {
                    attachments.push(EmailAttachment::file(file_name(path), "text/plain", body));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "log attachment skipped");
                    skipped.push(path.clone());
                }
            }
        }
        attachments.extend(logo);

        let email = OutgoingEmail {
            from: self.from.clone(),
            to: payload.recipients.clone(),
            subject: rendered.subject,
            html: rendered.html,
            attachments,
        };

        if let Err(e) = self.mailer.send(&email).await {
            warn!(subject = %email.subject, error = %e, "notification not delivered");
            return Err(e);
        }

        emit_notification_sent(&email.subject, email.to.len(), email.attachments.len());
        info!(recipients = %email.to.join(","), "notification sent");

        Ok(NotificationReceipt {
            subject: email.subject,
            recipients: email.to,
            attachments: email.attachments.into_iter().map(|a| a.filename).collect(),
            skipped,
        })
    }
}

async fn read_logo(path: &Path) -> Option<EmailAttachment> {
    match tokio::fs::read(path).await {
        Ok(body) => Some(EmailAttachment::inline(
            LOGO_CONTENT_ID,
            file_name(path),
            image_content_type(path),
            body,
        )),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "logo not attached");
            None
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn image_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
