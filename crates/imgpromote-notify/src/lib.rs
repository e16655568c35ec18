//! imgpromote notifications
//!
//! Renders an HTML report for a promotion job and mails it with the run log
//! attached:
//! - [`render`]: status-themed templates with `{{NAME}}` placeholders
//! - [`Notifier`]: builds the message and delivers it once
//! - [`SmtpMailer`]: lettre SMTP transport configured from the environment

pub mod config;
pub mod error;
pub mod fakes;
pub mod notifier;
pub mod payload;
pub mod render;
pub mod transport;

pub use config::SmtpConfig;
pub use error::{NotifyError, Result};
pub use notifier::{NotificationReceipt, Notifier};
pub use payload::{parse_recipients, CorrelationMetadata, NotificationPayload};
pub use render::{render, RenderedEmail, Templates};
pub use transport::{build_message, EmailAttachment, Mailer, OutgoingEmail, SmtpMailer};
