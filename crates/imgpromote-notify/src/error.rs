//! Reporting errors. None of these alter recorded promotion outcomes.

/// Notification errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("no recipients given")]
    NoRecipients,

    #[error("invalid address {address:?}: {reason}")]
    Address { address: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("mail delivery failed: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, NotifyError>;
