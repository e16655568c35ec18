//! SMTP settings read from the environment.

use crate::error::{NotifyError, Result};

pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_SENDER: &str = "jenkins@localhost";

/// Mail transport configuration.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Use STARTTLS. Plain connections are for local relays only.
    pub tls: bool,
    pub from: String,
    /// Public logo URL used when no logo file is attached.
    pub logo_url: Option<String>,
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("tls", &self.tls)
            .field("from", &self.from)
            .field("logo_url", &self.logo_url)
            .finish()
    }
}

impl SmtpConfig {
    /// Create from `IMGPROMOTE_SMTP_*` environment variables.
    ///
    /// - `IMGPROMOTE_SMTP_HOST` (required)
    /// - `IMGPROMOTE_SMTP_PORT` (default 587)
    /// - `IMGPROMOTE_SMTP_USERNAME`, `IMGPROMOTE_SMTP_PASSWORD`
    /// - `IMGPROMOTE_SMTP_TLS` (default true)
    /// - `IMGPROMOTE_SMTP_FROM` (default `jenkins@localhost`)
    /// - `IMGPROMOTE_LOGO_URL`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SmtpConfig::from_env`] with an explicit variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = var("IMGPROMOTE_SMTP_HOST")
            .ok_or_else(|| NotifyError::Config("IMGPROMOTE_SMTP_HOST not set".to_string()))?;
        let port = match var("IMGPROMOTE_SMTP_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| {
                NotifyError::Config(format!("IMGPROMOTE_SMTP_PORT {:?}: {}", raw, e))
            })?,
            None => DEFAULT_SMTP_PORT,
        };
        let tls = var("IMGPROMOTE_SMTP_TLS")
            .map(|v| !matches!(v.trim().to_lowercase().as_str(), "false" | "0" | "no"))
            .unwrap_or(true);

        Ok(Self {
            host,
            port,
            username: var("IMGPROMOTE_SMTP_USERNAME"),
            password: var("IMGPROMOTE_SMTP_PASSWORD"),
            tls,
            from: var("IMGPROMOTE_SMTP_FROM").unwrap_or_else(|| DEFAULT_SENDER.to_string()),
            logo_url: var("IMGPROMOTE_LOGO_URL"),
        })
    }
}
