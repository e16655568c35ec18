//! In-memory mailer (testing only)

use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{NotifyError, Result};
use crate::transport::{Mailer, OutgoingEmail};

/// Records every message instead of delivering it.
#[derive(Debug, Default)]
pub struct MemoryMailer {
    sent: RwLock<Vec<OutgoingEmail>>,
    fail_with: Option<String>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mailer whose every delivery fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            sent: RwLock::default(),
            fail_with: Some(reason.into()),
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.read().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.read().unwrap().len()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        if let Some(reason) = &self.fail_with {
            return Err(NotifyError::Transport(reason.clone()));
        }
        self.sent.write().unwrap().push(email.clone());
        Ok(())
    }
}
