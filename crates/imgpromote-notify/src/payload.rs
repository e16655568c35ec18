//! What a notification carries.

use std::path::PathBuf;

use imgpromote_core::{JobStatus, PromotionResult};
use serde::{Deserialize, Serialize};

/// Links and labels tying the email back to the job that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationMetadata {
    /// Release notes or ticket URL; its last path segment is the ticket id.
    pub release_link: String,
    pub job_url: String,
    /// Job name and build number.
    pub build_info: String,
    pub dry_run_status: String,
    /// Raw JSON object of job parameters.
    pub parameters_json: String,
}

impl CorrelationMetadata {
    /// Last non-empty path segment of the release link.
    pub fn ticket(&self) -> &str {
        self.release_link
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
    }
}

/// Everything needed to render and deliver one job report.
#[derive(Debug, Clone)]
pub struct NotificationPayload {
    pub status: JobStatus,
    /// Per-image results, in submission order.
    pub results: Vec<PromotionResult>,
    pub log_files: Vec<PathBuf>,
    pub recipients: Vec<String>,
    pub metadata: CorrelationMetadata,
}

impl NotificationPayload {
    /// Payload whose status is derived from the results.
    pub fn from_results(
        results: Vec<PromotionResult>,
        recipients: Vec<String>,
        metadata: CorrelationMetadata,
    ) -> Self {
        Self {
            status: JobStatus::from_results(&results),
            results,
            log_files: Vec::new(),
            recipients,
            metadata,
        }
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_files.push(path.into());
        self
    }
}

/// Split a comma- or semicolon-separated recipient list, dropping blanks.
pub fn parse_recipients(raw: &str) -> Vec<String> {
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgpromote_core::PromotionRequest;

    #[test]
    fn test_ticket_from_release_link() {
        let meta = CorrelationMetadata {
            release_link: "https://jira.example.com/browse/REL-42".to_string(),
            ..Default::default()
        };
        assert_eq!(meta.ticket(), "REL-42");

        let trailing = CorrelationMetadata {
            release_link: "https://jira.example.com/browse/REL-42/".to_string(),
            ..Default::default()
        };
        assert_eq!(trailing.ticket(), "REL-42");

        assert_eq!(CorrelationMetadata::default().ticket(), "");
    }

    #[test]
    fn test_parse_recipients() {
        assert_eq!(
            parse_recipients(" a@x.com, b@x.com;;c@x.com ,"),
            vec!["a@x.com", "b@x.com", "c@x.com"]
        );
        assert!(parse_recipients(" , ").is_empty());
    }

    #[test]
    fn test_status_derived_from_results() {
        let req = PromotionRequest::new("svc", "latest", "stable", "reg", false);
        let payload = NotificationPayload::from_results(
            vec![PromotionResult::failure(&req, None, "boom", 0)],
            vec!["a@x.com".to_string()],
            CorrelationMetadata::default(),
        );
        assert_eq!(payload.status, JobStatus::Failure);
        assert_eq!(payload.with_status(JobStatus::Success).status, JobStatus::Success);
    }
}
