//! Per-image outcomes and the aggregate job status.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::request::PromotionRequest;

/// Steps of a promotion, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromotionStep {
    Validate,
    Pull,
    Tag,
    Push,
}

impl PromotionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromotionStep::Validate => "validate",
            PromotionStep::Pull => "pull",
            PromotionStep::Tag => "tag",
            PromotionStep::Push => "push",
        }
    }
}

impl fmt::Display for PromotionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromotionStatus {
    Success,
    DryRunSuccess,
    Failure,
}

impl PromotionStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, PromotionStatus::Failure)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PromotionStatus::Success => "SUCCESS",
            PromotionStatus::DryRunSuccess => "DRY_RUN_SUCCESS",
            PromotionStatus::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for PromotionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recorded result of one [`PromotionRequest`].
///
/// Field names match the results artifact consumed by the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionResult {
    pub image: String,

    #[serde(rename = "source")]
    pub source_tag: String,

    #[serde(rename = "destination")]
    pub destination_tag: String,

    pub status: PromotionStatus,

    pub message: String,

    /// Step that failed; absent on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<PromotionStep>,

    #[serde(default)]
    pub duration_ms: u64,
}

impl PromotionResult {
    pub fn success(request: &PromotionRequest, message: impl Into<String>, duration_ms: u64) -> Self {
        let status = if request.dry_run() {
            PromotionStatus::DryRunSuccess
        } else {
            PromotionStatus::Success
        };
        Self::from_request(request, status, message.into(), None, duration_ms)
    }

    pub fn failure(
        request: &PromotionRequest,
        step: Option<PromotionStep>,
        message: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self::from_request(
            request,
            PromotionStatus::Failure,
            message.into(),
            step,
            duration_ms,
        )
    }

    fn from_request(
        request: &PromotionRequest,
        status: PromotionStatus,
        message: String,
        failed_step: Option<PromotionStep>,
        duration_ms: u64,
    ) -> Self {
        Self {
            image: request.image().to_string(),
            source_tag: request.source_tag().to_string(),
            destination_tag: request.destination_tag().to_string(),
            status,
            message,
            failed_step,
            duration_ms,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status.is_failure()
    }
}

/// Overall outcome of a promotion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Success,
    Failure,
}

impl JobStatus {
    /// Failure iff any result failed. Dry-run successes count as success,
    /// and an empty job is a success.
    pub fn from_results(results: &[PromotionResult]) -> Self {
        if results.iter().any(PromotionResult::is_failure) {
            JobStatus::Failure
        } else {
            JobStatus::Success
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Success)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Success => "SUCCESS",
            JobStatus::Failure => "FAILURE",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUCCESS" => Ok(JobStatus::Success),
            "FAILURE" => Ok(JobStatus::Failure),
            other => Err(format!("unknown job status '{}', expected SUCCESS or FAILURE", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn req(dry_run: bool) -> PromotionRequest {
        PromotionRequest::new("svc", "latest", "stable", "reg", dry_run)
    }

    #[test]
    fn test_success_respects_dry_run() {
        assert_eq!(
            PromotionResult::success(&req(false), "ok", 1).status,
            PromotionStatus::Success
        );
        assert_eq!(
            PromotionResult::success(&req(true), "ok", 1).status,
            PromotionStatus::DryRunSuccess
        );
    }

    #[test]
    fn test_job_status_aggregation() {
        let ok = PromotionResult::success(&req(false), "ok", 0);
        let dry = PromotionResult::success(&req(true), "ok", 0);
        let bad = PromotionResult::failure(&req(false), Some(PromotionStep::Push), "boom", 0);

        assert_eq!(JobStatus::from_results(&[]), JobStatus::Success);
        assert_eq!(JobStatus::from_results(&[ok.clone(), dry.clone()]), JobStatus::Success);
        assert_eq!(JobStatus::from_results(&[ok, bad, dry]), JobStatus::Failure);
    }

    #[test]
    fn test_result_wire_names() {
        let result = PromotionResult::failure(&req(false), Some(PromotionStep::Pull), "no such image", 12);
        let raw = serde_json::to_value(&result).expect("serialize");
        assert_eq!(raw["source"], json!("latest"));
        assert_eq!(raw["destination"], json!("stable"));
        assert_eq!(raw["status"], json!("FAILURE"));
        assert_eq!(raw["failed_step"], json!("pull"));

        let dry = PromotionResult::success(&req(true), "dry run", 0);
        let raw = serde_json::to_value(&dry).expect("serialize");
        assert_eq!(raw["status"], json!("DRY_RUN_SUCCESS"));
        assert!(raw.get("failed_step").is_none());
    }

    #[test]
    fn test_result_accepts_minimal_record() {
        let raw = r#"{"image":"svc","source":"a","destination":"b","status":"SUCCESS","message":""}"#;
        let result: PromotionResult = serde_json::from_str(raw).expect("deserialize");
        assert_eq!(result.duration_ms, 0);
        assert!(result.failed_step.is_none());
    }

    #[test]
    fn test_job_status_parse() {
        assert_eq!("success".parse::<JobStatus>(), Ok(JobStatus::Success));
        assert_eq!("FAILURE".parse::<JobStatus>(), Ok(JobStatus::Failure));
        assert!("maybe".parse::<JobStatus>().is_err());
    }
}
