//! Error taxonomy for image promotion.

use super::result::PromotionStep;

/// A request that cannot be promoted as given. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("invalid {field} {value:?}: {reason}")]
    Malformed {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Failure of a single registry command invocation.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("{program} {op} exited with code {code}: {stderr}")]
    NonZeroExit {
        program: String,
        op: &'static str,
        code: i32,
        stderr: String,
    },

    #[error("{op} timed out after {timeout_ms}ms")]
    TimedOut { op: &'static str, timeout_ms: u64 },

    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl ExecError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// A missing client binary will stay missing; everything else (registry
    /// hiccups, timeouts, daemon restarts) is worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            ExecError::Spawn { source, .. } => {
                source.kind() != std::io::ErrorKind::NotFound
                    && source.kind() != std::io::ErrorKind::PermissionDenied
            }
            ExecError::NonZeroExit { .. } | ExecError::TimedOut { .. } => true,
        }
    }
}

/// Promotion errors.
#[derive(Debug, thiserror::Error)]
pub enum PromoteError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{step} failed after {attempts} attempt(s): {source}")]
    StepFailed {
        step: PromotionStep,
        attempts: u32,
        #[source]
        source: ExecError,
    },

    #[error("worker for {image} aborted: {reason}")]
    WorkerAborted { image: String, reason: String },
}

impl PromoteError {
    /// The step a failure is attributed to, if any.
    pub fn step(&self) -> Option<PromotionStep> {
        match self {
            PromoteError::Validation(_) => Some(PromotionStep::Validate),
            PromoteError::StepFailed { step, .. } => Some(*step),
            PromoteError::WorkerAborted { .. } => None,
        }
    }
}

/// Result type for promotion operations.
pub type Result<T> = std::result::Result<T, PromoteError>;
