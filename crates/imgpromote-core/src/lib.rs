//! imgpromote core library
//!
//! Promotes container images between tags on a registry:
//! - validate the request, pull the source, retag, push the destination
//! - every step retried under one [`RetryPolicy`]
//! - bounded fan-out over many images with results in submission order
//! - per-run log file and JSON results artifact for the notifier

pub mod domain;
pub mod fakes;
pub mod obs;
pub mod orchestrator;
pub mod promoter;
pub mod registry;
pub mod results;
pub mod retry;
pub mod run_log;
pub mod telemetry;

pub use domain::{
    ExecError, ImageRef, JobStatus, PromoteError, PromotionRequest, PromotionResult,
    PromotionStatus, PromotionStep, PromotionStrategy, Result, ValidationError,
};

pub use obs::{
    emit_job_finished, emit_notification_sent, emit_promotion_finished, emit_promotion_started,
    emit_step_retry, job_span,
};
pub use orchestrator::{JobReport, Orchestrator, DEFAULT_CONCURRENCY};
pub use promoter::Promoter;
pub use registry::{CommandOutput, ContainerCli, RegistryClient, RegistryCommand, RegistryOp};
pub use results::{read_results_json, write_results_json, ResultsArtifact, RESULTS_SCHEMA_VERSION};
pub use retry::{retry_step, Attempted, RetryPolicy, StepFailure};
pub use run_log::{LogLevel, RunLog};
pub use telemetry::init_tracing;

/// imgpromote version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
