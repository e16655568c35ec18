//! Single-image promotion: validate, pull, retag, push.

use std::sync::Arc;
use std::time::Instant;

use crate::domain::{PromoteError, PromotionRequest, PromotionResult, PromotionStep, Result};
use crate::obs::{emit_promotion_finished, emit_promotion_started, emit_step_retry};
use crate::registry::{CommandOutput, RegistryClient, RegistryCommand};
use crate::retry::{retry_step, RetryPolicy};
use crate::run_log::RunLog;

/// Promotes one image at a time against a registry client.
///
/// Holds no per-request state, so one instance can be shared by every
/// worker in a job.
pub struct Promoter {
    client: Arc<dyn RegistryClient>,
    policy: RetryPolicy,
    log: RunLog,
}

impl Promoter {
    pub fn new(client: Arc<dyn RegistryClient>, policy: RetryPolicy, log: RunLog) -> Self {
        Self {
            client,
            policy,
            log,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn log(&self) -> &RunLog {
        &self.log
    }

    /// Promote one image. Never fails: every error becomes a
    /// [`PromotionStatus::Failure`](crate::domain::PromotionStatus::Failure)
    /// result carrying the error message.
    pub async fn promote(&self, request: &PromotionRequest) -> PromotionResult {
        let start = Instant::now();
        emit_promotion_started(
            request.image(),
            request.source_tag(),
            request.destination_tag(),
            request.dry_run(),
        );
        self.log.info(format!(
            "Start processing {} {} -> {} dry_run={}",
            request.image(),
            request.source_tag(),
            request.destination_tag(),
            request.dry_run()
        ));

        let outcome = self.run_steps(request).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(message) => {
                self.log.info(format!("{}: {}", request.image(), message));
                PromotionResult::success(request, message, duration_ms)
            }
            Err(err) => {
                self.log.error(format!("{}: {}", request.image(), err));
                PromotionResult::failure(request, err.step(), err.to_string(), duration_ms)
            }
        };

        emit_promotion_finished(&result);
        result
    }

    async fn run_steps(&self, request: &PromotionRequest) -> Result<String> {
        let (source, destination) = request.validate()?;

        self.run_step(
            request,
            PromotionStep::Pull,
            RegistryCommand::Pull {
                image: source.clone(),
            },
        )
        .await?;

        self.run_step(
            request,
            PromotionStep::Tag,
            RegistryCommand::Tag {
                source: source.clone(),
                target: destination.clone(),
            },
        )
        .await?;

        if request.dry_run() {
            return Ok(format!(
                "Dry run: tagged {} as {}, push skipped",
                source, destination
            ));
        }

        self.run_step(
            request,
            PromotionStep::Push,
            RegistryCommand::Push {
                image: destination.clone(),
            },
        )
        .await?;

        Ok(format!("Promoted {} to {}", source, destination))
    }

    async fn run_step(
        &self,
        request: &PromotionRequest,
        step: PromotionStep,
        command: RegistryCommand,
    ) -> Result<CommandOutput> {
        let image = request.image();
        self.log.info(format!("{}: {} ({})", image, step, command.args().join(" ")));

        let client = &self.client;
        let log = &self.log;
        let max_attempts = self.policy.attempts();

        let outcome = retry_step(
            &self.policy,
            step,
            |_attempt| client.execute(&command),
            |attempt, error, will_retry| {
                if will_retry {
                    emit_step_retry(image, step, attempt, error);
                    log.warn(format!(
                        "{}: {} attempt {}/{} failed, retrying: {}",
                        image, step, attempt, max_attempts, error
                    ));
                } else {
                    log.error(format!(
                        "{}: {} attempt {}/{} failed: {}",
                        image, step, attempt, max_attempts, error
                    ));
                }
            },
        )
        .await;

        match outcome {
            Ok(done) => Ok(done.value),
            Err(failure) => Err(PromoteError::StepFailed {
                step: failure.step,
                attempts: failure.attempts,
                source: failure.error,
            }),
        }
    }
}
