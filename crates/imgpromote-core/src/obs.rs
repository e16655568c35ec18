//! Structured observability hooks for promotion jobs.
//!
//! - `job_span` that tags every event in a job with its `job_id`
//! - Emission functions for lifecycle events: promotion start/retry/finish,
//!   job finish, notification delivery
//!
//! Events are emitted at `info!` level unless noted (filter with `RUST_LOG`).

use tracing::{info, warn};

use crate::domain::{JobStatus, PromotionResult, PromotionStep};

/// Job-scoped span. Attach it to the job's future with
/// [`tracing::Instrument::instrument`]; workers inherit it through
/// `in_current_span`.
///
/// ```ignore
/// let results = fan_out(requests).instrument(job_span(&job_id)).await;
/// // every event inside carries job_id
/// ```
pub fn job_span(job_id: &str) -> tracing::Span {
    tracing::info_span!("imgpromote.job", job_id = %job_id)
}

/// Emit event: a promotion began.
pub fn emit_promotion_started(image: &str, source: &str, destination: &str, dry_run: bool) {
    info!(
        event = "promotion.started",
        image = %image,
        source = %source,
        destination = %destination,
        dry_run = dry_run,
    );
}

/// Emit event (warn): a step attempt failed and will be retried.
pub fn emit_step_retry(image: &str, step: PromotionStep, attempt: u32, error: &dyn std::fmt::Display) {
    warn!(
        event = "promotion.step_retry",
        image = %image,
        step = %step,
        attempt = attempt,
        error = %error,
    );
}

/// Emit event: a promotion produced its result.
pub fn emit_promotion_finished(result: &PromotionResult) {
    info!(
        event = "promotion.finished",
        image = %result.image,
        status = %result.status,
        failed_step = ?result.failed_step,
        duration_ms = result.duration_ms,
    );
}

/// Emit event: all promotions in a job completed.
pub fn emit_job_finished(status: JobStatus, total: usize, failed: usize, duration_ms: u64) {
    info!(
        event = "job.finished",
        status = %status,
        total = total,
        failed = failed,
        duration_ms = duration_ms,
    );
}

/// Emit event: notification handed to the mail transport.
pub fn emit_notification_sent(subject: &str, recipients: usize, attachments: usize) {
    info!(
        event = "notification.sent",
        subject = %subject,
        recipients = recipients,
        attachments = attachments,
    );
}
