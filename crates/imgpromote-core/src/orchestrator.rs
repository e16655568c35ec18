//! Bounded fan-out of promotion requests.
//!
//! Each request runs on its own Tokio task, gated by a semaphore with
//! `concurrency` permits. A worker keeps its permit until the request has
//! finished every step and retry. Results are gathered after all workers
//! finish and are returned in submission order.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::Instrument;
use uuid::Uuid;

use crate::domain::{JobStatus, PromoteError, PromotionRequest, PromotionResult};
use crate::obs::{emit_job_finished, job_span};
use crate::promoter::Promoter;

/// Default number of promotions allowed to run at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Aggregate outcome of a promotion job.
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: String,
    pub status: JobStatus,
    /// One result per request, in submission order.
    pub results: Vec<PromotionResult>,
    pub duration_ms: u64,
}

impl JobReport {
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.is_failure()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_failure()).count()
    }
}

/// Runs many promotions with at most `concurrency` in flight.
pub struct Orchestrator {
    promoter: Arc<Promoter>,
    concurrency: usize,
}

impl Orchestrator {
    /// `concurrency` below 1 is treated as 1.
    pub fn new(promoter: Arc<Promoter>, concurrency: usize) -> Self {
        Self {
            promoter,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Promote every request and aggregate the outcome.
    ///
    /// Always returns exactly one result per request; a worker that panics
    /// is recorded as a failure for its image.
    pub async fn run(&self, requests: Vec<PromotionRequest>) -> JobReport {
        let start = Instant::now();
        let job_id = Uuid::new_v4().to_string();
        let results = self
            .fan_out(&requests)
            .instrument(job_span(&job_id))
            .await;

        JobReport {
            job_id,
            status: JobStatus::from_results(&results),
            results,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn fan_out(&self, requests: &[PromotionRequest]) -> Vec<PromotionResult> {
        let start = Instant::now();
        let log = self.promoter.log();
        log.info(format!(
            "Promoting {} image(s) with concurrency {}",
            requests.len(),
            self.concurrency
        ));

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let handles: Vec<_> = requests
            .iter()
            .cloned()
            .map(|request| {
                let promoter = Arc::clone(&self.promoter);
                let semaphore = Arc::clone(&semaphore);
                tokio::spawn(
                    async move {
                        // The semaphore is never closed, so acquisition only
                        // waits for a free permit.
                        let _permit = semaphore.acquire_owned().await;
                        promoter.promote(&request).await
                    }
                    .in_current_span(),
                )
            })
            .collect();

        let joined = futures::future::join_all(handles).await;

        let results: Vec<PromotionResult> = joined
            .into_iter()
            .zip(requests)
            .map(|(outcome, request)| match outcome {
                Ok(result) => result,
                Err(join_error) => {
                    let err = PromoteError::WorkerAborted {
                        image: request.image().to_string(),
                        reason: join_error.to_string(),
                    };
                    log.error(err.to_string());
                    PromotionResult::failure(request, None, err.to_string(), 0)
                }
            })
            .collect();

        let status = JobStatus::from_results(&results);
        let failed = results.iter().filter(|r| r.is_failure()).count();
        let duration_ms = start.elapsed().as_millis() as u64;
        log.info(format!(
            "Job finished: {} ({} of {} image(s) failed)",
            status,
            failed,
            results.len()
        ));
        emit_job_finished(status, results.len(), failed, duration_ms);

        results
    }
}
