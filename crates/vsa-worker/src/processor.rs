//! The asynchronous inference step.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::Instrument;
use vsa_db::{QuotaLedger, VideoStore};
use vsa_ml_client::{with_retry, InferenceBackend, RetryConfig};
use vsa_models::JobState;
use vsa_queue::InferenceJob;

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;

/// Collaborators shared by every job.
#[derive(Clone)]
pub struct ProcessingContext {
    pub videos: Arc<dyn VideoStore>,
    pub ledger: QuotaLedger,
    pub inference: Arc<dyn InferenceBackend>,
    pub retry: RetryConfig,
    pub job_timeout: Duration,
}

/// Run inference for one job and persist the outcome.
///
/// On success the utterances and terminal state are stored together, then one
/// unit of quota is charged to the owner. Charging is best-effort: a failure
/// is logged and the analysis stands.
pub async fn process_inference(
    ctx: &ProcessingContext,
    job: &InferenceJob,
    logger: &JobLogger,
) -> WorkerResult<JobState> {
    logger.log_start(&format!("analyzing {}", job.video_path));

    let response = tokio::time::timeout(
        ctx.job_timeout,
        with_retry(&ctx.retry, ctx.inference.name(), || {
            ctx.inference.analyze(&job.video_path)
        }),
    )
    .await
    .map_err(|_| WorkerError::Timeout(ctx.job_timeout))??;

    logger.log_progress(&format!(
        "received {} utterances",
        response.utterances.len()
    ));

    let state = ctx
        .videos
        .complete_job(&job.file_id, response.utterances)
        .await?;

    match ctx.ledger.check_and_consume(&job.user_id, true).await {
        Ok(true) => {}
        Ok(false) => logger.log_warning("quota was exhausted when charging a finished job"),
        Err(e) => logger.log_warning(&format!("failed to charge quota: {e}")),
    }

    Ok(state)
}

/// Run a job to its end. Never returns an error: failures put the file back
/// to `Pending` so that a later dispatch can retry it.
pub async fn execute_job(ctx: Arc<ProcessingContext>, job: InferenceJob) {
    let logger = JobLogger::new(&job);
    let span = logger.create_span();

    async move {
        match ctx.videos.mark_started(&job.file_id).await {
            Ok(true) => {}
            Ok(false) => {
                // Recovered or released while waiting in the queue.
                logger.log_warning("file is no longer processing, skipping job");
                metrics::counter!("vsa_jobs_skipped_total").increment(1);
                return;
            }
            Err(e) => logger.log_warning(&format!("failed to refresh claim: {e}")),
        }

        let started = Instant::now();
        metrics::gauge!("vsa_jobs_in_flight").increment(1.0);

        match process_inference(&ctx, &job, &logger).await {
            Ok(state) => {
                logger.log_completion(&format!("state {state}"));
                metrics::counter!("vsa_jobs_completed_total", "state" => state.as_str())
                    .increment(1);
            }
            Err(e) => {
                logger.log_error(&e.to_string());
                metrics::counter!("vsa_jobs_failed_total", "kind" => e.kind()).increment(1);
                if let Err(db_err) = ctx.videos.fail_job(&job.file_id, &e.to_string()).await {
                    logger.log_error(&format!("failed to record job failure: {db_err}"));
                }
            }
        }

        metrics::gauge!("vsa_jobs_in_flight").decrement(1.0);
        metrics::histogram!("vsa_job_duration_seconds").record(started.elapsed().as_secs_f64());
    }
    .instrument(span)
    .await
}
