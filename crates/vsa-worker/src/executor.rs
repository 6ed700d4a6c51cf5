//! Job executor.

use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tracing::{info, warn};
use vsa_queue::{InferenceJob, JobReceiver};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::processor::{execute_job, ProcessingContext};

/// Pulls jobs off the queue and runs at most `max_concurrent_jobs` at once.
pub struct JobExecutor {
    config: WorkerConfig,
    ctx: Arc<ProcessingContext>,
    job_semaphore: Arc<Semaphore>,
    shutdown: watch::Sender<bool>,
}

impl JobExecutor {
    pub fn new(config: WorkerConfig, ctx: ProcessingContext) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = watch::channel(false);
        Self {
            config,
            ctx: Arc::new(ctx),
            job_semaphore,
            shutdown,
        }
    }

    /// Consume jobs until [`JobExecutor::shutdown`] is called or the queue
    /// closes, then wait for in-flight jobs.
    pub async fn run(&self, mut receiver: JobReceiver) -> WorkerResult<()> {
        info!(
            max_concurrent_jobs = self.config.max_concurrent_jobs,
            "Starting job executor"
        );

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            // Take a slot first so waiting jobs stay in the bounded queue.
            let permit = tokio::select! {
                biased;
                _ = shutdown_rx.wait_for(|stop| *stop) => break,
                permit = self.job_semaphore.clone().acquire_owned() => {
                    permit.map_err(|_| WorkerError::job_failed("Semaphore closed"))?
                }
            };

            let job = tokio::select! {
                biased;
                _ = shutdown_rx.wait_for(|stop| *stop) => break,
                job = receiver.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };

            let ctx = Arc::clone(&self.ctx);
            tokio::spawn(async move {
                let _permit = permit;
                execute_job(ctx, job).await;
            });
        }

        info!("Stopping job executor");
        receiver.close();
        self.release_queued(&mut receiver).await;

        info!("Waiting for in-flight jobs to complete...");
        if tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs())
            .await
            .is_err()
        {
            warn!(
                timeout_secs = self.config.shutdown_timeout.as_secs(),
                "In-flight jobs did not finish before the shutdown timeout"
            );
        }

        info!("Job executor stopped");
        Ok(())
    }

    /// Jobs that never started go back to `Pending` so they can be dispatched again.
    async fn release_queued(&self, receiver: &mut JobReceiver) {
        while let Some(job) = receiver.recv().await {
            self.release(&job).await;
        }
    }

    async fn release(&self, job: &InferenceJob) {
        match self.ctx.videos.release_dispatch(&job.file_id).await {
            Ok(()) => info!(file_id = %job.file_id, "Released queued job"),
            Err(e) => warn!(file_id = %job.file_id, "Failed to release queued job: {}", e),
        }
    }

    async fn wait_for_jobs(&self) {
        let all = self.config.max_concurrent_jobs as u32;
        // Every permit back means nothing is running.
        let _ = self.job_semaphore.acquire_many(all).await;
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
