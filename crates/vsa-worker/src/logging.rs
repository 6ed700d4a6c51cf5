//! Structured job logging.

use tracing::{error, info, warn, Span};
use vsa_queue::InferenceJob;

/// Logs job lifecycle events with the job and file attached.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    file_id: String,
}

impl JobLogger {
    pub fn new(job: &InferenceJob) -> Self {
        Self {
            job_id: job.job_id.to_string(),
            file_id: job.file_id.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(job_id = %self.job_id, file_id = %self.file_id, "Job started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(job_id = %self.job_id, file_id = %self.file_id, "Job progress: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, file_id = %self.file_id, "Job warning: {}", message);
    }

    pub fn log_error(&self, message: &str) {
        error!(job_id = %self.job_id, file_id = %self.file_id, "Job error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(job_id = %self.job_id, file_id = %self.file_id, "Job completed: {}", message);
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Span wrapping everything done for this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("inference_job", job_id = %self.job_id, file_id = %self.file_id)
    }
}
