//! Worker error types.

use std::time::Duration;

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Job timed out after {0:?}")]
    Timeout(Duration),

    #[error("Inference failed: {0}")]
    Inference(#[from] vsa_ml_client::MlError),

    #[error("Database error: {0}")]
    Db(#[from] vsa_db::DbError),

    #[error("Queue error: {0}")]
    Queue(#[from] vsa_queue::QueueError),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::JobFailed(_) => "job",
            WorkerError::Timeout(_) => "timeout",
            WorkerError::Inference(_) => "inference",
            WorkerError::Db(_) => "db",
            WorkerError::Queue(_) => "queue",
        }
    }
}
