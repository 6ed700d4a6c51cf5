//! Bounded job queue backed by a tokio mpsc channel.

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::error::{QueueError, QueueResult};
use crate::job::InferenceJob;

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Jobs that may wait for a worker before dispatch is refused
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 64 }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            capacity: std::env::var("QUEUE_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|c: &usize| *c > 0)
                .unwrap_or(64),
        }
    }
}

/// Producer side, cloned into request handlers.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<InferenceJob>,
    capacity: usize,
}

/// Consumer side, owned by the worker pool.
pub struct JobReceiver {
    rx: mpsc::Receiver<InferenceJob>,
}

impl JobQueue {
    /// Create a queue and its single consumer.
    pub fn new(config: QueueConfig) -> (Self, JobReceiver) {
        let capacity = config.capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        info!(capacity, "Job queue created");
        (Self { tx, capacity }, JobReceiver { rx })
    }

    /// Enqueue without waiting. Fails fast when the queue is full.
    pub fn try_enqueue(&self, job: InferenceJob) -> QueueResult<()> {
        let job_id = job.job_id.clone();
        let file_id = job.file_id.clone();

        match self.tx.try_send(job) {
            Ok(()) => {
                debug!(job_id = %job_id, file_id = %file_id, "Job enqueued");
                metrics::counter!("vsa_jobs_enqueued_total").increment(1);
                metrics::gauge!("vsa_queue_depth").set(self.len() as f64);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                warn!(file_id = %file_id, capacity = self.capacity, "Job queue full");
                metrics::counter!("vsa_jobs_rejected_total", "reason" => "full").increment(1);
                Err(QueueError::Full {
                    capacity: self.capacity,
                })
            }
            Err(TrySendError::Closed(_)) => Err(QueueError::Closed),
        }
    }

    /// Jobs waiting for a worker.
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl JobReceiver {
    /// Next job, or `None` once the queue is closed and drained.
    pub async fn recv(&mut self) -> Option<InferenceJob> {
        let job = self.rx.recv().await;
        if job.is_some() {
            metrics::gauge!("vsa_queue_depth").set(self.rx.len() as f64);
        }
        job
    }

    /// Refuse new jobs; already queued ones stay receivable.
    pub fn close(&mut self) {
        self.rx.close();
    }
}
