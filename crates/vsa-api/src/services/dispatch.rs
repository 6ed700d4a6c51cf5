//! Inference dispatch.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use vsa_db::{DispatchClaim, QuotaLedger, VideoStore};
use vsa_models::{FileId, JobStatus, VideoFile};
use vsa_queue::{InferenceJob, JobQueue};
use vsa_storage::ObjectStore;

use crate::error::{ApiError, ApiResult};
use crate::metrics;

/// Acknowledgement of an accepted dispatch.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchAccepted {
    pub file_id: FileId,
    pub status: JobStatus,
    pub message: String,
}

/// Look up a file and make sure `user_id` owns it.
pub(crate) async fn owned_file(
    videos: &dyn VideoStore,
    user_id: &str,
    file_id: &FileId,
) -> ApiResult<VideoFile> {
    let file = videos
        .get_video(file_id)
        .await?
        .ok_or_else(|| ApiError::not_found("File not found"))?;

    if !file.is_owned_by(user_id) {
        warn!(user_id, file_id = %file_id, "Access to another user's file denied");
        return Err(ApiError::forbidden("Not authorized to access this file"));
    }
    Ok(file)
}

/// Validates a dispatch request and hands the job to the worker pool.
#[derive(Clone)]
pub struct InferenceDispatcher {
    videos: Arc<dyn VideoStore>,
    ledger: QuotaLedger,
    storage: Arc<dyn ObjectStore>,
    queue: JobQueue,
}

impl InferenceDispatcher {
    pub fn new(
        videos: Arc<dyn VideoStore>,
        ledger: QuotaLedger,
        storage: Arc<dyn ObjectStore>,
        queue: JobQueue,
    ) -> Self {
        Self {
            videos,
            ledger,
            storage,
            queue,
        }
    }

    /// Accept a file for analysis without waiting for the result.
    ///
    /// Ownership and quota are checked before anything changes. The file is
    /// then claimed for processing; a claim that cannot be queued is released
    /// again so the file stays dispatchable.
    pub async fn start_job(&self, user_id: &str, file_id: &FileId) -> ApiResult<DispatchAccepted> {
        owned_file(self.videos.as_ref(), user_id, file_id).await?;

        if !self.ledger.check_and_consume(user_id, false).await? {
            metrics::record_quota_denied();
            return Err(ApiError::QuotaExceeded);
        }

        let file = match self.videos.begin_dispatch(file_id).await? {
            DispatchClaim::Claimed(file) => file,
            DispatchClaim::AlreadyProcessing => {
                return Err(ApiError::conflict("Analysis already in progress"))
            }
            DispatchClaim::NotFound => return Err(ApiError::not_found("File not found")),
        };

        let video_path = self.storage.object_uri(&file.key);
        let job = InferenceJob::new(file.id.clone(), user_id, file.key.clone(), video_path);
        let job_id = job.job_id.clone();

        if let Err(e) = self.queue.try_enqueue(job) {
            if let Err(release_err) = self.videos.release_dispatch(file_id).await {
                warn!(file_id = %file_id, "Failed to release unqueued file: {}", release_err);
            }
            return Err(e.into());
        }

        info!(user_id, file_id = %file_id, job_id = %job_id, "Analysis dispatched");

        Ok(DispatchAccepted {
            file_id: file.id,
            status: JobStatus::Processing,
            message: "Analysis started".to_string(),
        })
    }
}
