//! Read-only job status.

use std::sync::Arc;

use vsa_db::VideoStore;
use vsa_models::{FileId, StatusResponse};

use crate::error::ApiResult;
use crate::services::dispatch::owned_file;

/// Projects stored job state into the client-facing status.
#[derive(Clone)]
pub struct JobStatusQuery {
    videos: Arc<dyn VideoStore>,
}

impl JobStatusQuery {
    pub fn new(videos: Arc<dyn VideoStore>) -> Self {
        Self { videos }
    }

    /// Never writes; safe to call as often as a client likes.
    pub async fn get_status(&self, user_id: &str, file_id: &FileId) -> ApiResult<StatusResponse> {
        let file = owned_file(self.videos.as_ref(), user_id, file_id).await?;

        let utterances = if file.analyzed() {
            self.videos.list_utterances(file_id).await?
        } else {
            Vec::new()
        };

        Ok(StatusResponse::from_state(file.state, &utterances))
    }
}
