//! Job payload for the inference queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vsa_models::{FileId, JobId};

/// Run inference over one uploaded video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceJob {
    /// Unique job ID
    pub job_id: JobId,
    /// File being analyzed
    pub file_id: FileId,
    /// Owner, charged on completion
    pub user_id: String,
    /// Object store key
    pub key: String,
    /// Reference handed to the model (`s3://bucket/key`)
    pub video_path: String,
    /// When the job was enqueued
    pub created_at: DateTime<Utc>,
}

impl InferenceJob {
    pub fn new(
        file_id: FileId,
        user_id: impl Into<String>,
        key: impl Into<String>,
        video_path: impl Into<String>,
    ) -> Self {
        Self {
            job_id: JobId::new(),
            file_id,
            user_id: user_id.into(),
            key: key.into(),
            video_path: video_path.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_job() {
        let job = InferenceJob::new(
            FileId::from("f-1"),
            "user-1",
            "inference/f-1.mp4",
            "s3://bucket/inference/f-1.mp4",
        );
        assert!(!job.job_id.as_str().is_empty());

        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["file_id"], "f-1");
        assert_eq!(json["video_path"], "s3://bucket/inference/f-1.mp4");
    }
}
