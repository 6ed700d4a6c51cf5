//! Shared data models for the video sentiment analysis backend.
//!
//! This crate provides Serde-serializable types for:
//! - Video files and their job state
//! - Utterances returned by the inference model
//! - Per-user API quotas and the rolling-window decision
//! - Status responses and the normalized analysis envelope
//! - Upload file name validation

pub mod job;
pub mod quota;
pub mod status;
pub mod upload;
pub mod utterance;
pub mod video;

// Re-export common types
pub use job::{JobId, JobState};
pub use quota::{ApiQuota, QuotaDecision, QUOTA_WINDOW_DAYS};
pub use status::{AnalysisEnvelope, AnalysisPayload, JobStatus, StatusResponse, UtteranceView};
pub use upload::{
    validate_upload_size, validate_video_file_name, UploadValidationError, VideoExtension,
    MIN_UPLOAD_BYTES,
};
pub use utterance::{LabelScore, NewUtterance, ScoreDistribution, Utterance};
pub use video::{FileId, VideoFile};
