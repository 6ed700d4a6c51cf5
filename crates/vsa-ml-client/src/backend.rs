//! Inference backend abstraction.

use async_trait::async_trait;

use crate::error::MlResult;
use crate::types::InferenceResponse;

/// A remote model that turns a stored video into annotated utterances.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Run one inference over the video at `video_path` (`s3://bucket/key`).
    async fn analyze(&self, video_path: &str) -> MlResult<InferenceResponse>;

    /// Short backend name for logs and metrics.
    fn name(&self) -> &'static str;
}
