//! Wire types exchanged with the inference endpoint.

use serde::{Deserialize, Serialize};
use vsa_models::NewUtterance;

/// Request body: a reference to the uploaded video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceRequest {
    /// `s3://<bucket>/<key>`
    pub video_path: String,
}

impl InferenceRequest {
    pub fn new(video_path: impl Into<String>) -> Self {
        Self {
            video_path: video_path.into(),
        }
    }
}

/// Response body: utterances in the order the model produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub utterances: Vec<NewUtterance>,
}

impl InferenceResponse {
    /// Parse a response body.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}
