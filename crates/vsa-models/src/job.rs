//! Job identifiers and the stored job state machine.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for one dispatch of an inference job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stored lifecycle state of a video file's analysis job.
///
/// `Pending` covers both "never dispatched" and "last dispatch failed";
/// a failed inference call hands the file back to `Pending` so that pollers
/// keep seeing `processing` until they give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Uploaded, not in flight
    #[default]
    Pending,
    /// Dispatch accepted, inference in flight
    Processing,
    /// Inference succeeded with at least one utterance
    Completed,
    /// Inference succeeded but produced nothing
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    /// Whether inference has run to completion for this file.
    pub fn is_analyzed(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// Whether a new dispatch may start from this state.
    pub fn can_dispatch(&self) -> bool {
        !matches!(self, JobState::Processing)
    }

    /// Terminal state reached by a successful inference call.
    pub fn after_inference(utterance_count: usize) -> Self {
        if utterance_count == 0 {
            JobState::Failed
        } else {
            JobState::Completed
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown job state string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job state: {0}")]
pub struct UnknownJobState(pub String);

impl FromStr for JobState {
    type Err = UnknownJobState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobState::Pending),
            "processing" => Ok(JobState::Processing),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            other => Err(UnknownJobState(other.to_string())),
        }
    }
}
