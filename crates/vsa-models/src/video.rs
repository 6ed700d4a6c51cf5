//! Uploaded video file records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::job::JobState;

/// Unique identifier for an uploaded video file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct FileId(pub String);

impl FileId {
    /// Generate a new random file ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for FileId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for FileId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A video uploaded for analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoFile {
    /// Unique file ID
    pub id: FileId,

    /// Object store key
    pub key: String,

    /// Owning user ID
    pub user_id: String,

    /// Job state
    #[serde(default)]
    pub state: JobState,

    /// Error recorded by the last failed dispatch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl VideoFile {
    /// Create a new, not yet analyzed, video file.
    pub fn new(id: FileId, key: impl Into<String>, user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            key: key.into(),
            user_id: user_id.into(),
            state: JobState::Pending,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether inference has completed for this file.
    pub fn analyzed(&self) -> bool {
        self.state.is_analyzed()
    }

    /// Whether this file belongs to the given user.
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_video_file_is_pending() {
        let file = VideoFile::new(FileId::new(), "inference/a.mp4", "user-1");
        assert_eq!(file.state, JobState::Pending);
        assert!(!file.analyzed());
        assert!(file.is_owned_by("user-1"));
        assert!(!file.is_owned_by("user-2"));
    }

    #[test]
    fn test_file_id_serializes_transparently() {
        let id = FileId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
    }
}
