//! Client error types.

use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid video: {0}")]
    Validation(#[from] vsa_models::UploadValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Upload rejected by storage with status {0}")]
    UploadFailed(u16),

    /// The job was still processing when the attempt ceiling was reached.
    #[error("Analysis timed out after {attempts} status checks")]
    Timeout { attempts: u32 },

    #[error("Polling cancelled")]
    Cancelled,
}

impl ClientError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout { .. })
    }
}
