//! Inference client error types.

use thiserror::Error;

/// Result type for inference calls.
pub type MlResult<T> = Result<T, MlError>;

/// Errors that can occur while invoking the inference endpoint.
#[derive(Debug, Error)]
pub enum MlError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Endpoint throttled the request")]
    Throttled,

    #[error("Endpoint unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Endpoint rejected the request: {0}")]
    Rejected(String),
}

impl MlError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Map a non-success HTTP status to an error.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        match status {
            429 => Self::Throttled,
            _ => Self::Status {
                status,
                body: body.into(),
            },
        }
    }

    /// Whether another attempt might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            MlError::Network(e) => e.is_timeout() || e.is_connect(),
            MlError::Status { status, .. } => *status >= 500,
            MlError::Throttled | MlError::Unavailable(_) => true,
            MlError::Config(_) | MlError::InvalidResponse(_) | MlError::Rejected(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(MlError::from_status(503, "busy").is_retryable());
        assert!(MlError::from_status(429, "").is_retryable());
        assert!(!MlError::from_status(400, "bad video_path").is_retryable());
        assert!(!MlError::invalid_response("missing utterances").is_retryable());
        assert!(MlError::Unavailable("dns".into()).is_retryable());
    }
}
