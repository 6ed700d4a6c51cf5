//! Client for the sentiment inference endpoint.
//!
//! The model receives `{"video_path": "s3://bucket/key"}` and answers with
//! `{"utterances": [...]}`. Two transports are supported: a plain HTTP
//! endpoint and a SageMaker real-time endpoint.

pub mod backend;
pub mod config;
pub mod error;
pub mod http;
pub mod retry;
pub mod sagemaker;
pub mod types;

use std::sync::Arc;

pub use backend::InferenceBackend;
pub use config::{BackendKind, MlClientConfig};
pub use error::{MlError, MlResult};
pub use http::HttpInferenceClient;
pub use retry::{with_retry, RetryConfig};
pub use sagemaker::SageMakerClient;
pub use types::{InferenceRequest, InferenceResponse};

#[cfg(any(test, feature = "mock"))]
pub use backend::MockInferenceBackend;

/// Build the backend selected by `config`.
pub async fn build_backend(config: &MlClientConfig) -> MlResult<Arc<dyn InferenceBackend>> {
    Ok(match config.backend {
        BackendKind::Http => Arc::new(HttpInferenceClient::new(config)?),
        BackendKind::SageMaker => Arc::new(SageMakerClient::new(config).await?),
    })
}
