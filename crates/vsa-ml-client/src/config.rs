//! Inference client configuration.

use std::str::FromStr;
use std::time::Duration;

use crate::error::{MlError, MlResult};
use crate::retry::RetryConfig;

/// Which transport reaches the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Plain HTTP `POST <base>/invocations`
    Http,
    /// SageMaker runtime `InvokeEndpoint`
    SageMaker,
}

impl FromStr for BackendKind {
    type Err = MlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(BackendKind::Http),
            "sagemaker" => Ok(BackendKind::SageMaker),
            other => Err(MlError::config(format!("unknown inference backend: {other}"))),
        }
    }
}

/// Configuration for the inference client.
#[derive(Debug, Clone)]
pub struct MlClientConfig {
    pub backend: BackendKind,
    /// Base URL of the HTTP backend
    pub base_url: String,
    /// SageMaker endpoint name
    pub endpoint_name: String,
    pub region: String,
    /// Per-request timeout
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for MlClientConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::SageMaker,
            base_url: "http://localhost:8080".to_string(),
            endpoint_name: "sentiment-analysis-endpoint".to_string(),
            region: "eu-north-1".to_string(),
            timeout: Duration::from_secs(600),
            retry: RetryConfig::default(),
        }
    }
}

impl MlClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> MlResult<Self> {
        let defaults = Self::default();

        let backend = match std::env::var("INFERENCE_BACKEND") {
            Ok(v) => v.parse()?,
            Err(_) => defaults.backend,
        };

        let retry = RetryConfig {
            max_retries: std::env::var("INFERENCE_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.retry.max_retries),
            ..defaults.retry.clone()
        };

        Ok(Self {
            backend,
            base_url: std::env::var("INFERENCE_URL").unwrap_or(defaults.base_url),
            endpoint_name: std::env::var("SAGEMAKER_ENDPOINT_NAME")
                .unwrap_or(defaults.endpoint_name),
            region: std::env::var("AWS_REGION").unwrap_or(defaults.region),
            timeout: std::env::var("INFERENCE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            retry,
        })
    }
}
