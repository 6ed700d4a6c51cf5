//! HTTP inference backend.

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use crate::backend::InferenceBackend;
use crate::config::MlClientConfig;
use crate::error::{MlError, MlResult};
use crate::types::{InferenceRequest, InferenceResponse};

/// Client for a model served behind a plain HTTP endpoint.
pub struct HttpInferenceClient {
    client: Client,
    invocations_url: Url,
}

impl HttpInferenceClient {
    pub fn new(config: &MlClientConfig) -> MlResult<Self> {
        // `join` replaces the last segment unless the base ends with a slash.
        let mut base_url = config.base_url.clone();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let base = Url::parse(&base_url)
            .map_err(|e| MlError::config(format!("invalid INFERENCE_URL: {e}")))?;
        let invocations_url = base
            .join("invocations")
            .map_err(|e| MlError::config(format!("invalid INFERENCE_URL: {e}")))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MlError::config(e.to_string()))?;

        Ok(Self {
            client,
            invocations_url,
        })
    }
}

#[async_trait]
impl InferenceBackend for HttpInferenceClient {
    async fn analyze(&self, video_path: &str) -> MlResult<InferenceResponse> {
        debug!(url = %self.invocations_url, video_path, "Invoking inference endpoint");

        let response = self
            .client
            .post(self.invocations_url.clone())
            .json(&InferenceRequest::new(video_path))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MlError::from_status(status.as_u16(), body));
        }

        let body = response.bytes().await?;
        let parsed = InferenceResponse::from_slice(&body)
            .map_err(|e| MlError::invalid_response(e.to_string()))?;

        info!(video_path, utterances = parsed.utterances.len(), "Inference finished");
        Ok(parsed)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
