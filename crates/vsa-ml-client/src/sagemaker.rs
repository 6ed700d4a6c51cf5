//! SageMaker runtime inference backend.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sagemakerruntime::config::http::HttpResponse;
use aws_sdk_sagemakerruntime::config::Region;
use aws_sdk_sagemakerruntime::error::SdkError;
use aws_sdk_sagemakerruntime::operation::invoke_endpoint::InvokeEndpointError;
use aws_sdk_sagemakerruntime::primitives::Blob;
use aws_sdk_sagemakerruntime::Client;
use tracing::{debug, info};

use crate::backend::InferenceBackend;
use crate::config::MlClientConfig;
use crate::error::{MlError, MlResult};
use crate::types::{InferenceRequest, InferenceResponse};

/// Client for a SageMaker real-time endpoint.
pub struct SageMakerClient {
    client: Client,
    endpoint_name: String,
}

impl SageMakerClient {
    pub async fn new(config: &MlClientConfig) -> MlResult<Self> {
        if config.endpoint_name.trim().is_empty() {
            return Err(MlError::config("SAGEMAKER_ENDPOINT_NAME is empty"));
        }

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .timeout_config(
                aws_config::timeout::TimeoutConfig::builder()
                    .operation_timeout(config.timeout)
                    .build(),
            )
            .load()
            .await;

        info!(
            endpoint = %config.endpoint_name,
            region = %config.region,
            "SageMaker client configured"
        );

        Ok(Self {
            client: Client::new(&sdk_config),
            endpoint_name: config.endpoint_name.clone(),
        })
    }
}

/// Classify an SDK failure for the retry policy.
fn classify(err: SdkError<InvokeEndpointError, HttpResponse>) -> MlError {
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            MlError::Unavailable(err.to_string())
        }
        SdkError::ServiceError(service) => {
            MlError::from_status(service.raw().status().as_u16(), service.err().to_string())
        }
        _ => MlError::Rejected(err.to_string()),
    }
}

#[async_trait]
impl InferenceBackend for SageMakerClient {
    async fn analyze(&self, video_path: &str) -> MlResult<InferenceResponse> {
        let payload = serde_json::to_vec(&InferenceRequest::new(video_path))
            .map_err(|e| MlError::config(e.to_string()))?;

        debug!(endpoint = %self.endpoint_name, video_path, "Invoking SageMaker endpoint");

        let output = self
            .client
            .invoke_endpoint()
            .endpoint_name(&self.endpoint_name)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(payload))
            .send()
            .await
            .map_err(classify)?;

        let body = output
            .body()
            .ok_or_else(|| MlError::invalid_response("empty response body"))?;
        let parsed = InferenceResponse::from_slice(body.as_ref())
            .map_err(|e| MlError::invalid_response(e.to_string()))?;

        info!(video_path, utterances = parsed.utterances.len(), "Inference finished");
        Ok(parsed)
    }

    fn name(&self) -> &'static str {
        "sagemaker"
    }
}
