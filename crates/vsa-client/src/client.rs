//! Upload and status polling.

use std::path::Path;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;
use vsa_models::{validate_upload_size, validate_video_file_name, FileId, StatusResponse};

use crate::config::{ClientConfig, PollConfig};
use crate::error::{ClientError, ClientResult};
use crate::types::{
    ErrorBody, StartAnalysisRequest, StartAnalysisResponse, UploadUrlRequest, UploadUrlResponse,
};

/// Talks to the analysis API on behalf of one API key.
#[derive(Debug)]
pub struct PollingClient {
    http: Client,
    base_url: Url,
    api_key: String,
    poll: PollConfig,
}

/// Resolves once `cancel` flips to `true`; never if its sender goes away.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

impl PollingClient {
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        // `join` replaces the last segment unless the base ends with a slash.
        let mut base_url = config.base_url;
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let base_url = Url::parse(&base_url)
            .map_err(|e| ClientError::config(format!("invalid base URL: {e}")))?;

        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key,
            poll: config.poll,
        })
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::config(format!("invalid endpoint {path}: {e}")))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(AUTHORIZATION, format!("Bearer {}", self.api_key))
    }

    async fn parse<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Ask the API for a presigned upload URL.
    pub async fn request_upload_url(
        &self,
        file_name: &str,
        file_type: &str,
    ) -> ClientResult<UploadUrlResponse> {
        let response = self
            .authorized(self.http.post(self.endpoint("api/upload-url")?))
            .json(&UploadUrlRequest {
                file_name,
                file_type,
            })
            .send()
            .await?;
        Self::parse(response).await
    }

    /// PUT the bytes to a presigned URL. No API key is sent to storage.
    pub async fn put_object(&self, upload_url: &str, content_type: &str, data: Vec<u8>) -> ClientResult<()> {
        let response = self
            .http
            .put(upload_url)
            .header(CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::UploadFailed(status.as_u16()));
        }
        Ok(())
    }

    pub async fn start_analysis(&self, file_id: &FileId) -> ClientResult<StartAnalysisResponse> {
        let response = self
            .authorized(self.http.post(self.endpoint("api/start-analysis")?))
            .json(&StartAnalysisRequest { file_id })
            .send()
            .await?;
        Self::parse(response).await
    }

    /// One status query.
    pub async fn get_status(&self, file_id: &FileId) -> ClientResult<StatusResponse> {
        let mut url = self.endpoint("api/analysis-status")?;
        url.query_pairs_mut().append_pair("fileId", file_id.as_str());

        let response = self.authorized(self.http.get(url)).send().await?;
        Self::parse(response).await
    }

    /// Poll until the job is `completed` or `failed`.
    ///
    /// A server-reported failure is returned as a status; running out of
    /// attempts is [`ClientError::Timeout`].
    pub async fn poll_until_terminal(&self, file_id: &FileId) -> ClientResult<StatusResponse> {
        let (_keep, cancel) = watch::channel(false);
        self.poll_with_cancel(file_id, cancel).await
    }

    /// [`PollingClient::poll_until_terminal`] that stops with
    /// [`ClientError::Cancelled`] once `cancel` is set. Nothing is sent to
    /// the server on cancellation.
    pub async fn poll_with_cancel(
        &self,
        file_id: &FileId,
        mut cancel: watch::Receiver<bool>,
    ) -> ClientResult<StatusResponse> {
        let max_attempts = self.poll.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let status = tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => return Err(ClientError::Cancelled),
                status = self.get_status(file_id) => status?,
            };
            debug!(file_id = %file_id, attempt, status = %status.status, "Polled analysis status");

            if status.status.is_terminal() {
                info!(file_id = %file_id, attempt, status = %status.status, "Analysis finished");
                return Ok(status);
            }
            if attempt == max_attempts {
                break;
            }

            tokio::select! {
                biased;
                _ = cancelled(&mut cancel) => return Err(ClientError::Cancelled),
                _ = tokio::time::sleep(self.poll.interval) => {}
            }
        }

        warn!(file_id = %file_id, attempts = max_attempts, "Gave up waiting for analysis");
        Err(ClientError::Timeout {
            attempts: max_attempts,
        })
    }

    /// Upload a local video, start its analysis and wait for the result.
    ///
    /// The file is checked locally first with the same rules the API applies.
    pub async fn upload_and_analyze(&self, path: impl AsRef<Path>) -> ClientResult<StatusResponse> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();
        let (extension, _) = validate_video_file_name(file_name)?;
        let size = tokio::fs::metadata(path).await?.len();
        validate_upload_size(size)?;

        let content_type = extension.content_type();
        let handle = self.request_upload_url(file_name, content_type).await?;
        info!(file_id = %handle.file_id, size, "Uploading video");

        let data = tokio::fs::read(path).await?;
        self.put_object(&handle.upload_url, content_type, data).await?;

        self.start_analysis(&handle.file_id).await?;
        info!(file_id = %handle.file_id, "Analysis started, polling for results");

        self.poll_until_terminal(&handle.file_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = PollingClient::new(ClientConfig::new("http://localhost:8000/v1", "sk")).unwrap();
        assert_eq!(
            client.endpoint("api/analysis-status").unwrap().as_str(),
            "http://localhost:8000/v1/api/analysis-status"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = PollingClient::new(ClientConfig::new("not a url", "sk")).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }
}
