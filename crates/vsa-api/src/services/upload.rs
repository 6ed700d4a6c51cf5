//! Upload handles and streamed uploads.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;
use vsa_db::VideoStore;
use vsa_models::{validate_upload_size, validate_video_file_name, FileId, VideoFile};
use vsa_storage::{ObjectStore, StreamingUpload, DEFAULT_PART_SIZE};

use crate::error::{ApiError, ApiResult};
use crate::metrics;

/// Where the client should PUT the bytes and how to refer to the file later.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadHandle {
    pub upload_url: String,
    pub key: String,
    pub file_id: FileId,
}

/// A file stored through the service.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredUpload {
    pub key: String,
    pub file_id: FileId,
}

/// A video being received by the service.
pub struct IncomingUpload {
    file_id: FileId,
    upload: StreamingUpload,
}

impl IncomingUpload {
    pub async fn write(&mut self, chunk: &[u8]) -> ApiResult<()> {
        Ok(self.upload.write(chunk).await?)
    }

    /// Give up on the upload and discard anything already stored.
    pub async fn abort(&self) {
        self.upload.abort().await;
    }
}

/// Issues presigned upload URLs and registers the files they point at.
#[derive(Clone)]
pub struct UploadBroker {
    storage: Arc<dyn ObjectStore>,
    videos: Arc<dyn VideoStore>,
    expiry: Duration,
    key_prefix: String,
    part_size: usize,
}

impl UploadBroker {
    pub fn new(
        storage: Arc<dyn ObjectStore>,
        videos: Arc<dyn VideoStore>,
        expiry: Duration,
        key_prefix: impl Into<String>,
    ) -> Self {
        Self {
            storage,
            videos,
            expiry,
            key_prefix: key_prefix.into(),
            part_size: DEFAULT_PART_SIZE,
        }
    }

    /// Part size for streamed uploads.
    pub fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size;
        self
    }

    fn new_key(&self, file_id: &FileId, extension: &str) -> String {
        format!("{}/{}.{}", self.key_prefix, file_id, extension)
    }

    /// Validate the name, presign a PUT for a fresh key and record the file
    /// as `Pending`. Nothing is touched when the name is rejected.
    pub async fn issue_upload_handle(
        &self,
        user_id: &str,
        file_name: &str,
        content_type: &str,
    ) -> ApiResult<UploadHandle> {
        let (_, extension) = validate_video_file_name(file_name)?;
        if content_type.trim().is_empty() {
            return Err(ApiError::bad_request("fileType is required"));
        }

        let file_id = FileId::new();
        let key = self.new_key(&file_id, extension);

        let upload_url = self
            .storage
            .presign_put(&key, content_type, self.expiry)
            .await?;

        let file = VideoFile::new(file_id.clone(), key.clone(), user_id);
        self.videos.create_video(&file).await?;

        info!(user_id, file_id = %file_id, key = %key, "Issued upload URL");
        metrics::record_upload("presigned");

        Ok(UploadHandle {
            upload_url,
            key,
            file_id,
        })
    }

    /// Start receiving a video through the service. The name is checked
    /// before anything is stored.
    pub fn begin_stream(&self, file_name: &str) -> ApiResult<IncomingUpload> {
        let (ext, extension) = validate_video_file_name(file_name)?;
        let file_id = FileId::new();
        let key = self.new_key(&file_id, extension);
        let upload = StreamingUpload::new(Arc::clone(&self.storage), key, ext.content_type())
            .with_part_size(self.part_size);
        Ok(IncomingUpload { file_id, upload })
    }

    /// Finish a streamed upload and record the file as `Pending`.
    ///
    /// The minimum size applies to the total received; a short upload never
    /// reaches the store because it fits in the first part.
    pub async fn finish_stream(
        &self,
        user_id: &str,
        incoming: IncomingUpload,
    ) -> ApiResult<StoredUpload> {
        if let Err(e) = validate_upload_size(incoming.upload.written()) {
            incoming.abort().await;
            return Err(e.into());
        }

        let IncomingUpload { file_id, upload } = incoming;
        let key = upload.key().to_string();
        let size = upload.finish().await?;

        let file = VideoFile::new(file_id.clone(), key.clone(), user_id);
        self.videos.create_video(&file).await?;

        info!(user_id, file_id = %file_id, key = %key, size, "Stored uploaded video");
        metrics::record_upload("streamed");

        Ok(StoredUpload { key, file_id })
    }
}
