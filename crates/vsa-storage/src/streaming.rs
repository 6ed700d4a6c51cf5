//! Chunked uploads that never hold more than one part in memory.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::StorageResult;
use crate::store::{CompletedPart, ObjectStore};

/// Part size used for multipart uploads (S3 requires at least 5 MiB for
/// every part but the last).
pub const DEFAULT_PART_SIZE: usize = 8 * 1024 * 1024;

/// Writes an object chunk by chunk.
///
/// Objects smaller than one part go up with a single PUT; larger ones switch
/// to a multipart upload on the first full part.
pub struct StreamingUpload {
    store: Arc<dyn ObjectStore>,
    key: String,
    content_type: String,
    part_size: usize,
    buffer: Vec<u8>,
    upload_id: Option<String>,
    parts: Vec<CompletedPart>,
    written: u64,
}

impl StreamingUpload {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        key: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            store,
            key: key.into(),
            content_type: content_type.into(),
            part_size: DEFAULT_PART_SIZE,
            buffer: Vec::new(),
            upload_id: None,
            parts: Vec::new(),
            written: 0,
        }
    }

    pub fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size.max(1);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Bytes received so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Append a chunk, uploading every part that fills up.
    pub async fn write(&mut self, chunk: &[u8]) -> StorageResult<()> {
        self.written += chunk.len() as u64;

        let mut rest = chunk;
        while !rest.is_empty() {
            let take = (self.part_size - self.buffer.len()).min(rest.len());
            self.buffer.extend_from_slice(&rest[..take]);
            rest = &rest[take..];

            if self.buffer.len() == self.part_size {
                self.flush_part().await?;
            }
        }
        Ok(())
    }

    async fn flush_part(&mut self) -> StorageResult<()> {
        let upload_id = match &self.upload_id {
            Some(id) => id.clone(),
            None => {
                let id = self
                    .store
                    .create_multipart_upload(&self.key, &self.content_type)
                    .await?;
                self.upload_id = Some(id.clone());
                id
            }
        };

        let part_number = self.parts.len() as i32 + 1;
        let data = std::mem::take(&mut self.buffer);
        let part = self
            .store
            .upload_part(&self.key, &upload_id, part_number, data)
            .await?;
        self.parts.push(part);
        Ok(())
    }

    async fn complete(&mut self) -> StorageResult<()> {
        let Some(upload_id) = self.upload_id.clone() else {
            let data = std::mem::take(&mut self.buffer);
            return self
                .store
                .upload_bytes(&self.key, data, &self.content_type)
                .await;
        };

        if !self.buffer.is_empty() {
            self.flush_part().await?;
        }
        let parts = std::mem::take(&mut self.parts);
        self.store
            .complete_multipart_upload(&self.key, &upload_id, parts)
            .await
    }

    /// Write the final object and return its size. A failed multipart upload
    /// is aborted.
    pub async fn finish(mut self) -> StorageResult<u64> {
        match self.complete().await {
            Ok(()) => {
                debug!(key = %self.key, size = self.written, "Streamed upload finished");
                Ok(self.written)
            }
            Err(e) => {
                self.abort().await;
                Err(e)
            }
        }
    }

    /// Discard parts already uploaded. Nothing is stored before the first
    /// full part, so this is a no-op for small objects.
    pub async fn abort(&self) {
        if let Some(upload_id) = &self.upload_id {
            if let Err(e) = self.store.abort_multipart_upload(&self.key, upload_id).await {
                warn!(key = %self.key, "Failed to abort multipart upload: {}", e);
            }
        }
    }
}
