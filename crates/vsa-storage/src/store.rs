//! Object store abstraction consumed by the upload and dispatch paths.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StorageResult;

/// A part accepted by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: i32,
    pub e_tag: String,
}

/// Operations the service needs from the object store.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Issue a time-limited URL the client can `PUT` raw bytes to.
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Write bytes streamed through the service.
    async fn upload_bytes(&self, key: &str, data: Vec<u8>, content_type: &str)
        -> StorageResult<()>;

    /// Open a multipart upload and return its upload id.
    async fn create_multipart_upload(&self, key: &str, content_type: &str)
        -> StorageResult<String>;

    /// Upload one part (numbered from 1) of a multipart upload.
    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        data: Vec<u8>,
    ) -> StorageResult<CompletedPart>;

    /// Assemble the uploaded parts into the final object.
    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: Vec<CompletedPart>,
    ) -> StorageResult<()>;

    /// Discard a multipart upload and its parts.
    async fn abort_multipart_upload(&self, key: &str, upload_id: &str) -> StorageResult<()>;

    /// Reference to an object as understood by the inference endpoint.
    fn object_uri(&self, key: &str) -> String;

    /// Check connectivity to the bucket.
    async fn check_connectivity(&self) -> StorageResult<()>;
}

/// Validate an object key before it is sent to the store.
pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    use crate::error::StorageError;

    if key.is_empty() {
        return Err(StorageError::InvalidKey("empty key".into()));
    }
    if key.starts_with('/') || key.split('/').any(|part| part == "..") {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        assert!(validate_key("inference/abc.mp4").is_ok());
        assert!(validate_key("").is_err());
        assert!(validate_key("/inference/abc.mp4").is_err());
        assert!(validate_key("inference/../secrets").is_err());
    }

    #[tokio::test]
    async fn test_mock_store_presign() {
        let mut store = MockObjectStore::new();
        store
            .expect_presign_put()
            .withf(|key, content_type, expires| {
                key == "inference/x.mp4"
                    && content_type == "video/mp4"
                    && *expires == Duration::from_secs(300)
            })
            .returning(|_, _, _| Ok("https://signed.example/x".to_string()));

        let url = store
            .presign_put("inference/x.mp4", "video/mp4", Duration::from_secs(300))
            .await
            .unwrap();
        assert_eq!(url, "https://signed.example/x");
    }
}
