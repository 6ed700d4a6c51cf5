//! S3-compatible object store client.
//!
//! This crate provides:
//! - Presigned PUT URLs for direct client uploads
//! - Uploads through the service, streamed as multipart parts when large
//! - `s3://` object references handed to the inference endpoint
//! - The `ObjectStore` trait the API depends on

pub mod client;
pub mod error;
pub mod store;
pub mod streaming;

pub use client::{S3Client, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use store::{CompletedPart, ObjectStore};
pub use streaming::{StreamingUpload, DEFAULT_PART_SIZE};

#[cfg(any(test, feature = "mock"))]
pub use store::MockObjectStore;
