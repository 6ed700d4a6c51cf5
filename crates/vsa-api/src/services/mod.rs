//! Business logic services.

pub mod dispatch;
pub mod status;
pub mod upload;

pub use dispatch::{DispatchAccepted, InferenceDispatcher};
pub use status::JobStatusQuery;
pub use upload::{IncomingUpload, StoredUpload, UploadBroker, UploadHandle};
