//! Client for the analysis API.
//!
//! Mirrors the browser flow: request an upload URL, PUT the bytes, start the
//! analysis, then poll the status endpoint at a fixed interval until the job
//! reaches a terminal state or the attempt ceiling is hit.

pub mod client;
pub mod config;
pub mod error;
pub mod types;

pub use client::PollingClient;
pub use config::{ClientConfig, PollConfig};
pub use error::{ClientError, ClientResult};
pub use types::{StartAnalysisResponse, UploadUrlResponse};
