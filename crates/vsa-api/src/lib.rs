//! Axum HTTP API server.
//!
//! This crate provides:
//! - Presigned and streamed video uploads
//! - Asynchronous analysis dispatch onto the worker pool
//! - Status polling and quota reporting behind API-key authentication
//! - Rate limiting, security headers and Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use auth::ApiKeyUser;
pub use config::{ApiConfig, StoreBackend};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{InferenceDispatcher, JobStatusQuery, UploadBroker};
pub use state::AppState;
