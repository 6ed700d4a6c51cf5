//! Bounded in-process job queue.
//!
//! This crate provides:
//! - The `InferenceJob` payload handed from the dispatcher to the worker pool
//! - A bounded channel whose full state pushes back on dispatch

pub mod error;
pub mod job;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use job::InferenceJob;
pub use queue::{JobQueue, JobReceiver, QueueConfig};
