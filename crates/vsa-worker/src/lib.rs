//! Inference worker pool.
//!
//! Consumes [`vsa_queue::InferenceJob`]s with bounded concurrency, calls the
//! inference backend and reconciles the outcome into the store. Claims abandoned by a crashed
//! replica are swept back to `Pending` by [`recovery`].

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod processor;
pub mod recovery;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::JobExecutor;
pub use logging::JobLogger;
pub use processor::{process_inference, ProcessingContext};
pub use recovery::{recover_stale_claims, spawn_stale_claim_sweeper, STALE_CLAIM_REASON};
