//! Application state.

use std::sync::Arc;

use vsa_db::{QuotaLedger, VideoStore};
use vsa_queue::JobQueue;
use vsa_storage::ObjectStore;

use crate::config::ApiConfig;
use crate::middleware::{ip_rate_limiter, IpRateLimiter};
use crate::services::{InferenceDispatcher, JobStatusQuery, UploadBroker};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub storage: Arc<dyn ObjectStore>,
    pub videos: Arc<dyn VideoStore>,
    pub ledger: QuotaLedger,
    pub queue: JobQueue,
    pub uploads: UploadBroker,
    pub dispatcher: InferenceDispatcher,
    pub status: JobStatusQuery,
    pub rate_limiter: Arc<IpRateLimiter>,
}

impl AppState {
    /// Wire the services around already constructed collaborators.
    pub fn new(
        config: ApiConfig,
        storage: Arc<dyn ObjectStore>,
        videos: Arc<dyn VideoStore>,
        ledger: QuotaLedger,
        queue: JobQueue,
    ) -> Self {
        let uploads = UploadBroker::new(
            Arc::clone(&storage),
            Arc::clone(&videos),
            config.upload_url_expiry,
            config.upload_key_prefix.clone(),
        );
        let dispatcher = InferenceDispatcher::new(
            Arc::clone(&videos),
            ledger.clone(),
            Arc::clone(&storage),
            queue.clone(),
        );
        let status = JobStatusQuery::new(Arc::clone(&videos));
        let rate_limiter = ip_rate_limiter(config.rate_limit_rps, config.rate_limit_burst);

        Self {
            config,
            storage,
            videos,
            ledger,
            queue,
            uploads,
            dispatcher,
            status,
            rate_limiter,
        }
    }
}
