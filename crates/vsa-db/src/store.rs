//! Store traits shared by the Postgres and in-memory backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use vsa_models::{ApiQuota, FileId, JobState, NewUtterance, QuotaDecision, Utterance, VideoFile};

use crate::error::DbResult;

/// Outcome of trying to move a file into `Processing`.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchClaim {
    /// The file is now `Processing`; carries the updated record.
    Claimed(VideoFile),
    /// Another dispatch for this file is in flight.
    AlreadyProcessing,
    /// No such file.
    NotFound,
}

/// Quota records. Mutated only through [`QuotaStore::consume`].
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Look up a quota by its bearer secret.
    async fn find_by_secret_key(&self, secret_key: &str) -> DbResult<Option<ApiQuota>>;

    async fn find_quota(&self, user_id: &str) -> DbResult<Option<ApiQuota>>;

    /// Evaluate and apply one consuming request as a single atomic step.
    ///
    /// Returns `None` when the user has no quota record.
    async fn consume(&self, user_id: &str, now: DateTime<Utc>)
        -> DbResult<Option<QuotaDecision>>;

    /// Create or replace a quota record.
    async fn upsert_quota(&self, quota: &ApiQuota) -> DbResult<()>;
}

/// Video files, their job state and utterances.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn create_video(&self, file: &VideoFile) -> DbResult<()>;

    async fn get_video(&self, id: &FileId) -> DbResult<Option<VideoFile>>;

    /// Move a file into `Processing` unless it is already there.
    async fn begin_dispatch(&self, id: &FileId) -> DbResult<DispatchClaim>;

    /// Replace the file's utterances and record the terminal state in one
    /// transaction. The file must be `Processing`.
    async fn complete_job(&self, id: &FileId, utterances: Vec<NewUtterance>)
        -> DbResult<JobState>;

    /// Return a `Processing` file to `Pending`, recording why.
    async fn fail_job(&self, id: &FileId, error: &str) -> DbResult<()>;

    /// Undo [`VideoStore::begin_dispatch`] when the job never started.
    async fn release_dispatch(&self, id: &FileId) -> DbResult<()>;

    /// Refresh the claim on a `Processing` file as a worker starts on it.
    /// Returns `false` when the file is no longer `Processing`.
    async fn mark_started(&self, id: &FileId) -> DbResult<bool>;

    /// Return `Processing` files whose claim was last refreshed before
    /// `stale_before` to `Pending`, recording `reason`. Returns the number of
    /// files reset.
    async fn recover_orphaned(&self, stale_before: DateTime<Utc>, reason: &str)
        -> DbResult<u64>;

    /// Utterances of a file in inference order.
    async fn list_utterances(&self, id: &FileId) -> DbResult<Vec<Utterance>>;

    /// Cheap round trip used by readiness probes.
    async fn ping(&self) -> DbResult<()>;
}
