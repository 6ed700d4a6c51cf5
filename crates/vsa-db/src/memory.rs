//! In-memory store for tests and local development.
//!
//! All maps sit behind one mutex so that every trait method is a single
//! atomic step, matching the transactional guarantees of [`crate::PgStore`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use vsa_models::{ApiQuota, FileId, JobState, NewUtterance, QuotaDecision, Utterance, VideoFile};

use crate::error::{DbError, DbResult};
use crate::store::{DispatchClaim, QuotaStore, VideoStore};

#[derive(Default)]
struct Inner {
    quotas: HashMap<String, ApiQuota>,
    videos: HashMap<String, VideoFile>,
    utterances: HashMap<String, Vec<Utterance>>,
}

/// Process-local store.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with quotas.
    pub fn with_quotas(quotas: impl IntoIterator<Item = ApiQuota>) -> Self {
        let quotas = quotas
            .into_iter()
            .map(|q| (q.user_id.clone(), q))
            .collect();
        Self {
            inner: Mutex::new(Inner {
                quotas,
                ..Default::default()
            }),
        }
    }

    /// Force a file into a given state, bypassing transition rules.
    pub async fn set_state(&self, id: &FileId, state: JobState) -> DbResult<()> {
        let mut inner = self.inner.lock().await;
        let file = inner
            .videos
            .get_mut(id.as_str())
            .ok_or_else(|| DbError::not_found(format!("video file {id}")))?;
        file.state = state;
        file.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl QuotaStore for MemoryStore {
    async fn find_by_secret_key(&self, secret_key: &str) -> DbResult<Option<ApiQuota>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .quotas
            .values()
            .find(|q| q.secret_key == secret_key)
            .cloned())
    }

    async fn find_quota(&self, user_id: &str) -> DbResult<Option<ApiQuota>> {
        Ok(self.inner.lock().await.quotas.get(user_id).cloned())
    }

    async fn consume(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<QuotaDecision>> {
        let mut inner = self.inner.lock().await;
        let Some(quota) = inner.quotas.get_mut(user_id) else {
            return Ok(None);
        };
        let decision = QuotaDecision::evaluate(quota, now);
        decision.consume(quota, now);
        Ok(Some(decision))
    }

    async fn upsert_quota(&self, quota: &ApiQuota) -> DbResult<()> {
        let mut inner = self.inner.lock().await;
        inner.quotas.insert(quota.user_id.clone(), quota.clone());
        Ok(())
    }
}

#[async_trait]
impl VideoStore for MemoryStore {
    async fn create_video(&self, file: &VideoFile) -> DbResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.videos.contains_key(file.id.as_str()) {
            return Err(DbError::invalid_transition(format!(
                "video file {} already exists",
                file.id
            )));
        }
        inner.videos.insert(file.id.0.clone(), file.clone());
        Ok(())
    }

    async fn get_video(&self, id: &FileId) -> DbResult<Option<VideoFile>> {
        Ok(self.inner.lock().await.videos.get(id.as_str()).cloned())
    }

    async fn begin_dispatch(&self, id: &FileId) -> DbResult<DispatchClaim> {
        let mut inner = self.inner.lock().await;
        let Some(file) = inner.videos.get_mut(id.as_str()) else {
            return Ok(DispatchClaim::NotFound);
        };
        if !file.state.can_dispatch() {
            return Ok(DispatchClaim::AlreadyProcessing);
        }
        file.state = JobState::Processing;
        file.last_error = None;
        file.updated_at = Utc::now();
        Ok(DispatchClaim::Claimed(file.clone()))
    }

    async fn complete_job(
        &self,
        id: &FileId,
        utterances: Vec<NewUtterance>,
    ) -> DbResult<JobState> {
        let mut inner = self.inner.lock().await;
        let file = inner
            .videos
            .get_mut(id.as_str())
            .ok_or_else(|| DbError::not_found(format!("video file {id}")))?;
        if file.state != JobState::Processing {
            return Err(DbError::invalid_transition(format!(
                "cannot complete {id} from {}",
                file.state
            )));
        }

        let state = JobState::after_inference(utterances.len());
        file.state = state;
        file.last_error = None;
        file.updated_at = Utc::now();

        let stored = utterances
            .into_iter()
            .enumerate()
            .map(|(i, u)| Utterance::from_new(id, i as i32, u))
            .collect();
        inner.utterances.insert(id.0.clone(), stored);
        Ok(state)
    }

    async fn fail_job(&self, id: &FileId, error: &str) -> DbResult<()> {
        let mut inner = self.inner.lock().await;
        let file = inner
            .videos
            .get_mut(id.as_str())
            .ok_or_else(|| DbError::not_found(format!("video file {id}")))?;
        if file.state == JobState::Processing {
            file.state = JobState::Pending;
            file.last_error = Some(error.to_string());
            file.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn release_dispatch(&self, id: &FileId) -> DbResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(file) = inner.videos.get_mut(id.as_str()) {
            if file.state == JobState::Processing {
                file.state = JobState::Pending;
                file.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn mark_started(&self, id: &FileId) -> DbResult<bool> {
        let mut inner = self.inner.lock().await;
        match inner.videos.get_mut(id.as_str()) {
            Some(file) if file.state == JobState::Processing => {
                file.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn recover_orphaned(
        &self,
        stale_before: DateTime<Utc>,
        reason: &str,
    ) -> DbResult<u64> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let mut reset = 0;
        for file in inner.videos.values_mut() {
            if file.state == JobState::Processing && file.updated_at < stale_before {
                file.state = JobState::Pending;
                file.last_error = Some(reason.to_string());
                file.updated_at = now;
                reset += 1;
            }
        }
        Ok(reset)
    }

    async fn list_utterances(&self, id: &FileId) -> DbResult<Vec<Utterance>> {
        Ok(self
            .inner
            .lock()
            .await
            .utterances
            .get(id.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn ping(&self) -> DbResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vsa_models::ScoreDistribution;

    fn utterance(text: &str, start: f64) -> NewUtterance {
        NewUtterance {
            start_time: start,
            end_time: start + 1.5,
            text: text.to_string(),
            emotions: ScoreDistribution::from([("joy", 0.7), ("neutral", 0.3)]),
            sentiments: ScoreDistribution::from([("positive", 0.9)]),
        }
    }

    async fn store_with_file() -> (MemoryStore, FileId) {
        let store = MemoryStore::new();
        let file = VideoFile::new(FileId::new(), "inference/a.mp4", "user-1");
        store.create_video(&file).await.unwrap();
        (store, file.id)
    }

    #[tokio::test]
    async fn test_dispatch_is_guarded() {
        let (store, id) = store_with_file().await;

        assert!(matches!(
            store.begin_dispatch(&id).await.unwrap(),
            DispatchClaim::Claimed(f) if f.state == JobState::Processing
        ));
        assert_eq!(
            store.begin_dispatch(&id).await.unwrap(),
            DispatchClaim::AlreadyProcessing
        );
        assert_eq!(
            store.begin_dispatch(&FileId::from("missing")).await.unwrap(),
            DispatchClaim::NotFound
        );
    }

    #[tokio::test]
    async fn test_complete_preserves_order_and_fields() {
        let (store, id) = store_with_file().await;
        store.begin_dispatch(&id).await.unwrap();

        let input = vec![utterance("first", 0.0), utterance("second", 2.0), utterance("third", 4.0)];
        let state = store.complete_job(&id, input.clone()).await.unwrap();
        assert_eq!(state, JobState::Completed);

        let stored = store.list_utterances(&id).await.unwrap();
        assert_eq!(stored.len(), 3);
        for (i, (got, want)) in stored.iter().zip(&input).enumerate() {
            assert_eq!(got.position, i as i32);
            assert_eq!(got.text, want.text);
            assert_eq!(got.start_time, want.start_time);
            assert_eq!(got.end_time, want.end_time);
            assert_eq!(got.emotions, want.emotions);
            assert_eq!(got.sentiments, want.sentiments);
        }
    }

    #[tokio::test]
    async fn test_empty_result_is_failed_and_redispatch_replaces() {
        let (store, id) = store_with_file().await;
        store.begin_dispatch(&id).await.unwrap();
        store
            .complete_job(&id, vec![utterance("old", 0.0)])
            .await
            .unwrap();

        store.begin_dispatch(&id).await.unwrap();
        let state = store.complete_job(&id, vec![]).await.unwrap();
        assert_eq!(state, JobState::Failed);
        assert!(store.list_utterances(&id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fail_returns_to_pending() {
        let (store, id) = store_with_file().await;
        store.begin_dispatch(&id).await.unwrap();
        store.fail_job(&id, "endpoint unavailable").await.unwrap();

        let file = store.get_video(&id).await.unwrap().unwrap();
        assert_eq!(file.state, JobState::Pending);
        assert!(!file.analyzed());
        assert_eq!(file.last_error.as_deref(), Some("endpoint unavailable"));
    }

    #[tokio::test]
    async fn test_complete_requires_processing() {
        let (store, id) = store_with_file().await;
        let err = store.complete_job(&id, vec![]).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_recover_orphaned_resets_stale_claims() {
        let (store, id) = store_with_file().await;
        store.begin_dispatch(&id).await.unwrap();

        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(store.recover_orphaned(cutoff, "restarted").await.unwrap(), 1);
        let file = store.get_video(&id).await.unwrap().unwrap();
        assert_eq!(file.state, JobState::Pending);
        assert_eq!(file.last_error.as_deref(), Some("restarted"));
        assert_eq!(store.recover_orphaned(cutoff, "restarted").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_recover_orphaned_leaves_live_claims_alone() {
        let (store, id) = store_with_file().await;
        store.begin_dispatch(&id).await.unwrap();
        assert!(store.mark_started(&id).await.unwrap());

        // Another process starting up while this job is still running.
        let cutoff = Utc::now() - chrono::Duration::minutes(20);
        assert_eq!(store.recover_orphaned(cutoff, "restarted").await.unwrap(), 0);

        let state = store.complete_job(&id, vec![utterance("still mine", 0.0)]).await.unwrap();
        assert_eq!(state, JobState::Completed);
        assert_eq!(store.list_utterances(&id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_started_requires_processing() {
        let (store, id) = store_with_file().await;
        assert!(!store.mark_started(&id).await.unwrap());
        assert!(!store.mark_started(&FileId::from("missing")).await.unwrap());

        store.begin_dispatch(&id).await.unwrap();
        assert!(store.mark_started(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_consume_missing_user() {
        let store = MemoryStore::new();
        assert!(store.consume("nobody", Utc::now()).await.unwrap().is_none());
    }
}
