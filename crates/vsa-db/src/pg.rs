//! Postgres-backed store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::debug;
use vsa_models::{
    ApiQuota, FileId, JobState, NewUtterance, QuotaDecision, ScoreDistribution, Utterance,
    VideoFile,
};

use crate::error::{DbError, DbResult};
use crate::store::{DispatchClaim, QuotaStore, VideoStore};

const QUOTA_COLUMNS: &str = "user_id, secret_key, max_requests, request_used, last_reset_date";

const VIDEO_COLUMNS: &str = "id, object_key, user_id, state, last_error, created_at, updated_at";

const UTTERANCE_COLUMNS: &str =
    "file_id, position, start_time, end_time, text, emotions, sentiments";

#[derive(sqlx::FromRow)]
struct QuotaRow {
    user_id: String,
    secret_key: String,
    max_requests: i32,
    request_used: i32,
    last_reset_date: DateTime<Utc>,
}

impl From<QuotaRow> for ApiQuota {
    fn from(row: QuotaRow) -> Self {
        Self {
            user_id: row.user_id,
            secret_key: row.secret_key,
            max_requests: row.max_requests,
            request_used: row.request_used,
            last_reset_date: row.last_reset_date,
        }
    }
}

#[derive(sqlx::FromRow)]
struct VideoRow {
    id: String,
    object_key: String,
    user_id: String,
    state: String,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<VideoRow> for VideoFile {
    type Error = DbError;

    fn try_from(row: VideoRow) -> Result<Self, Self::Error> {
        let state = row
            .state
            .parse::<JobState>()
            .map_err(|e| DbError::CorruptRow(format!("video_files.{}: {e}", row.id)))?;
        Ok(Self {
            id: FileId(row.id),
            key: row.object_key,
            user_id: row.user_id,
            state,
            last_error: row.last_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct UtteranceRow {
    file_id: String,
    position: i32,
    start_time: f64,
    end_time: f64,
    text: String,
    emotions: Json<ScoreDistribution>,
    sentiments: Json<ScoreDistribution>,
}

impl From<UtteranceRow> for Utterance {
    fn from(row: UtteranceRow) -> Self {
        Self {
            file_id: FileId(row.file_id),
            position: row.position,
            start_time: row.start_time,
            end_time: row.end_time,
            text: row.text,
            emotions: row.emotions.0,
            sentiments: row.sentiments.0,
        }
    }
}

/// Store backed by a Postgres pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Move a `Processing` file back to `Pending`.
    async fn reset_to_pending(&self, id: &FileId, error: Option<&str>) -> DbResult<()> {
        sqlx::query(
            "UPDATE video_files SET state = $2, last_error = COALESCE($3, last_error), \
             updated_at = NOW() WHERE id = $1 AND state = $4",
        )
        .bind(id.as_str())
        .bind(JobState::Pending.as_str())
        .bind(error)
        .bind(JobState::Processing.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl QuotaStore for PgStore {
    async fn find_by_secret_key(&self, secret_key: &str) -> DbResult<Option<ApiQuota>> {
        let query = format!("SELECT {QUOTA_COLUMNS} FROM api_quotas WHERE secret_key = $1");
        let row = sqlx::query_as::<_, QuotaRow>(&query)
            .bind(secret_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ApiQuota::from))
    }

    async fn find_quota(&self, user_id: &str) -> DbResult<Option<ApiQuota>> {
        let query = format!("SELECT {QUOTA_COLUMNS} FROM api_quotas WHERE user_id = $1");
        let row = sqlx::query_as::<_, QuotaRow>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ApiQuota::from))
    }

    async fn consume(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Option<QuotaDecision>> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent consumers of the same quota.
        let query =
            format!("SELECT {QUOTA_COLUMNS} FROM api_quotas WHERE user_id = $1 FOR UPDATE");
        let Some(row) = sqlx::query_as::<_, QuotaRow>(&query)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };

        let mut quota = ApiQuota::from(row);
        let decision = QuotaDecision::evaluate(&quota, now);
        if decision.consume(&mut quota, now) {
            sqlx::query(
                "UPDATE api_quotas SET request_used = $2, last_reset_date = $3 WHERE user_id = $1",
            )
            .bind(user_id)
            .bind(quota.request_used)
            .bind(quota.last_reset_date)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(user_id, ?decision, request_used = quota.request_used, "Quota consumed");
        Ok(Some(decision))
    }

    async fn upsert_quota(&self, quota: &ApiQuota) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO api_quotas (user_id, secret_key, max_requests, request_used, last_reset_date) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id) DO UPDATE SET \
                 secret_key = EXCLUDED.secret_key, \
                 max_requests = EXCLUDED.max_requests, \
                 request_used = EXCLUDED.request_used, \
                 last_reset_date = EXCLUDED.last_reset_date",
        )
        .bind(&quota.user_id)
        .bind(&quota.secret_key)
        .bind(quota.max_requests)
        .bind(quota.request_used)
        .bind(quota.last_reset_date)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl VideoStore for PgStore {
    async fn create_video(&self, file: &VideoFile) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO video_files (id, object_key, user_id, state, last_error, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(file.id.as_str())
        .bind(&file.key)
        .bind(&file.user_id)
        .bind(file.state.as_str())
        .bind(&file.last_error)
        .bind(file.created_at)
        .bind(file.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_video(&self, id: &FileId) -> DbResult<Option<VideoFile>> {
        let query = format!("SELECT {VIDEO_COLUMNS} FROM video_files WHERE id = $1");
        sqlx::query_as::<_, VideoRow>(&query)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?
            .map(VideoFile::try_from)
            .transpose()
    }

    async fn begin_dispatch(&self, id: &FileId) -> DbResult<DispatchClaim> {
        let query = format!(
            "UPDATE video_files SET state = $2, last_error = NULL, updated_at = NOW() \
             WHERE id = $1 AND state <> $2 \
             RETURNING {VIDEO_COLUMNS}"
        );
        let claimed = sqlx::query_as::<_, VideoRow>(&query)
            .bind(id.as_str())
            .bind(JobState::Processing.as_str())
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = claimed {
            return Ok(DispatchClaim::Claimed(VideoFile::try_from(row)?));
        }

        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM video_files WHERE id = $1)")
                .bind(id.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(if exists {
            DispatchClaim::AlreadyProcessing
        } else {
            DispatchClaim::NotFound
        })
    }

    async fn complete_job(
        &self,
        id: &FileId,
        utterances: Vec<NewUtterance>,
    ) -> DbResult<JobState> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(String,)> =
            sqlx::query_as("SELECT state FROM video_files WHERE id = $1 FOR UPDATE")
                .bind(id.as_str())
                .fetch_optional(&mut *tx)
                .await?;
        match current {
            None => return Err(DbError::not_found(format!("video file {id}"))),
            Some((state,)) if state != JobState::Processing.as_str() => {
                return Err(DbError::invalid_transition(format!(
                    "cannot complete {id} from {state}"
                )));
            }
            Some(_) => {}
        }

        sqlx::query("DELETE FROM utterances WHERE file_id = $1")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await?;

        let state = JobState::after_inference(utterances.len());
        for (position, u) in utterances.iter().enumerate() {
            sqlx::query(
                "INSERT INTO utterances (file_id, position, start_time, end_time, text, emotions, sentiments) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(id.as_str())
            .bind(position as i32)
            .bind(u.start_time)
            .bind(u.end_time)
            .bind(&u.text)
            .bind(Json(&u.emotions))
            .bind(Json(&u.sentiments))
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            "UPDATE video_files SET state = $2, last_error = NULL, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(state.as_str())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(file_id = %id, utterances = utterances.len(), %state, "Job completed");
        Ok(state)
    }

    async fn fail_job(&self, id: &FileId, error: &str) -> DbResult<()> {
        self.reset_to_pending(id, Some(error)).await
    }

    async fn release_dispatch(&self, id: &FileId) -> DbResult<()> {
        self.reset_to_pending(id, None).await
    }

    async fn mark_started(&self, id: &FileId) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE video_files SET updated_at = NOW() WHERE id = $1 AND state = $2",
        )
        .bind(id.as_str())
        .bind(JobState::Processing.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn recover_orphaned(
        &self,
        stale_before: DateTime<Utc>,
        reason: &str,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE video_files SET state = $1, last_error = $2, updated_at = NOW() \
             WHERE state = $3 AND updated_at < $4",
        )
        .bind(JobState::Pending.as_str())
        .bind(reason)
        .bind(JobState::Processing.as_str())
        .bind(stale_before)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn list_utterances(&self, id: &FileId) -> DbResult<Vec<Utterance>> {
        let query = format!(
            "SELECT {UTTERANCE_COLUMNS} FROM utterances WHERE file_id = $1 ORDER BY position"
        );
        let rows = sqlx::query_as::<_, UtteranceRow>(&query)
            .bind(id.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Utterance::from).collect())
    }

    async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
