//! Per-user request budget with a rolling 30-day window.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use vsa_models::{ApiQuota, QuotaDecision};

use crate::error::{DbError, DbResult};
use crate::store::QuotaStore;

/// Checks and consumes user quotas.
#[derive(Clone)]
pub struct QuotaLedger {
    store: Arc<dyn QuotaStore>,
}

impl QuotaLedger {
    pub fn new(store: Arc<dyn QuotaStore>) -> Self {
        Self { store }
    }

    /// Check (and optionally consume) one request for `user_id` at the
    /// current time. Fails with `NotFound` when the user has no quota.
    pub async fn check_and_consume(&self, user_id: &str, consume: bool) -> DbResult<bool> {
        self.check_and_consume_at(user_id, consume, Utc::now()).await
    }

    /// [`QuotaLedger::check_and_consume`] with an explicit clock.
    pub async fn check_and_consume_at(
        &self,
        user_id: &str,
        consume: bool,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let decision = if consume {
            self.store
                .consume(user_id, now)
                .await?
                .ok_or_else(|| DbError::not_found(format!("quota for user {user_id}")))?
        } else {
            let quota = self.quota(user_id).await?;
            QuotaDecision::evaluate(&quota, now)
        };

        match decision {
            QuotaDecision::WindowReset => {
                info!(user_id, consume, "Quota window expired, starting new window")
            }
            QuotaDecision::Allowed => debug!(user_id, consume, "Quota allows request"),
            QuotaDecision::Exhausted => warn!(user_id, "Quota exhausted"),
        }

        Ok(decision.is_allowed())
    }

    /// Resolve a bearer secret to its quota record.
    pub async fn authenticate(&self, secret_key: &str) -> DbResult<Option<ApiQuota>> {
        if secret_key.is_empty() {
            return Ok(None);
        }
        self.store.find_by_secret_key(secret_key).await
    }

    /// Current quota record for a user.
    pub async fn quota(&self, user_id: &str) -> DbResult<ApiQuota> {
        self.store
            .find_quota(user_id)
            .await?
            .ok_or_else(|| DbError::not_found(format!("quota for user {user_id}")))
    }
}
