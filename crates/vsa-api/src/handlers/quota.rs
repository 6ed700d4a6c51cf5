//! Quota handler.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::ApiKeyUser;
use crate::error::ApiResult;
use crate::state::AppState;

/// The caller's request budget.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaResponse {
    pub max_requests: i32,
    pub request_used: i32,
    pub remaining: i32,
    pub window_resets_at: DateTime<Utc>,
}

pub async fn get_quota(
    State(state): State<AppState>,
    user: ApiKeyUser,
) -> ApiResult<Json<QuotaResponse>> {
    let quota = state.ledger.quota(&user.user_id).await?;
    let now = Utc::now();

    Ok(Json(QuotaResponse {
        max_requests: quota.max_requests,
        request_used: if quota.window_expired(now) { 0 } else { quota.request_used },
        remaining: quota.remaining(now),
        window_resets_at: quota.window_resets_at(),
    }))
}
