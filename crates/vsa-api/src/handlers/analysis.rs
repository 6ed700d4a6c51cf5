//! Analysis dispatch and status handlers.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use vsa_models::{FileId, StatusResponse};

use crate::auth::ApiKeyUser;
use crate::error::{ApiError, ApiResult};
use crate::services::DispatchAccepted;
use crate::state::AppState;

/// Request to start analysis of an uploaded file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartAnalysisRequest {
    #[serde(default)]
    pub file_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStatusQuery {
    #[serde(default)]
    pub file_id: Option<String>,
}

fn required_file_id(file_id: Option<String>) -> ApiResult<FileId> {
    file_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .map(FileId::from)
        .ok_or_else(|| ApiError::bad_request("fileId is required"))
}

/// Dispatch inference for a file. Returns as soon as the job is queued.
pub async fn start_analysis(
    State(state): State<AppState>,
    user: ApiKeyUser,
    payload: Result<Json<StartAnalysisRequest>, JsonRejection>,
) -> ApiResult<Json<DispatchAccepted>> {
    let Json(request) = payload?;
    let file_id = required_file_id(request.file_id)?;

    let accepted = state.dispatcher.start_job(&user.user_id, &file_id).await?;
    Ok(Json(accepted))
}

/// Poll the analysis status of a file.
pub async fn get_analysis_status(
    State(state): State<AppState>,
    user: ApiKeyUser,
    query: Result<Query<AnalysisStatusQuery>, QueryRejection>,
) -> ApiResult<Json<StatusResponse>> {
    let Query(query) = query?;
    let file_id = required_file_id(query.file_id)?;

    let status = state.status.get_status(&user.user_id, &file_id).await?;
    Ok(Json(status))
}
