//! Upload handlers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use crate::auth::ApiKeyUser;
use crate::error::{ApiError, ApiResult};
use crate::services::{StoredUpload, UploadHandle};
use crate::state::AppState;

/// Request for a presigned upload URL.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "fileName is required"))]
    pub file_name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "fileType is required"))]
    pub file_type: String,
}

/// Issue a presigned PUT URL for a new video.
pub async fn create_upload_url(
    State(state): State<AppState>,
    user: ApiKeyUser,
    payload: Result<Json<UploadUrlRequest>, JsonRejection>,
) -> ApiResult<Json<UploadHandle>> {
    let Json(request) = payload?;
    request
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let handle = state
        .uploads
        .issue_upload_handle(&user.user_id, &request.file_name, &request.file_type)
        .await?;
    Ok(Json(handle))
}

/// Accept the video bytes directly as multipart field `file`. The field is
/// streamed to storage part by part.
pub async fn upload_video(
    State(state): State<AppState>,
    user: ApiKeyUser,
    mut multipart: Multipart,
) -> ApiResult<Json<StoredUpload>> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("file name is required"))?;
        let mut incoming = state.uploads.begin_stream(&file_name)?;

        loop {
            let chunk = match field.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    incoming.abort().await;
                    return Err(ApiError::bad_request(e.body_text()));
                }
            };
            if let Err(e) = incoming.write(&chunk).await {
                incoming.abort().await;
                return Err(e);
            }
        }

        let stored = state
            .uploads
            .finish_stream(&user.user_id, incoming)
            .await?;
        return Ok(Json(stored));
    }

    Err(ApiError::bad_request("multipart field 'file' is required"))
}
