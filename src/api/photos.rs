use axum::{
    Json,
    extract::{Multipart, Path, State},
};
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::session_user_id;
use super::validation::validate_photo_id;
use super::{
    ApiError, ApiResponse, AppState, MessageResponse, PhotoDto, SetCurrentPhotoRequest,
};
use crate::services::{AddToHistoryOutcome, RemoveOutcome};

/// POST /profile/photo
/// Upload a new profile photo (multipart field "photo"); the previous
/// current photo moves into history
pub async fn upload_photo(
    State(state): State<Arc<AppState>>,
    session: Session,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<PhotoDto>>, ApiError> {
    let user_id = session_user_id(&session).await?;

    let mut photo: Option<(Vec<u8>, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() == Some("photo") {
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::validation(format!("Failed to read photo field: {e}")))?;
            photo = Some((bytes.to_vec(), content_type));
            break;
        }
    }

    let (bytes, content_type) =
        photo.ok_or_else(|| ApiError::validation("Missing 'photo' field in upload"))?;

    let dto = state
        .photo_service()
        .upload(user_id, &bytes, &content_type)
        .await?;

    Ok(Json(ApiResponse::success(dto)))
}

/// DELETE /profile/photo
/// Unset the current photo; the record stays in history
pub async fn remove_photo(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let user_id = session_user_id(&session).await?;

    let message = match state.photo_service().remove(user_id).await? {
        RemoveOutcome::Removed => "Profile photo removed",
        RemoveOutcome::NoPhoto => "No profile photo to remove",
    };

    Ok(Json(ApiResponse::success(MessageResponse {
        message: message.to_string(),
    })))
}

/// GET /profile/photo/history
/// Full photo history, newest first
pub async fn photo_history(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<ApiResponse<Vec<PhotoDto>>>, ApiError> {
    let user_id = session_user_id(&session).await?;

    let history = state.photo_service().history(user_id).await?;

    Ok(Json(ApiResponse::success(history)))
}

/// POST /profile/photo/set-current
/// Restore a history photo as the current avatar
pub async fn set_current_photo(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<SetCurrentPhotoRequest>,
) -> Result<Json<ApiResponse<PhotoDto>>, ApiError> {
    let user_id = session_user_id(&session).await?;
    let photo_id = validate_photo_id(payload.photo_id)?;

    let dto = state
        .photo_service()
        .set_as_current(user_id, photo_id)
        .await?;

    Ok(Json(ApiResponse::success(dto)))
}

/// POST /profile/photo/add-to-history
/// Pin the current photo into history as a distinct closed entry
pub async fn add_photo_to_history(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let user_id = session_user_id(&session).await?;

    let message = match state.photo_service().add_to_history(user_id).await? {
        AddToHistoryOutcome::Added => "Photo added to history",
        AddToHistoryOutcome::NoPhoto => "No profile photo to add",
        AddToHistoryOutcome::AlreadyPresent => "Photo is already in history",
    };

    Ok(Json(ApiResponse::success(MessageResponse {
        message: message.to_string(),
    })))
}

/// DELETE /profile/photo/{id}
/// Permanently delete a non-current photo from history
pub async fn delete_photo(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let user_id = session_user_id(&session).await?;
    let photo_id = validate_photo_id(id)?;

    state.photo_service().delete_photo(user_id, photo_id).await?;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Photo deleted".to_string(),
    })))
}
