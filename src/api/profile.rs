use axum::{Json, extract::State};
use std::sync::Arc;
use tower_sessions::Session;

use super::auth::session_user_id;
use super::validation::{validate_email, validate_name};
use super::{
    ApiError, ApiResponse, AppState, DeleteAccountRequest, MessageResponse, ProfileDto,
    UpdateProfileRequest,
};

/// GET /profile
/// The authenticated user's profile with their full photo history
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<ApiResponse<ProfileDto>>, ApiError> {
    let user_id = session_user_id(&session).await?;

    let profile = state.profile_service().get_profile(user_id).await?;

    Ok(Json(ApiResponse::success(profile)))
}

/// PUT /profile
/// Update name and email
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ApiResponse<ProfileDto>>, ApiError> {
    let user_id = session_user_id(&session).await?;

    let name = validate_name(&payload.name)?;
    let email = validate_email(&payload.email)?;

    let profile = state
        .profile_service()
        .update_profile(user_id, name, email)
        .await?;

    Ok(Json(ApiResponse::success(profile)))
}

/// DELETE /profile
/// Delete the account after re-confirming the password
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<DeleteAccountRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    let user_id = session_user_id(&session).await?;

    if payload.password.is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    state
        .profile_service()
        .delete_account(user_id, &payload.password)
        .await?;

    let _ = session.flush().await;

    Ok(Json(ApiResponse::success(MessageResponse {
        message: "Account deleted".to_string(),
    })))
}
