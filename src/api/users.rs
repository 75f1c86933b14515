//! User directory and follow endpoints

use axum::extract::State;

use super::extract::{Json, Path, Query};

use super::{build_engagement_service, build_user_directory, page_from};
use crate::AppState;
use crate::api::converters::{profile_to_response, user_to_response};
use crate::api::dto::*;
use crate::auth::{CurrentUser, MaybeUser};
use crate::data::{ProfileChanges, ToggleAction};
use crate::error::AppError;

/// GET /api/auth/user
///
/// The caller's own record, including private fields.
pub async fn current_user(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(user_to_response(&user, true))
}

/// GET /api/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<String>,
) -> Result<Json<UserWithCountsResponse>, AppError> {
    let profile = build_user_directory(&state)
        .get_by_id(&id, viewer.id())
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(profile_to_response(&profile)))
}

/// GET /api/users/:username/by-username
pub async fn get_user_by_username(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(username): Path<String>,
) -> Result<Json<UserWithCountsResponse>, AppError> {
    let profile = build_user_directory(&state)
        .get_by_username(&username, viewer.id())
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(profile_to_response(&profile)))
}

/// PUT /api/users/profile
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(changes): Json<ProfileChanges>,
) -> Result<Json<UserResponse>, AppError> {
    let updated = build_user_directory(&state)
        .update(&user.id, changes)
        .await?
        .ok_or(AppError::NotFound)?;
    tracing::info!(user_id = %updated.id, "Profile updated");
    Ok(Json(user_to_response(&updated, true)))
}

/// GET /api/users/search/:query
pub async fn search_users(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(query): Path<String>,
) -> Result<Json<Vec<UserWithCountsResponse>>, AppError> {
    let profiles = build_user_directory(&state)
        .search(&query, viewer.id(), state.config.feed.search_limit)
        .await?;
    Ok(Json(profiles.iter().map(profile_to_response).collect()))
}

/// GET /api/users/:id/followers
pub async fn get_followers(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<String>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<UserWithCountsResponse>>, AppError> {
    let page = page_from(&params, &state.config.feed, state.config.feed.default_limit);
    let profiles = build_user_directory(&state)
        .followers(&id, viewer.id(), page)
        .await?;
    Ok(Json(profiles.iter().map(profile_to_response).collect()))
}

/// GET /api/users/:id/following
pub async fn get_following(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<String>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<UserWithCountsResponse>>, AppError> {
    let page = page_from(&params, &state.config.feed, state.config.feed.default_limit);
    let profiles = build_user_directory(&state)
        .following(&id, viewer.id(), page)
        .await?;
    Ok(Json(profiles.iter().map(profile_to_response).collect()))
}

/// POST /api/users/:id/follow
pub async fn follow_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let changed = build_engagement_service(&state)
        .toggle_follow(&user.id, &id, ToggleAction::Create)
        .await?;
    if !changed {
        return Err(AppError::Validation(
            "Already following or user not found".to_string(),
        ));
    }
    Ok(Json(MessageResponse::new("User followed successfully")))
}

/// DELETE /api/users/:id/follow
pub async fn unfollow_user(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let changed = build_engagement_service(&state)
        .toggle_follow(&user.id, &id, ToggleAction::Remove)
        .await?;
    if !changed {
        return Err(AppError::NotFound);
    }
    Ok(Json(MessageResponse::new("User unfollowed successfully")))
}
