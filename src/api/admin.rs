//! Admin API endpoints
//!
//! Moderation endpoints. Every route requires an authenticated user
//! with the admin flag.

use axum::{
    Router,
    extract::State,
    middleware,
    routing::{delete, get, post},
};

use super::extract::{Json, Path, Query};
use super::{build_feed_service, build_user_directory, page_from};
use crate::AppState;
use crate::api::converters::{feed_post_to_response, profile_to_response};
use crate::api::dto::*;
use crate::auth::{AdminUser, require_auth};
use crate::error::AppError;

/// Create admin router
///
/// Routes:
/// - GET /api/admin/users - List all users
/// - GET /api/admin/posts - List all posts
/// - DELETE /api/admin/posts/:id - Delete any post
/// - POST /api/admin/users/:id/ban - Ban user
/// - POST /api/admin/users/:id/unban - Lift ban
pub fn admin_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/posts", get(list_posts))
        .route("/posts/:id", delete(delete_post))
        .route("/users/:id/ban", post(ban_user))
        .route("/users/:id/unban", post(unban_user))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

/// GET /api/admin/users
async fn list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<UserWithCountsResponse>>, AppError> {
    let page = page_from(
        &params,
        &state.config.feed,
        state.config.feed.admin_default_limit,
    );
    let users = build_user_directory(&state).all_users(page).await?;
    Ok(Json(users.iter().map(profile_to_response).collect()))
}

/// GET /api/admin/posts
async fn list_posts(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<PostResponse>>, AppError> {
    let page = page_from(
        &params,
        &state.config.feed,
        state.config.feed.admin_default_limit,
    );
    let posts = build_feed_service(&state)
        .explore(Some(&admin.id), page)
        .await?;
    Ok(Json(posts.iter().map(feed_post_to_response).collect()))
}

/// DELETE /api/admin/posts/:id
async fn delete_post(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    if !build_feed_service(&state).delete_post_as_admin(id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(post_id = id, admin_id = %admin.id, "Admin removed post");
    Ok(Json(MessageResponse::new("Post deleted successfully")))
}

/// POST /api/admin/users/:id/ban
async fn ban_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    if !build_user_directory(&state).ban_user(&admin.id, &id).await? {
        return Err(AppError::NotFound);
    }
    Ok(Json(MessageResponse::new("User banned successfully")))
}

/// POST /api/admin/users/:id/unban
async fn unban_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    if !build_user_directory(&state).unban_user(&admin.id, &id).await? {
        return Err(AppError::NotFound);
    }
    Ok(Json(MessageResponse::new("User unbanned successfully")))
}
