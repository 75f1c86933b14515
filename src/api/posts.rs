//! Post, engagement and bookmark endpoints

use axum::extract::State;

use super::extract::{Json, Path, Query};

use super::{build_engagement_service, build_feed_service, page_from};
use crate::AppState;
use crate::api::converters::{comment_to_response, feed_post_to_response};
use crate::api::dto::*;
use crate::auth::{CurrentUser, MaybeUser};
use crate::data::{NewPost, ToggleAction};
use crate::error::AppError;

/// POST /api/posts
pub async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreatePostRequest>,
) -> Result<Json<PostResponse>, AppError> {
    let post = build_feed_service(&state)
        .create_post(
            &user.id,
            NewPost {
                content: request.content,
                image_url: request.image_url,
                parent_post_id: request.parent_post_id,
                original_post_id: request.original_post_id,
            },
        )
        .await?;
    Ok(Json(feed_post_to_response(&post)))
}

/// GET /api/posts and GET /api/posts/explore
pub async fn explore(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<PostResponse>>, AppError> {
    let page = page_from(&params, &state.config.feed, state.config.feed.default_limit);
    let posts = build_feed_service(&state).explore(viewer.id(), page).await?;
    Ok(Json(posts.iter().map(feed_post_to_response).collect()))
}

/// GET /api/posts/feed
pub async fn home_feed(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<PostResponse>>, AppError> {
    let page = page_from(&params, &state.config.feed, state.config.feed.default_limit);
    let posts = build_feed_service(&state).home_feed(&user.id, page).await?;
    Ok(Json(posts.iter().map(feed_post_to_response).collect()))
}

/// GET /api/posts/user/:id
pub async fn user_posts(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(user_id): Path<String>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<PostResponse>>, AppError> {
    let page = page_from(&params, &state.config.feed, state.config.feed.default_limit);
    let posts = build_feed_service(&state)
        .user_posts(&user_id, viewer.id(), page)
        .await?;
    Ok(Json(posts.iter().map(feed_post_to_response).collect()))
}

/// GET /api/posts/:id
pub async fn get_post(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
) -> Result<Json<PostResponse>, AppError> {
    let post = build_feed_service(&state)
        .get_post(id, viewer.id())
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(feed_post_to_response(&post)))
}

/// DELETE /api/posts/:id
///
/// Someone else's post is reported as not found.
pub async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    if !build_feed_service(&state).delete_post(id, &user.id).await? {
        return Err(AppError::NotFound);
    }
    Ok(Json(MessageResponse::new("Post deleted successfully")))
}

// =============================================================================
// Likes
// =============================================================================

/// POST /api/posts/:id/like
pub async fn like_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    let changed = build_engagement_service(&state)
        .toggle_like(&user.id, id, ToggleAction::Create)
        .await?;
    if !changed {
        return Err(AppError::Validation(
            "Post already liked or not found".to_string(),
        ));
    }
    Ok(Json(MessageResponse::new("Post liked successfully")))
}

/// DELETE /api/posts/:id/like
pub async fn unlike_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    let changed = build_engagement_service(&state)
        .toggle_like(&user.id, id, ToggleAction::Remove)
        .await?;
    if !changed {
        return Err(AppError::NotFound);
    }
    Ok(Json(MessageResponse::new("Post unliked successfully")))
}

// =============================================================================
// Bookmarks
// =============================================================================

/// POST /api/posts/:id/bookmark
pub async fn bookmark_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    let changed = build_engagement_service(&state)
        .toggle_bookmark(&user.id, id, ToggleAction::Create)
        .await?;
    if !changed {
        return Err(AppError::Validation(
            "Post already bookmarked or not found".to_string(),
        ));
    }
    Ok(Json(MessageResponse::new("Post bookmarked successfully")))
}

/// DELETE /api/posts/:id/bookmark
pub async fn unbookmark_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    let changed = build_engagement_service(&state)
        .toggle_bookmark(&user.id, id, ToggleAction::Remove)
        .await?;
    if !changed {
        return Err(AppError::NotFound);
    }
    Ok(Json(MessageResponse::new("Bookmark removed successfully")))
}

/// GET /api/bookmarks
pub async fn get_bookmarks(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<PostResponse>>, AppError> {
    let page = page_from(&params, &state.config.feed, state.config.feed.default_limit);
    let posts = build_feed_service(&state).bookmarks(&user.id, page).await?;
    Ok(Json(posts.iter().map(feed_post_to_response).collect()))
}

// =============================================================================
// Comments
// =============================================================================

/// POST /api/posts/:id/comments
pub async fn create_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<CreateCommentRequest>,
) -> Result<Json<CommentResponse>, AppError> {
    let comment = build_engagement_service(&state)
        .create_comment(&user.id, id, &request.content)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(comment_to_response(&comment)))
}

/// GET /api/posts/:id/comments
pub async fn get_comments(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Vec<CommentResponse>>, AppError> {
    let page = page_from(&params, &state.config.feed, state.config.feed.default_limit);
    let comments = build_engagement_service(&state)
        .post_comments(id, page)
        .await?;
    Ok(Json(comments.iter().map(comment_to_response).collect()))
}
