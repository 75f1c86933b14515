//! API request and response DTOs
//!
//! JSON field names are camelCase to match the web client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Requests
// =============================================================================

/// Offset/limit query parameters shared by all listings
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// POST /api/posts
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub content: String,
    pub image_url: Option<String>,
    pub parent_post_id: Option<i64>,
    pub original_post_id: Option<i64>,
}

/// POST /api/posts/:id/comments
#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
}

// =============================================================================
// Responses
// =============================================================================

/// User response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    /// Only present on the caller's own record
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image_url: Option<String>,
    pub username: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub is_admin: bool,
    pub is_banned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User with derived counts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserWithCountsResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub followers_count: i64,
    pub following_count: i64,
    pub posts_count: i64,
    pub is_following: bool,
}

/// Post with author, counts and viewer flags
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: i64,
    pub user_id: String,
    pub content: String,
    pub image_url: Option<String>,
    pub parent_post_id: Option<i64>,
    pub is_repost: bool,
    pub original_post_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user: UserResponse,
    pub likes_count: i64,
    pub comments_count: i64,
    pub reposts_count: i64,
    pub is_liked: bool,
    pub is_bookmarked: bool,
}

/// Comment with author
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: i64,
    pub user_id: String,
    pub post_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub user: UserResponse,
}

/// Acknowledgement for mutations without a resource body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
