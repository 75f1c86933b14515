//! Data models
//!
//! Rust structs representing database rows and the small value types
//! the repositories hand back. Posts and relationship rows use integer
//! surrogate keys; users are keyed by the identity provider's string id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// User
// =============================================================================

/// A registered user, created on first identity sync
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// External identity provider id
    pub id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image_url: Option<String>,
    pub username: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub is_admin: bool,
    /// Banned users are refused at authentication
    pub is_banned: bool,
    pub banned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity claims used to create or refresh a user row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserIdentity {
    pub id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_image_url: Option<String>,
    pub is_admin: bool,
}

/// Partial profile update; `None` leaves the column untouched
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub profile_image_url: Option<String>,
}

impl ProfileChanges {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.username.is_none()
            && self.bio.is_none()
            && self.location.is_none()
            && self.website.is_none()
            && self.profile_image_url.is_none()
    }
}

/// Derived per-user counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserCounts {
    pub followers: i64,
    pub following: i64,
    pub posts: i64,
}

// =============================================================================
// Post
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub user_id: String,
    pub content: String,
    pub image_url: Option<String>,
    /// Reply target; stored but not used by any listing
    pub parent_post_id: Option<i64>,
    pub is_repost: bool,
    pub original_post_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values for a post insert
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewPost {
    pub content: String,
    pub image_url: Option<String>,
    pub parent_post_id: Option<i64>,
    pub original_post_id: Option<i64>,
}

/// Derived per-post counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostCounts {
    pub likes: i64,
    pub comments: i64,
    pub reposts: i64,
}

/// Viewer-relative flags for a post
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewerFlags {
    pub liked: bool,
    pub bookmarked: bool,
}

// =============================================================================
// Comment
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub user_id: String,
    pub post_id: i64,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Relationships
// =============================================================================

/// Relationship kinds managed by idempotent toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Like,
    Follow,
    Bookmark,
}

impl Relation {
    pub fn as_str(self) -> &'static str {
        match self {
            Relation::Like => "like",
            Relation::Follow => "follow",
            Relation::Bookmark => "bookmark",
        }
    }
}

/// Direction of a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToggleAction {
    Create,
    Remove,
}

impl ToggleAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ToggleAction::Create => "create",
            ToggleAction::Remove => "remove",
        }
    }
}
