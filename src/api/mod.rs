//! API layer
//!
//! HTTP handlers for:
//! - Posts, engagement and comments
//! - User directory and follows
//! - Admin moderation
//! - WebSocket relay
//! - Metrics (Prometheus)

mod admin;
mod converters;
mod dto;
mod extract;
pub mod metrics;
mod posts;
mod users;
mod ws;

use axum::{
    Router,
    routing::{get, post, put},
};

pub use converters::*;
pub use dto::*;

pub use admin::admin_router;
pub use metrics::metrics_router;
pub use ws::relay_router;

use crate::AppState;
use crate::config::FeedConfig;
use crate::service::{EngagementService, FeedService, Page, UserDirectory};

/// Create the JSON API router
///
/// Mounted under `/api`. Handlers that need a caller use the
/// `CurrentUser` extractor; the rest accept anonymous viewers.
pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        // Identity
        .route("/auth/user", get(users::current_user))
        // Users
        .route("/users/profile", put(users::update_profile))
        .route("/users/search/:query", get(users::search_users))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id/by-username", get(users::get_user_by_username))
        .route("/users/:id/followers", get(users::get_followers))
        .route("/users/:id/following", get(users::get_following))
        .route(
            "/users/:id/follow",
            post(users::follow_user).delete(users::unfollow_user),
        )
        // Posts
        .route("/posts", post(posts::create_post).get(posts::explore))
        .route("/posts/explore", get(posts::explore))
        .route("/posts/feed", get(posts::home_feed))
        .route("/posts/user/:id", get(posts::user_posts))
        .route("/posts/:id", get(posts::get_post).delete(posts::delete_post))
        .route(
            "/posts/:id/like",
            post(posts::like_post).delete(posts::unlike_post),
        )
        .route(
            "/posts/:id/bookmark",
            post(posts::bookmark_post).delete(posts::unbookmark_post),
        )
        .route(
            "/posts/:id/comments",
            post(posts::create_comment).get(posts::get_comments),
        )
        .route("/bookmarks", get(posts::get_bookmarks))
        // Moderation
        .nest("/admin", admin_router(state))
}

pub(crate) fn build_feed_service(state: &AppState) -> FeedService {
    FeedService::new(state.db.clone(), state.relay.clone())
}

pub(crate) fn build_engagement_service(state: &AppState) -> EngagementService {
    EngagementService::new(state.db.clone(), state.relay.clone())
}

pub(crate) fn build_user_directory(state: &AppState) -> UserDirectory {
    UserDirectory::new(state.db.clone())
}

/// Resolve query parameters into a listing window
///
/// Negative offsets are treated as zero.
pub(crate) fn page_from(params: &PaginationParams, feed: &FeedConfig, default_limit: i64) -> Page {
    Page {
        limit: feed.resolve_limit(params.limit, default_limit),
        offset: params.offset.unwrap_or(0).max(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed() -> FeedConfig {
        FeedConfig {
            default_limit: 20,
            max_limit: 100,
            admin_default_limit: 50,
            search_limit: 20,
        }
    }

    #[test]
    fn page_defaults_and_clamps() {
        let params = PaginationParams::default();
        assert_eq!(
            page_from(&params, &feed(), 20),
            Page {
                limit: 20,
                offset: 0
            }
        );

        let params = PaginationParams {
            limit: Some(500),
            offset: Some(-5),
        };
        assert_eq!(
            page_from(&params, &feed(), 20),
            Page {
                limit: 100,
                offset: 0
            }
        );

        let params = PaginationParams {
            limit: Some(0),
            offset: Some(40),
        };
        assert_eq!(
            page_from(&params, &feed(), 50),
            Page {
                limit: 50,
                offset: 40
            }
        );
    }
}
