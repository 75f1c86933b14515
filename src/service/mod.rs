//! Service layer
//!
//! Contains business logic separated from HTTP handlers.
//! Services orchestrate database access and relay notifications.

mod directory;
mod engagement;
mod feed;

pub use directory::{UserDirectory, UserProfile};
pub use engagement::{CommentWithAuthor, EngagementService};
pub use feed::{FeedPost, FeedService};

/// Offset/limit window for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}
