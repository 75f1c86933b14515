//! Conversion functions from service types to API DTOs

use crate::api::dto::*;
use crate::data::User;
use crate::service::{CommentWithAuthor, FeedPost, UserProfile};

/// Convert User to UserResponse
///
/// `include_private` controls whether the email is exposed.
pub fn user_to_response(user: &User, include_private: bool) -> UserResponse {
    UserResponse {
        id: user.id.clone(),
        email: if include_private {
            user.email.clone()
        } else {
            None
        },
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        profile_image_url: user.profile_image_url.clone(),
        username: user.username.clone(),
        bio: user.bio.clone(),
        location: user.location.clone(),
        website: user.website.clone(),
        is_admin: user.is_admin,
        is_banned: user.is_banned,
        created_at: user.created_at,
        updated_at: user.updated_at,
    }
}

/// Convert UserProfile to UserWithCountsResponse
pub fn profile_to_response(profile: &UserProfile) -> UserWithCountsResponse {
    UserWithCountsResponse {
        user: user_to_response(&profile.user, false),
        followers_count: profile.counts.followers,
        following_count: profile.counts.following,
        posts_count: profile.counts.posts,
        is_following: profile.is_following,
    }
}

/// Convert FeedPost to PostResponse
pub fn feed_post_to_response(item: &FeedPost) -> PostResponse {
    let post = &item.post;
    PostResponse {
        id: post.id,
        user_id: post.user_id.clone(),
        content: post.content.clone(),
        image_url: post.image_url.clone(),
        parent_post_id: post.parent_post_id,
        is_repost: post.is_repost,
        original_post_id: post.original_post_id,
        created_at: post.created_at,
        updated_at: post.updated_at,
        user: user_to_response(&item.author, false),
        likes_count: item.counts.likes,
        comments_count: item.counts.comments,
        reposts_count: item.counts.reposts,
        is_liked: item.flags.liked,
        is_bookmarked: item.flags.bookmarked,
    }
}

/// Convert CommentWithAuthor to CommentResponse
pub fn comment_to_response(item: &CommentWithAuthor) -> CommentResponse {
    let comment = &item.comment;
    CommentResponse {
        id: comment.id,
        user_id: comment.user_id.clone(),
        post_id: comment.post_id,
        content: comment.content.clone(),
        created_at: comment.created_at,
        updated_at: comment.updated_at,
        user: user_to_response(&item.author, false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Post, PostCounts, ViewerFlags};
    use chrono::Utc;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: "u1".to_string(),
            email: Some("u1@example.com".to_string()),
            first_name: Some("Ada".to_string()),
            last_name: None,
            profile_image_url: None,
            username: Some("ada".to_string()),
            bio: None,
            location: None,
            website: None,
            is_admin: false,
            is_banned: false,
            banned_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn email_is_private_by_default() {
        let public = serde_json::to_value(user_to_response(&user(), false)).unwrap();
        assert!(public.get("email").is_none());
        assert_eq!(public["firstName"], "Ada");

        let own = serde_json::to_value(user_to_response(&user(), true)).unwrap();
        assert_eq!(own["email"], "u1@example.com");
    }

    #[test]
    fn post_response_uses_camel_case_counts() {
        let now = Utc::now();
        let item = FeedPost {
            post: Post {
                id: 3,
                user_id: "u1".to_string(),
                content: "hello".to_string(),
                image_url: None,
                parent_post_id: None,
                is_repost: false,
                original_post_id: None,
                created_at: now,
                updated_at: now,
            },
            author: user(),
            counts: PostCounts {
                likes: 2,
                comments: 1,
                reposts: 0,
            },
            flags: ViewerFlags {
                liked: true,
                bookmarked: false,
            },
        };

        let json = serde_json::to_value(feed_post_to_response(&item)).unwrap();
        assert_eq!(json["likesCount"], 2);
        assert_eq!(json["commentsCount"], 1);
        assert_eq!(json["isLiked"], true);
        assert_eq!(json["isBookmarked"], false);
        assert_eq!(json["user"]["username"], "ada");
    }
}
