//! Feed composer
//!
//! Builds ordered post listings and enriches every post with its author,
//! derived counts and viewer flags. Enrichment is batched: one query for
//! authors, one for counts and one for flags, whatever the page size.

use std::collections::HashMap;
use std::sync::Arc;

use super::Page;
use crate::data::{Database, NewPost, Post, PostCounts, User, ViewerFlags};
use crate::error::AppError;
use crate::relay::{EventSink, NewPostEvent, RelayEvent};

/// A post ready for display
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPost {
    pub post: Post,
    pub author: User,
    pub counts: PostCounts,
    /// All false when there is no viewer
    pub flags: ViewerFlags,
}

/// Feed composer service
pub struct FeedService {
    db: Arc<Database>,
    events: Arc<dyn EventSink>,
}

impl FeedService {
    /// Create new feed service
    pub fn new(db: Arc<Database>, events: Arc<dyn EventSink>) -> Self {
        Self { db, events }
    }

    // =========================================================================
    // Listings
    // =========================================================================

    /// Every post, newest first
    pub async fn explore(
        &self,
        viewer_id: Option<&str>,
        page: Page,
    ) -> Result<Vec<FeedPost>, AppError> {
        let posts = self.db.list_posts(page.limit, page.offset).await?;
        self.enrich(posts, viewer_id).await
    }

    /// Posts authored by `user_id`, newest first
    pub async fn user_posts(
        &self,
        user_id: &str,
        viewer_id: Option<&str>,
        page: Page,
    ) -> Result<Vec<FeedPost>, AppError> {
        let posts = self
            .db
            .list_posts_by_authors(&[user_id.to_string()], page.limit, page.offset)
            .await?;
        self.enrich(posts, viewer_id).await
    }

    /// Personalized feed: posts by the viewer and everyone they follow
    pub async fn home_feed(&self, viewer_id: &str, page: Page) -> Result<Vec<FeedPost>, AppError> {
        let posts = self
            .db
            .list_feed_posts(viewer_id, page.limit, page.offset)
            .await?;
        tracing::debug!(viewer_id, posts = posts.len(), "Home feed composed");
        self.enrich(posts, Some(viewer_id)).await
    }

    /// Posts the viewer bookmarked, most recent bookmark first
    pub async fn bookmarks(&self, viewer_id: &str, page: Page) -> Result<Vec<FeedPost>, AppError> {
        let posts = self
            .db
            .list_bookmarked_posts(viewer_id, page.limit, page.offset)
            .await?;
        self.enrich(posts, Some(viewer_id)).await
    }

    /// Single post; `None` when it does not exist
    pub async fn get_post(
        &self,
        id: i64,
        viewer_id: Option<&str>,
    ) -> Result<Option<FeedPost>, AppError> {
        let Some(post) = self.db.get_post(id).await? else {
            return Ok(None);
        };
        Ok(self.enrich(vec![post], viewer_id).await?.pop())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Create a post and announce it on the relay
    ///
    /// # Errors
    /// `Validation` for empty content or a reference to a missing post
    pub async fn create_post(
        &self,
        author_id: &str,
        mut new_post: NewPost,
    ) -> Result<FeedPost, AppError> {
        let content = new_post.content.trim();
        if content.is_empty() {
            return Err(AppError::Validation("Post content is required".to_string()));
        }
        new_post.content = content.to_string();
        new_post.image_url = new_post
            .image_url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        for (field, referenced) in [
            ("parentPostId", new_post.parent_post_id),
            ("originalPostId", new_post.original_post_id),
        ] {
            if let Some(id) = referenced {
                if !self.db.post_exists(id).await? {
                    return Err(AppError::Validation(format!(
                        "{field} references a post that does not exist"
                    )));
                }
            }
        }

        let post = self.db.insert_post(author_id, &new_post).await?;
        tracing::info!(post_id = post.id, user_id = %author_id, "Post created");

        self.events.publish(RelayEvent::NewPost(NewPostEvent {
            id: post.id,
            user_id: post.user_id.clone(),
            content: post.content.clone(),
            image_url: post.image_url.clone(),
            is_repost: post.is_repost,
            original_post_id: post.original_post_id,
            created_at: post.created_at,
        }));

        self.enrich(vec![post], Some(author_id))
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("author of new post is missing")))
    }

    /// Delete a post owned by `actor_id`
    ///
    /// # Returns
    /// false if the post does not exist or belongs to someone else
    pub async fn delete_post(&self, id: i64, actor_id: &str) -> Result<bool, AppError> {
        let deleted = self.db.delete_post_owned(id, actor_id).await?;
        if deleted {
            tracing::info!(post_id = id, user_id = %actor_id, "Post deleted");
        }
        Ok(deleted)
    }

    /// Delete a post regardless of owner
    ///
    /// The caller is responsible for checking admin rights.
    pub async fn delete_post_as_admin(&self, id: i64) -> Result<bool, AppError> {
        let deleted = self.db.delete_post(id).await?;
        if deleted {
            tracing::info!(post_id = id, "Post deleted by admin");
        }
        Ok(deleted)
    }

    // =========================================================================
    // Enrichment
    // =========================================================================

    /// Attach authors, counts and viewer flags, preserving input order
    pub async fn enrich(
        &self,
        posts: Vec<Post>,
        viewer_id: Option<&str>,
    ) -> Result<Vec<FeedPost>, AppError> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }

        let post_ids: Vec<i64> = posts.iter().map(|post| post.id).collect();
        let mut author_ids: Vec<String> = posts.iter().map(|post| post.user_id.clone()).collect();
        author_ids.sort();
        author_ids.dedup();

        let authors: HashMap<String, User> = self
            .db
            .get_users_by_ids(&author_ids)
            .await?
            .into_iter()
            .map(|user| (user.id.clone(), user))
            .collect();
        let counts = self.db.engagement_counts_for_posts(&post_ids).await?;
        let flags = match viewer_id {
            Some(viewer_id) => self.db.viewer_flags_for_posts(viewer_id, &post_ids).await?,
            None => HashMap::new(),
        };

        let mut enriched = Vec::with_capacity(posts.len());
        for post in posts {
            let Some(author) = authors.get(&post.user_id) else {
                tracing::warn!(post_id = post.id, user_id = %post.user_id, "Skipping post without author");
                continue;
            };
            enriched.push(FeedPost {
                author: author.clone(),
                counts: counts.get(&post.id).copied().unwrap_or_default(),
                flags: flags.get(&post.id).copied().unwrap_or_default(),
                post,
            });
        }
        Ok(enriched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::UserIdentity;
    use crate::relay::{MockEventSink, NoopSink};
    use chrono::Utc;
    use tempfile::TempDir;

    async fn setup() -> (Arc<Database>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::connect(&temp_dir.path().join("feed.db"))
            .await
            .unwrap();
        for id in ["v", "u1", "u2", "u3"] {
            let identity = UserIdentity {
                id: id.to_string(),
                ..Default::default()
            };
            db.insert_user(&identity, Utc::now()).await.unwrap();
        }
        (Arc::new(db), temp_dir)
    }

    fn service(db: &Arc<Database>) -> FeedService {
        FeedService::new(db.clone(), Arc::new(NoopSink))
    }

    async fn post(feed: &FeedService, author: &str, content: &str) -> FeedPost {
        feed.create_post(
            author,
            NewPost {
                content: content.to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap()
    }

    fn page() -> Page {
        Page {
            limit: 20,
            offset: 0,
        }
    }

    #[tokio::test]
    async fn feed_contains_only_followed_and_own_posts() {
        let (db, _temp_dir) = setup().await;
        let feed = service(&db);
        db.insert_follow("v", "u1").await.unwrap();
        db.insert_follow("v", "u2").await.unwrap();

        let p1 = post(&feed, "u1", "one").await;
        let _p3 = post(&feed, "u3", "stranger").await;
        let pv = post(&feed, "v", "mine").await;
        let p2 = post(&feed, "u2", "two").await;

        let ids: Vec<i64> = feed
            .home_feed("v", page())
            .await
            .unwrap()
            .iter()
            .map(|item| item.post.id)
            .collect();
        assert_eq!(ids, vec![p2.post.id, pv.post.id, p1.post.id]);
    }

    #[tokio::test]
    async fn feed_without_follows_has_only_own_posts() {
        let (db, _temp_dir) = setup().await;
        let feed = service(&db);
        let _other = post(&feed, "u1", "other").await;
        let own = post(&feed, "v", "mine").await;

        let items = feed.home_feed("v", page()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].post.id, own.post.id);
    }

    #[tokio::test]
    async fn feed_is_empty_without_follows_or_posts() {
        let (db, _temp_dir) = setup().await;
        let feed = service(&db);
        let _other = post(&feed, "u1", "other").await;

        assert!(feed.home_feed("v", page()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fresh_post_round_trip() {
        let (db, _temp_dir) = setup().await;
        let feed = service(&db);
        let created = post(&feed, "u1", "hello").await;

        let fetched = feed
            .get_post(created.post.id, Some("v"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.post.content, "hello");
        assert_eq!(fetched.counts.likes, 0);
        assert!(!fetched.flags.liked);
        assert_eq!(fetched.author.id, "u1");
    }

    #[tokio::test]
    async fn likes_count_reflects_current_state() {
        let (db, _temp_dir) = setup().await;
        let feed = service(&db);
        let created = post(&feed, "u1", "hello").await;

        let before = feed.get_post(created.post.id, Some("v")).await.unwrap().unwrap();
        assert_eq!(before.counts.likes, 0);

        db.insert_like("v", created.post.id).await.unwrap();
        let after = feed.get_post(created.post.id, Some("v")).await.unwrap().unwrap();
        assert_eq!(after.counts.likes, 1);
        assert!(after.flags.liked);

        let anonymous = feed.get_post(created.post.id, None).await.unwrap().unwrap();
        assert_eq!(anonymous.counts.likes, 1);
        assert!(!anonymous.flags.liked);
    }

    #[tokio::test]
    async fn missing_post_is_none() {
        let (db, _temp_dir) = setup().await;
        assert!(service(&db).get_post(42, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn non_owner_delete_leaves_post() {
        let (db, _temp_dir) = setup().await;
        let feed = service(&db);
        let created = post(&feed, "u1", "keep me").await;

        assert!(!feed.delete_post(created.post.id, "v").await.unwrap());
        assert!(feed.get_post(created.post.id, None).await.unwrap().is_some());

        assert!(feed.delete_post_as_admin(created.post.id).await.unwrap());
        assert!(feed.get_post(created.post.id, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_content_is_rejected() {
        let (db, _temp_dir) = setup().await;
        let mut events = MockEventSink::new();
        events.expect_publish().never();
        let feed = FeedService::new(db.clone(), Arc::new(events));

        let error = feed
            .create_post(
                "u1",
                NewPost {
                    content: "   ".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::Validation(_)));
        assert!(feed.explore(None, page()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repost_of_missing_post_is_rejected() {
        let (db, _temp_dir) = setup().await;
        let feed = service(&db);

        let error = feed
            .create_post(
                "u1",
                NewPost {
                    content: "again".to_string(),
                    original_post_id: Some(999),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn create_post_publishes_new_post() {
        let (db, _temp_dir) = setup().await;
        let mut events = MockEventSink::new();
        events
            .expect_publish()
            .withf(|event| matches!(event, RelayEvent::NewPost(e) if e.content == "hi"))
            .times(1)
            .return_const(());
        let feed = FeedService::new(db.clone(), Arc::new(events));

        post(&feed, "u1", "  hi  ").await;
    }

    #[tokio::test]
    async fn reposts_are_counted_on_original() {
        let (db, _temp_dir) = setup().await;
        let feed = service(&db);
        let original = post(&feed, "u1", "original").await;
        feed.create_post(
            "u2",
            NewPost {
                content: "shared".to_string(),
                original_post_id: Some(original.post.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let fetched = feed.get_post(original.post.id, None).await.unwrap().unwrap();
        assert_eq!(fetched.counts.reposts, 1);
    }

    #[tokio::test]
    async fn bookmarks_listing_has_flags() {
        let (db, _temp_dir) = setup().await;
        let feed = service(&db);
        let created = post(&feed, "u1", "save me").await;
        db.insert_bookmark("v", created.post.id).await.unwrap();

        let items = feed.bookmarks("v", page()).await.unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].flags.bookmarked);
    }

    #[tokio::test]
    async fn user_posts_filters_by_author() {
        let (db, _temp_dir) = setup().await;
        let feed = service(&db);
        post(&feed, "u1", "a").await;
        post(&feed, "u2", "b").await;
        post(&feed, "u1", "c").await;

        let items = feed.user_posts("u1", None, page()).await.unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.author.id == "u1"));
    }
}
