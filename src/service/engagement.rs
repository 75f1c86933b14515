//! Engagement repository
//!
//! Idempotent like/follow/bookmark toggles and comments.
//! A toggle reports `true` when it changed a row and `false` when there
//! was nothing to do; only storage failures are errors.

use std::collections::HashMap;
use std::sync::Arc;

use super::Page;
use crate::data::{Comment, Database, Relation, ToggleAction, User};
use crate::error::AppError;
use crate::metrics::record_toggle;
use crate::relay::{EventSink, NewLikeEvent, RelayEvent};

/// A comment with its author
#[derive(Debug, Clone, PartialEq)]
pub struct CommentWithAuthor {
    pub comment: Comment,
    pub author: User,
}

/// Engagement service
pub struct EngagementService {
    db: Arc<Database>,
    events: Arc<dyn EventSink>,
}

impl EngagementService {
    /// Create new engagement service
    pub fn new(db: Arc<Database>, events: Arc<dyn EventSink>) -> Self {
        Self { db, events }
    }

    /// Like or unlike a post
    ///
    /// A successful like is announced on the relay.
    pub async fn toggle_like(
        &self,
        actor_id: &str,
        post_id: i64,
        action: ToggleAction,
    ) -> Result<bool, AppError> {
        let changed = match action {
            ToggleAction::Create => self.db.insert_like(actor_id, post_id).await?,
            ToggleAction::Remove => self.db.delete_like(actor_id, post_id).await?,
        };
        self.observe(Relation::Like, action, changed, actor_id);

        if changed && action == ToggleAction::Create {
            self.events.publish(RelayEvent::NewLike(NewLikeEvent {
                post_id,
                user_id: actor_id.to_string(),
            }));
        }
        Ok(changed)
    }

    /// Follow or unfollow a user
    ///
    /// # Errors
    /// `SelfReference` if actor and target are the same user; storage is
    /// not touched in that case.
    pub async fn toggle_follow(
        &self,
        actor_id: &str,
        target_id: &str,
        action: ToggleAction,
    ) -> Result<bool, AppError> {
        if actor_id == target_id {
            return Err(AppError::SelfReference);
        }

        let changed = match action {
            ToggleAction::Create => self.db.insert_follow(actor_id, target_id).await?,
            ToggleAction::Remove => self.db.delete_follow(actor_id, target_id).await?,
        };
        self.observe(Relation::Follow, action, changed, actor_id);
        Ok(changed)
    }

    /// Bookmark or unbookmark a post
    pub async fn toggle_bookmark(
        &self,
        actor_id: &str,
        post_id: i64,
        action: ToggleAction,
    ) -> Result<bool, AppError> {
        let changed = match action {
            ToggleAction::Create => self.db.insert_bookmark(actor_id, post_id).await?,
            ToggleAction::Remove => self.db.delete_bookmark(actor_id, post_id).await?,
        };
        self.observe(Relation::Bookmark, action, changed, actor_id);
        Ok(changed)
    }

    fn observe(&self, relation: Relation, action: ToggleAction, changed: bool, actor_id: &str) {
        record_toggle(relation.as_str(), action.as_str(), changed);
        if changed {
            tracing::debug!(
                relation = relation.as_str(),
                action = action.as_str(),
                user_id = %actor_id,
                "Relationship updated"
            );
        } else {
            tracing::debug!(
                relation = relation.as_str(),
                action = action.as_str(),
                user_id = %actor_id,
                "Relationship toggle was a no-op"
            );
        }
    }

    /// Comment on a post
    ///
    /// # Returns
    /// `None` if the post does not exist
    ///
    /// # Errors
    /// `Validation` for empty content
    pub async fn create_comment(
        &self,
        actor_id: &str,
        post_id: i64,
        content: &str,
    ) -> Result<Option<CommentWithAuthor>, AppError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::Validation(
                "Comment content is required".to_string(),
            ));
        }

        let Some(comment) = self.db.insert_comment(actor_id, post_id, content).await? else {
            return Ok(None);
        };
        let author = self
            .db
            .get_user(actor_id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("comment author is missing")))?;

        tracing::info!(comment_id = comment.id, post_id, user_id = %actor_id, "Comment created");
        Ok(Some(CommentWithAuthor { comment, author }))
    }

    /// Comments on a post, newest first
    pub async fn post_comments(
        &self,
        post_id: i64,
        page: Page,
    ) -> Result<Vec<CommentWithAuthor>, AppError> {
        let comments = self
            .db
            .list_post_comments(post_id, page.limit, page.offset)
            .await?;

        let mut author_ids: Vec<String> = comments.iter().map(|c| c.user_id.clone()).collect();
        author_ids.sort();
        author_ids.dedup();
        let authors: HashMap<String, User> = self
            .db
            .get_users_by_ids(&author_ids)
            .await?
            .into_iter()
            .map(|user| (user.id.clone(), user))
            .collect();

        Ok(comments
            .into_iter()
            .filter_map(|comment| {
                let author = authors.get(&comment.user_id)?.clone();
                Some(CommentWithAuthor { comment, author })
            })
            .collect())
    }
}
