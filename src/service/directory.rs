//! User directory
//!
//! Lookup, search, profile edits and moderation flags for users,
//! enriched with follower/following/post counts.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;

use super::Page;
use crate::data::{Database, ProfileChanges, User, UserCounts, UserIdentity};
use crate::error::AppError;

const MAX_USERNAME_LEN: usize = 50;

/// A user with derived counts
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub user: User,
    pub counts: UserCounts,
    /// False when there is no viewer or the viewer is the user
    pub is_following: bool,
}

/// User directory service
pub struct UserDirectory {
    db: Arc<Database>,
}

impl UserDirectory {
    /// Create new user directory
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Create or refresh the user row for a verified identity
    pub async fn sync_identity(&self, identity: &UserIdentity) -> Result<User, AppError> {
        let now = Utc::now();

        match self.db.get_user(&identity.id).await? {
            None => {
                if self.db.insert_user(identity, now).await? {
                    tracing::info!(user_id = %identity.id, "User created from identity");
                }
            }
            Some(existing) => {
                let changed = existing.email != identity.email
                    || existing.first_name != identity.first_name
                    || existing.last_name != identity.last_name
                    || existing.profile_image_url != identity.profile_image_url
                    || (identity.is_admin && !existing.is_admin);
                if !changed {
                    return Ok(existing);
                }
                self.db.refresh_user_identity(identity, now).await?;
                tracing::debug!(user_id = %identity.id, "User identity refreshed");
            }
        }

        self.db
            .get_user(&identity.id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("user vanished during sync")))
    }

    /// Exact lookup by id
    pub async fn get_by_id(
        &self,
        id: &str,
        viewer_id: Option<&str>,
    ) -> Result<Option<UserProfile>, AppError> {
        let Some(user) = self.db.get_user(id).await? else {
            return Ok(None);
        };
        Ok(self.enrich(vec![user], viewer_id).await?.pop())
    }

    /// Exact lookup by username
    pub async fn get_by_username(
        &self,
        username: &str,
        viewer_id: Option<&str>,
    ) -> Result<Option<UserProfile>, AppError> {
        let Some(user) = self.db.get_user_by_username(username).await? else {
            return Ok(None);
        };
        Ok(self.enrich(vec![user], viewer_id).await?.pop())
    }

    /// Case-insensitive substring search, capped at `limit`
    pub async fn search(
        &self,
        query: &str,
        viewer_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<UserProfile>, AppError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let users = self.db.search_users(query, limit).await?;
        self.enrich(users, viewer_id).await
    }

    /// Merge profile fields into the user row
    ///
    /// # Returns
    /// The updated user, or `None` if it does not exist
    ///
    /// # Errors
    /// `Validation` for a malformed username, `Conflict` if it is taken
    pub async fn update(
        &self,
        id: &str,
        mut changes: ProfileChanges,
    ) -> Result<Option<User>, AppError> {
        if let Some(username) = changes.username.take() {
            let username = username.trim().to_string();
            validate_username(&username)?;
            changes.username = Some(username);
        }

        if !changes.is_empty() && !self.db.update_user_profile(id, &changes, Utc::now()).await? {
            return Ok(None);
        }
        self.db.get_user(id).await
    }

    /// Users following `user_id`
    pub async fn followers(
        &self,
        user_id: &str,
        viewer_id: Option<&str>,
        page: Page,
    ) -> Result<Vec<UserProfile>, AppError> {
        let users = self
            .db
            .list_followers(user_id, page.limit, page.offset)
            .await?;
        self.enrich(users, viewer_id).await
    }

    /// Users `user_id` follows
    pub async fn following(
        &self,
        user_id: &str,
        viewer_id: Option<&str>,
        page: Page,
    ) -> Result<Vec<UserProfile>, AppError> {
        let users = self
            .db
            .list_following(user_id, page.limit, page.offset)
            .await?;
        self.enrich(users, viewer_id).await
    }

    /// Every user, newest first
    pub async fn all_users(&self, page: Page) -> Result<Vec<UserProfile>, AppError> {
        let users = self.db.list_users(page.limit, page.offset).await?;
        self.enrich(users, None).await
    }

    /// Flag a user as banned
    ///
    /// # Returns
    /// false if the user does not exist
    ///
    /// # Errors
    /// `Validation` when an admin tries to ban themselves
    pub async fn ban_user(&self, admin_id: &str, target_id: &str) -> Result<bool, AppError> {
        if admin_id == target_id {
            return Err(AppError::Validation("Cannot ban yourself".to_string()));
        }
        let banned = self.db.set_user_banned(target_id, true, Utc::now()).await?;
        if banned {
            tracing::warn!(user_id = %target_id, admin_id = %admin_id, "User banned");
        }
        Ok(banned)
    }

    /// Clear the banned flag
    pub async fn unban_user(&self, admin_id: &str, target_id: &str) -> Result<bool, AppError> {
        let unbanned = self.db.set_user_banned(target_id, false, Utc::now()).await?;
        if unbanned {
            tracing::info!(user_id = %target_id, admin_id = %admin_id, "User unbanned");
        }
        Ok(unbanned)
    }

    /// Attach counts and the viewer's follow flag, preserving order
    async fn enrich(
        &self,
        users: Vec<User>,
        viewer_id: Option<&str>,
    ) -> Result<Vec<UserProfile>, AppError> {
        if users.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = users.iter().map(|user| user.id.clone()).collect();
        let counts = self.db.user_counts_for(&ids).await?;
        let followed = match viewer_id {
            Some(viewer_id) => self.db.followed_among(viewer_id, &ids).await?,
            None => HashSet::new(),
        };

        Ok(users
            .into_iter()
            .map(|user| UserProfile {
                counts: counts.get(&user.id).copied().unwrap_or_default(),
                is_following: viewer_id != Some(user.id.as_str()) && followed.contains(&user.id),
                user,
            })
            .collect())
    }
}

fn validate_username(username: &str) -> Result<(), AppError> {
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::Validation(format!(
            "Username must be between 1 and {MAX_USERNAME_LEN} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(AppError::Validation(
            "Username may only contain letters, digits and underscores".to_string(),
        ));
    }
    Ok(())
}
