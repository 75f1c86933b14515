//! SQLite database operations
//!
//! All database access goes through this module.
//! Relationship inserts rely on the table's UNIQUE constraints: a
//! duplicate or dangling insert reports `false` instead of an error.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteQueryResult;
use sqlx::{Pool, QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Instant;

use super::models::*;
use crate::error::AppError;

/// Database connection pool wrapper
pub struct Database {
    pool: Pool<Sqlite>,
}

/// Translate the result of a relationship insert.
///
/// Unique violations mean the row already exists; foreign key and check
/// violations mean the target is gone or invalid. Both are expected
/// no-ops. Anything else is a real storage failure.
fn insert_outcome(result: Result<SqliteQueryResult, sqlx::Error>) -> Result<bool, AppError> {
    match result {
        Ok(done) => Ok(done.rows_affected() > 0),
        Err(sqlx::Error::Database(db_error))
            if db_error.is_unique_violation()
                || db_error.is_foreign_key_violation()
                || db_error.is_check_violation() =>
        {
            tracing::debug!(error = %db_error, "Relationship insert was a no-op");
            Ok(false)
        }
        Err(error) => Err(AppError::Database(error)),
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|db_error| db_error.is_unique_violation())
}

/// Escape `%`, `_` and `\` for a LIKE pattern using `ESCAPE '\'`.
pub(crate) fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Lowercased username and name parts, one per line.
///
/// Folded with `str::to_lowercase` so matching ignores case beyond ASCII.
pub(crate) fn search_key(user: &User) -> String {
    [&user.username, &user.first_name, &user.last_name]
        .into_iter()
        .flatten()
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("\n")
}

impl Database {
    /// Connect to SQLite database and run migrations
    ///
    /// Creates the parent directory and database file if missing.
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        // Create connection string
        let connection_string = format!("sqlite:{}?mode=rwc", path.display());

        // Create connection pool
        let pool = SqlitePool::connect(&connection_string).await?;

        // Run migrations
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        Ok(Self { pool })
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Get user by id
    pub async fn get_user(&self, id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Get user by exact username
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Fetch many users in one round-trip; missing ids are skipped
    pub async fn get_users_by_ids(&self, ids: &[String]) -> Result<Vec<User>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_builder = QueryBuilder::<Sqlite>::new("SELECT * FROM users WHERE id IN (");
        {
            let mut separated = query_builder.separated(", ");
            for id in ids {
                separated.push_bind(id);
            }
        }
        query_builder.push(")");

        let users = query_builder
            .build_query_as::<User>()
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    /// Insert a user from identity claims unless the id already exists
    ///
    /// # Returns
    /// true if a row was created
    pub async fn insert_user(
        &self,
        identity: &UserIdentity,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (
                id, email, first_name, last_name, profile_image_url,
                is_admin, is_banned, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&identity.id)
        .bind(&identity.email)
        .bind(&identity.first_name)
        .bind(&identity.last_name)
        .bind(&identity.profile_image_url)
        .bind(identity.is_admin)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() > 0 => {
                self.refresh_search_key(&identity.id).await?;
                Ok(true)
            }
            Ok(_) => Ok(false),
            Err(error) if is_unique_violation(&error) => Err(AppError::Conflict(
                "Email is already registered to another user".to_string(),
            )),
            Err(error) => Err(error.into()),
        }
    }

    /// Overwrite identity-provider fields of an existing user
    ///
    /// The admin flag is only ever raised here, never cleared.
    pub async fn refresh_user_identity(
        &self,
        identity: &UserIdentity,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = ?, first_name = ?, last_name = ?, profile_image_url = ?,
                is_admin = (is_admin OR ?), updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&identity.email)
        .bind(&identity.first_name)
        .bind(&identity.last_name)
        .bind(&identity.profile_image_url)
        .bind(identity.is_admin)
        .bind(now)
        .bind(&identity.id)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) if done.rows_affected() > 0 => {
                self.refresh_search_key(&identity.id).await?;
                Ok(true)
            }
            Ok(_) => Ok(false),
            Err(error) if is_unique_violation(&error) => Err(AppError::Conflict(
                "Email is already registered to another user".to_string(),
            )),
            Err(error) => Err(error.into()),
        }
    }

    /// Apply a partial profile update
    ///
    /// # Returns
    /// false if the user does not exist
    ///
    /// # Errors
    /// `Conflict` when the username is taken by another user
    pub async fn update_user_profile(
        &self,
        id: &str,
        changes: &ProfileChanges,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let mut query_builder = QueryBuilder::<Sqlite>::new("UPDATE users SET ");
        {
            let mut separated = query_builder.separated(", ");
            let columns = [
                ("first_name", &changes.first_name),
                ("last_name", &changes.last_name),
                ("username", &changes.username),
                ("bio", &changes.bio),
                ("location", &changes.location),
                ("website", &changes.website),
                ("profile_image_url", &changes.profile_image_url),
            ];
            for (column, value) in columns {
                if let Some(value) = value {
                    separated.push(format!("{column} = "));
                    separated.push_bind_unseparated(value.clone());
                }
            }
            separated.push("updated_at = ");
            separated.push_bind_unseparated(updated_at);
        }
        query_builder.push(" WHERE id = ");
        query_builder.push_bind(id);

        match query_builder.build().execute(&self.pool).await {
            Ok(done) if done.rows_affected() > 0 => {
                self.refresh_search_key(id).await?;
                Ok(true)
            }
            Ok(_) => Ok(false),
            Err(error) if is_unique_violation(&error) => {
                Err(AppError::Conflict("Username is already taken".to_string()))
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Recompute `search_key` from the stored name fields
    async fn refresh_search_key(&self, id: &str) -> Result<(), AppError> {
        let Some(user) = self.get_user(id).await? else {
            return Ok(());
        };
        sqlx::query("UPDATE users SET search_key = ? WHERE id = ?")
            .bind(search_key(&user))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// List users, newest first
    pub async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users ORDER BY created_at DESC, id LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// Case-insensitive substring search over username and name parts
    pub async fn search_users(&self, query: &str, limit: i64) -> Result<Vec<User>, AppError> {
        let pattern = format!("%{}%", escape_like(&query.to_lowercase()));
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE search_key LIKE ?1 ESCAPE '\'
            ORDER BY created_at DESC, id
            LIMIT ?2
            "#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// Set or clear the banned flag
    ///
    /// # Returns
    /// false if the user does not exist
    pub async fn set_user_banned(
        &self,
        id: &str,
        banned: bool,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let banned_at = banned.then_some(now);
        let result = sqlx::query(
            "UPDATE users SET is_banned = ?, banned_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(banned)
        .bind(banned_at)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Follower/following/post counts for a batch of users
    pub async fn user_counts_for(
        &self,
        user_ids: &[String],
    ) -> Result<HashMap<String, UserCounts>, AppError> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let started = Instant::now();
        let mut query_builder = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT u.id AS id,
                (SELECT COUNT(*) FROM follows f WHERE f.following_id = u.id) AS followers,
                (SELECT COUNT(*) FROM follows f WHERE f.follower_id = u.id) AS following,
                (SELECT COUNT(*) FROM posts p WHERE p.user_id = u.id) AS posts
            FROM users u
            WHERE u.id IN ("#,
        );
        {
            let mut separated = query_builder.separated(", ");
            for id in user_ids {
                separated.push_bind(id);
            }
        }
        query_builder.push(")");

        let rows = query_builder.build().fetch_all(&self.pool).await?;
        crate::metrics::observe_db_query("count", "users", started.elapsed());

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            counts.insert(
                row.try_get::<String, _>("id")?,
                UserCounts {
                    followers: row.try_get("followers")?,
                    following: row.try_get("following")?,
                    posts: row.try_get("posts")?,
                },
            );
        }
        Ok(counts)
    }

    // =========================================================================
    // Follows
    // =========================================================================

    /// Insert follow edge if absent
    pub async fn insert_follow(
        &self,
        follower_id: &str,
        following_id: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "INSERT INTO follows (follower_id, following_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(follower_id)
        .bind(following_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;
        insert_outcome(result)
    }

    /// Delete follow edge if present
    pub async fn delete_follow(
        &self,
        follower_id: &str,
        following_id: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = ? AND following_id = ?")
            .bind(follower_id)
            .bind(following_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Subset of `candidate_ids` that `viewer_id` follows
    pub async fn followed_among(
        &self,
        viewer_id: &str,
        candidate_ids: &[String],
    ) -> Result<HashSet<String>, AppError> {
        if candidate_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let mut query_builder = QueryBuilder::<Sqlite>::new(
            "SELECT following_id FROM follows WHERE follower_id = ",
        );
        query_builder.push_bind(viewer_id);
        query_builder.push(" AND following_id IN (");
        {
            let mut separated = query_builder.separated(", ");
            for id in candidate_ids {
                separated.push_bind(id);
            }
        }
        query_builder.push(")");

        let ids = query_builder
            .build_query_scalar::<String>()
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    /// Users following `user_id`, most recent follow first
    pub async fn list_followers(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            INNER JOIN follows f ON f.follower_id = u.id
            WHERE f.following_id = ?
            ORDER BY f.created_at DESC, f.id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    /// Users `user_id` follows, most recent follow first
    pub async fn list_following(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<User>, AppError> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT u.* FROM users u
            INNER JOIN follows f ON f.following_id = u.id
            WHERE f.follower_id = ?
            ORDER BY f.created_at DESC, f.id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    // =========================================================================
    // Posts
    // =========================================================================

    /// Insert post and return the stored row
    pub async fn insert_post(&self, user_id: &str, post: &NewPost) -> Result<Post, AppError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO posts (
                user_id, content, image_url, parent_post_id,
                is_repost, original_post_id, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(&post.content)
        .bind(&post.image_url)
        .bind(post.parent_post_id)
        .bind(post.original_post_id.is_some())
        .bind(post.original_post_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.get_post(id).await?.ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("post {id} missing right after insert"))
        })
    }

    /// Get post by id
    pub async fn get_post(&self, id: i64) -> Result<Option<Post>, AppError> {
        let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    /// Check whether a post exists
    pub async fn post_exists(&self, id: i64) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, i64>("SELECT EXISTS(SELECT 1 FROM posts WHERE id = ?)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists != 0)
    }

    /// All posts, newest first
    pub async fn list_posts(&self, limit: i64, offset: i64) -> Result<Vec<Post>, AppError> {
        let started = Instant::now();
        let posts = sqlx::query_as::<_, Post>(
            "SELECT * FROM posts ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        crate::metrics::observe_db_query("select", "posts", started.elapsed());
        Ok(posts)
    }

    /// Posts by any of `author_ids`, newest first
    pub async fn list_posts_by_authors(
        &self,
        author_ids: &[String],
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, AppError> {
        if author_ids.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let mut query_builder = QueryBuilder::<Sqlite>::new("SELECT * FROM posts WHERE user_id IN (");
        {
            let mut separated = query_builder.separated(", ");
            for id in author_ids {
                separated.push_bind(id);
            }
        }
        query_builder.push(") ORDER BY created_at DESC, id DESC LIMIT ");
        query_builder.push_bind(limit);
        query_builder.push(" OFFSET ");
        query_builder.push_bind(offset);

        let posts = query_builder
            .build_query_as::<Post>()
            .fetch_all(&self.pool)
            .await?;
        crate::metrics::observe_db_query("select", "posts", started.elapsed());
        Ok(posts)
    }

    /// Home feed page: posts by `viewer_id` and everyone they follow, newest first
    ///
    /// The followee set is resolved inside the query, so its size never
    /// reaches the bound-parameter limit.
    pub async fn list_feed_posts(
        &self,
        viewer_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, AppError> {
        let started = Instant::now();
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT * FROM posts
            WHERE user_id = ?1
               OR user_id IN (SELECT following_id FROM follows WHERE follower_id = ?1)
            ORDER BY created_at DESC, id DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(viewer_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        crate::metrics::observe_db_query("select", "posts", started.elapsed());
        Ok(posts)
    }

    /// Posts bookmarked by `user_id`, most recent bookmark first
    pub async fn list_bookmarked_posts(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Post>, AppError> {
        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT p.* FROM posts p
            INNER JOIN bookmarks b ON b.post_id = p.id
            WHERE b.user_id = ?
            ORDER BY b.created_at DESC, b.id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    /// Delete a post owned by `user_id`
    ///
    /// # Returns
    /// false if no post with that id belongs to the user
    pub async fn delete_post_owned(&self, id: i64, user_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a post regardless of owner
    pub async fn delete_post(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Like/comment/repost counts for a batch of posts
    ///
    /// Ids with no matching post are absent from the map.
    pub async fn engagement_counts_for_posts(
        &self,
        post_ids: &[i64],
    ) -> Result<HashMap<i64, PostCounts>, AppError> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let started = Instant::now();
        let mut query_builder = QueryBuilder::<Sqlite>::new(
            r#"
            SELECT p.id AS id,
                (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes,
                (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments,
                (SELECT COUNT(*) FROM posts r WHERE r.original_post_id = p.id) AS reposts
            FROM posts p
            WHERE p.id IN ("#,
        );
        {
            let mut separated = query_builder.separated(", ");
            for id in post_ids {
                separated.push_bind(*id);
            }
        }
        query_builder.push(")");

        let rows = query_builder.build().fetch_all(&self.pool).await?;
        crate::metrics::observe_db_query("count", "posts", started.elapsed());

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            counts.insert(
                row.try_get::<i64, _>("id")?,
                PostCounts {
                    likes: row.try_get("likes")?,
                    comments: row.try_get("comments")?,
                    reposts: row.try_get("reposts")?,
                },
            );
        }
        Ok(counts)
    }

    /// Like/bookmark flags of `viewer_id` for a batch of posts
    pub async fn viewer_flags_for_posts(
        &self,
        viewer_id: &str,
        post_ids: &[i64],
    ) -> Result<HashMap<i64, ViewerFlags>, AppError> {
        if post_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query_builder = QueryBuilder::<Sqlite>::new(
            "SELECT p.id AS id, EXISTS(SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = ",
        );
        query_builder.push_bind(viewer_id);
        query_builder.push(
            ") AS liked, EXISTS(SELECT 1 FROM bookmarks b WHERE b.post_id = p.id AND b.user_id = ",
        );
        query_builder.push_bind(viewer_id);
        query_builder.push(") AS bookmarked FROM posts p WHERE p.id IN (");
        {
            let mut separated = query_builder.separated(", ");
            for id in post_ids {
                separated.push_bind(*id);
            }
        }
        query_builder.push(")");

        let rows = query_builder.build().fetch_all(&self.pool).await?;

        let mut flags = HashMap::with_capacity(rows.len());
        for row in rows {
            flags.insert(
                row.try_get::<i64, _>("id")?,
                ViewerFlags {
                    liked: row.try_get::<i64, _>("liked")? != 0,
                    bookmarked: row.try_get::<i64, _>("bookmarked")? != 0,
                },
            );
        }
        Ok(flags)
    }

    // =========================================================================
    // Likes / Bookmarks
    // =========================================================================

    /// Insert like if absent
    pub async fn insert_like(&self, user_id: &str, post_id: i64) -> Result<bool, AppError> {
        let result =
            sqlx::query("INSERT INTO likes (user_id, post_id, created_at) VALUES (?, ?, ?)")
                .bind(user_id)
                .bind(post_id)
                .bind(Utc::now())
                .execute(&self.pool)
                .await;
        insert_outcome(result)
    }

    /// Delete like if present
    pub async fn delete_like(&self, user_id: &str, post_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM likes WHERE user_id = ? AND post_id = ?")
            .bind(user_id)
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Insert bookmark if absent
    pub async fn insert_bookmark(&self, user_id: &str, post_id: i64) -> Result<bool, AppError> {
        let result =
            sqlx::query("INSERT INTO bookmarks (user_id, post_id, created_at) VALUES (?, ?, ?)")
                .bind(user_id)
                .bind(post_id)
                .bind(Utc::now())
                .execute(&self.pool)
                .await;
        insert_outcome(result)
    }

    /// Delete bookmark if present
    pub async fn delete_bookmark(&self, user_id: &str, post_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM bookmarks WHERE user_id = ? AND post_id = ?")
            .bind(user_id)
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// Insert comment; `None` if the post does not exist
    pub async fn insert_comment(
        &self,
        user_id: &str,
        post_id: i64,
        content: &str,
    ) -> Result<Option<Comment>, AppError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO comments (user_id, post_id, content, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(post_id)
        .bind(content)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        let id = match result {
            Ok(done) => done.last_insert_rowid(),
            Err(sqlx::Error::Database(db_error)) if db_error.is_foreign_key_violation() => {
                return Ok(None);
            }
            Err(error) => return Err(error.into()),
        };

        let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(comment)
    }

    /// Comments on a post, newest first
    pub async fn list_post_comments(
        &self,
        post_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Comment>, AppError> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT * FROM comments
            WHERE post_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(post_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }
}
