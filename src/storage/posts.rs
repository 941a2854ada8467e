use chrono::Utc;
use uuid::Uuid;

use super::schema::Database;
use super::types::{to_millis, NewPost, Post, PostRow, StoreError};

/// Maximum number of posts returned by a browse query (OOM protection)
const MAX_POSTS: i64 = 500;

impl Database {
    // ========================================================================
    // Post Operations
    // ========================================================================

    /// Insert a single post under a freshly generated id.
    ///
    /// Each insert is its own statement, so a duplicate `url` fails alone with
    /// `StoreError::UniqueViolation` and leaves earlier inserts committed.
    pub async fn create_post(&self, post: &NewPost) -> Result<Uuid, StoreError> {
        let now = to_millis(Utc::now());
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO posts (id, created_at, updated_at, title, url, description, published_at, feed_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(now)
        .bind(now)
        .bind(&post.title)
        .bind(&post.url)
        .bind(&post.description)
        .bind(to_millis(post.published_at))
        .bind(post.feed_id)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    /// Most recently published posts from feeds `user_id` follows
    pub async fn posts_for_user(&self, user_id: Uuid, limit: i64) -> Result<Vec<Post>, StoreError> {
        let limit = limit.clamp(0, MAX_POSTS);
        let rows: Vec<PostRow> = sqlx::query_as(
            r#"
                SELECT p.id, p.created_at, p.updated_at, p.title, p.url, p.description,
                       p.published_at, p.feed_id
                FROM posts p
                JOIN feed_follows ff ON ff.feed_id = p.feed_id
                WHERE ff.user_id = ?
                ORDER BY p.published_at DESC
                LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PostRow::into_post).collect())
    }

    /// All posts stored for one feed, in insertion order
    pub async fn posts_for_feed(&self, feed_id: Uuid) -> Result<Vec<Post>, StoreError> {
        let rows: Vec<PostRow> = sqlx::query_as(
            r#"
                SELECT id, created_at, updated_at, title, url, description, published_at, feed_id
                FROM posts
                WHERE feed_id = ?
                ORDER BY created_at, rowid
            "#,
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(PostRow::into_post).collect())
    }
}
