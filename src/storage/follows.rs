use chrono::Utc;
use uuid::Uuid;

use super::schema::Database;
use super::types::{to_millis, FeedFollowDetails, StoreError};

impl Database {
    // ========================================================================
    // Follow Operations
    // ========================================================================

    /// Make `user_id` follow `feed_id`. Following twice is a `UniqueViolation`.
    pub async fn create_feed_follow(
        &self,
        user_id: Uuid,
        feed_id: Uuid,
    ) -> Result<FeedFollowDetails, StoreError> {
        let now = to_millis(Utc::now());
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO feed_follows (id, created_at, updated_at, user_id, feed_id)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(now)
        .bind(now)
        .bind(user_id)
        .bind(feed_id)
        .execute(&mut *tx)
        .await?;

        let (feed_name, user_name): (String, String) = sqlx::query_as(
            r#"
                SELECT f.name, u.name
                FROM feed_follows ff
                JOIN feeds f ON f.id = ff.feed_id
                JOIN users u ON u.id = ff.user_id
                WHERE ff.id = ?
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(FeedFollowDetails {
            id,
            feed_name,
            user_name,
        })
    }

    /// Feeds followed by `user_id`, oldest follow first
    pub async fn feed_follows_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<FeedFollowDetails>, StoreError> {
        let rows: Vec<(Uuid, String, String)> = sqlx::query_as(
            r#"
                SELECT ff.id, f.name, u.name
                FROM feed_follows ff
                JOIN feeds f ON f.id = ff.feed_id
                JOIN users u ON u.id = ff.user_id
                WHERE ff.user_id = ?
                ORDER BY ff.created_at, ff.rowid
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, feed_name, user_name)| FeedFollowDetails {
                id,
                feed_name,
                user_name,
            })
            .collect())
    }

    /// Remove a follow. Returns `NotFound` if the user was not following the feed.
    pub async fn delete_feed_follow(&self, user_id: Uuid, feed_id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM feed_follows WHERE user_id = ? AND feed_id = ?")
            .bind(user_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("feed follow"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, StoreError};

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_follow_returns_names() {
        let db = test_db().await;
        let owner = db.create_user("alice").await.unwrap();
        let reader = db.create_user("bob").await.unwrap();
        let feed = db
            .create_feed("Blog", "https://example.com/rss", owner.id)
            .await
            .unwrap();

        let follow = db.create_feed_follow(reader.id, feed.id).await.unwrap();
        assert_eq!(follow.feed_name, "Blog");
        assert_eq!(follow.user_name, "bob");
    }

    #[tokio::test]
    async fn test_double_follow_is_unique_violation() {
        let db = test_db().await;
        let user = db.create_user("alice").await.unwrap();
        let feed = db
            .create_feed("Blog", "https://example.com/rss", user.id)
            .await
            .unwrap();
        db.create_feed_follow(user.id, feed.id).await.unwrap();

        let err = db.create_feed_follow(user.id, feed.id).await.unwrap_err();
        assert!(err.is_unique_violation());
    }

    #[tokio::test]
    async fn test_unfollow_removes_follow() {
        let db = test_db().await;
        let user = db.create_user("alice").await.unwrap();
        let feed = db
            .create_feed("Blog", "https://example.com/rss", user.id)
            .await
            .unwrap();
        db.create_feed_follow(user.id, feed.id).await.unwrap();

        db.delete_feed_follow(user.id, feed.id).await.unwrap();
        assert!(db.feed_follows_for_user(user.id).await.unwrap().is_empty());

        let err = db.delete_feed_follow(user.id, feed.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
