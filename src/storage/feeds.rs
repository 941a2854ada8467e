use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::schema::Database;
use super::types::{to_millis, Feed, FeedRow, FeedWithOwner, StoreError};

const FEED_COLUMNS: &str = "id, created_at, updated_at, name, url, user_id, last_fetched_at";

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Create a feed owned by `user_id`. Fails with `UniqueViolation` if the URL
    /// is already registered.
    pub async fn create_feed(
        &self,
        name: &str,
        url: &str,
        user_id: Uuid,
    ) -> Result<Feed, StoreError> {
        let now = to_millis(Utc::now());
        let row: FeedRow = sqlx::query_as(&format!(
            "INSERT INTO feeds (id, created_at, updated_at, name, url, user_id)
             VALUES (?, ?, ?, ?, ?, ?)
             RETURNING {FEED_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(now)
        .bind(now)
        .bind(name)
        .bind(url)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into_feed())
    }

    pub async fn get_feed_by_url(&self, url: &str) -> Result<Feed, StoreError> {
        let row: Option<FeedRow> =
            sqlx::query_as(&format!("SELECT {FEED_COLUMNS} FROM feeds WHERE url = ?"))
                .bind(url)
                .fetch_optional(&self.pool)
                .await?;
        row.map(FeedRow::into_feed)
            .ok_or(StoreError::NotFound("feed"))
    }

    /// Every feed with the name of the user who added it
    pub async fn list_feeds_with_owner(&self) -> Result<Vec<FeedWithOwner>, StoreError> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            r#"
                SELECT f.name, f.url, u.name
                FROM feeds f
                JOIN users u ON u.id = f.user_id
                ORDER BY f.created_at, f.rowid
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(name, url, owner_name)| FeedWithOwner {
                name,
                url,
                owner_name,
            })
            .collect())
    }

    // ========================================================================
    // Scheduling Operations
    // ========================================================================

    /// The feed whose last fetch is oldest. Never-fetched feeds come first;
    /// ties fall back to creation order.
    pub async fn next_feed_to_fetch(&self) -> Result<Feed, StoreError> {
        let row: Option<FeedRow> = sqlx::query_as(&format!(
            "SELECT {FEED_COLUMNS} FROM feeds
             ORDER BY last_fetched_at ASC NULLS FIRST, created_at ASC, rowid ASC
             LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;
        row.map(FeedRow::into_feed)
            .ok_or(StoreError::NotFound("feed"))
    }

    /// Record that `feed_id` was fetched at `at`.
    ///
    /// The stored timestamp never moves backwards: an older `at` leaves the
    /// current value in place.
    pub async fn mark_feed_fetched(
        &self,
        feed_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let at = to_millis(at);
        let result = sqlx::query(
            "UPDATE feeds
             SET last_fetched_at = MAX(COALESCE(last_fetched_at, ?), ?),
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(at)
        .bind(at)
        .bind(to_millis(Utc::now()))
        .bind(feed_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("feed"));
        }
        Ok(())
    }
}
