use chrono::Utc;
use uuid::Uuid;

use super::schema::Database;
use super::types::{to_millis, StoreError, User, UserRow};

impl Database {
    // ========================================================================
    // User Operations
    // ========================================================================

    /// Register a new user. Fails with `UniqueViolation` if the name is taken.
    pub async fn create_user(&self, name: &str) -> Result<User, StoreError> {
        let now = to_millis(Utc::now());
        let row: UserRow = sqlx::query_as(
            r#"
                INSERT INTO users (id, created_at, updated_at, name)
                VALUES (?, ?, ?, ?)
                RETURNING id, created_at, updated_at, name
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(now)
        .bind(now)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into_user())
    }

    pub async fn get_user_by_name(&self, name: &str) -> Result<User, StoreError> {
        let row: Option<UserRow> =
            sqlx::query_as("SELECT id, created_at, updated_at, name FROM users WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        row.map(UserRow::into_user)
            .ok_or(StoreError::NotFound("user"))
    }

    /// All user names in registration order
    pub async fn list_user_names(&self) -> Result<Vec<String>, StoreError> {
        let names: Vec<(String,)> = sqlx::query_as("SELECT name FROM users ORDER BY created_at, rowid")
            .fetch_all(&self.pool)
            .await?;
        Ok(names.into_iter().map(|(n,)| n).collect())
    }

    /// Delete every user. Feeds, follows and posts go with them via ON DELETE CASCADE.
    pub async fn delete_all_users(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM users").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}
