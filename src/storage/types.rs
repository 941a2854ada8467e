use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while opening the database
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

/// Errors returned by individual storage operations.
///
/// Uniqueness violations get their own variant so callers can treat a
/// re-inserted post as a duplicate instead of a failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A UNIQUE constraint rejected the write
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The requested record does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StoreError::UniqueViolation(db_err.message().to_string())
            }
            sqlx::Error::RowNotFound => StoreError::NotFound("row"),
            other => StoreError::Database(other),
        }
    }
}

impl StoreError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation(_))
    }
}

// ============================================================================
// Timestamp Helpers
// ============================================================================

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

// ============================================================================
// Data Structures
// ============================================================================

/// A registered account
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
}

/// A subscribed syndication source.
///
/// `last_fetched_at` is `None` until the scheduler first selects the feed.
#[derive(Debug, Clone)]
pub struct Feed {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

/// Feed listing row joined with the owning user's name
#[derive(Debug, Clone)]
pub struct FeedWithOwner {
    pub name: String,
    pub url: String,
    pub owner_name: String,
}

/// A follow relationship resolved to display names
#[derive(Debug, Clone)]
pub struct FeedFollowDetails {
    pub id: Uuid,
    pub feed_name: String,
    pub user_name: String,
}

/// An ingested feed item, deduplicated across all feeds by `url`
#[derive(Debug, Clone)]
pub struct Post {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: Option<String>,
    pub url: String,
    pub description: Option<String>,
    pub published_at: DateTime<Utc>,
    pub feed_id: Uuid,
}

/// Insert parameters for a post produced by the ingestion pipeline
#[derive(Debug, Clone)]
pub struct NewPost {
    pub feed_id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub published_at: DateTime<Utc>,
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
    pub name: String,
}

impl UserRow {
    pub(crate) fn into_user(self) -> User {
        User {
            id: self.id,
            created_at: from_millis(self.created_at),
            updated_at: from_millis(self.updated_at),
            name: self.name,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FeedRow {
    pub id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
    pub name: String,
    pub url: String,
    pub user_id: Uuid,
    pub last_fetched_at: Option<i64>,
}

impl FeedRow {
    pub(crate) fn into_feed(self) -> Feed {
        Feed {
            id: self.id,
            created_at: from_millis(self.created_at),
            updated_at: from_millis(self.updated_at),
            name: self.name,
            url: self.url,
            user_id: self.user_id,
            last_fetched_at: self.last_fetched_at.map(from_millis),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PostRow {
    pub id: Uuid,
    pub created_at: i64,
    pub updated_at: i64,
    pub title: Option<String>,
    pub url: String,
    pub description: Option<String>,
    pub published_at: i64,
    pub feed_id: Uuid,
}

impl PostRow {
    pub(crate) fn into_post(self) -> Post {
        Post {
            id: self.id,
            created_at: from_millis(self.created_at),
            updated_at: from_millis(self.updated_at),
            title: self.title,
            url: self.url,
            description: self.description,
            published_at: from_millis(self.published_at),
            feed_id: self.feed_id,
        }
    }
}
