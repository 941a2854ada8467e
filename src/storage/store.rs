//! The storage contract the ingestion engine depends on.
//!
//! [`Database`] is the production implementation. Tests can substitute any
//! other implementation (for instance one that fails on demand) without
//! touching the scheduler or pipeline.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::schema::Database;
use super::types::{Feed, NewPost, StoreError};

pub trait FeedStore: Send + Sync {
    /// The feed with the oldest `last_fetched_at`, never-fetched feeds first.
    /// `StoreError::NotFound` when no feeds exist.
    fn select_least_recently_fetched_feed(
        &self,
    ) -> impl Future<Output = Result<Feed, StoreError>> + Send;

    /// Set the feed's freshness timestamp. Must never move it backwards.
    fn mark_feed_fetched(
        &self,
        feed_id: Uuid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Insert one post atomically. A duplicate source URL must surface as
    /// `StoreError::UniqueViolation`.
    fn insert_post(&self, post: &NewPost) -> impl Future<Output = Result<Uuid, StoreError>> + Send;
}

impl FeedStore for Database {
    async fn select_least_recently_fetched_feed(&self) -> Result<Feed, StoreError> {
        self.next_feed_to_fetch().await
    }

    async fn mark_feed_fetched(&self, feed_id: Uuid, at: DateTime<Utc>) -> Result<(), StoreError> {
        Database::mark_feed_fetched(self, feed_id, at).await
    }

    async fn insert_post(&self, post: &NewPost) -> Result<Uuid, StoreError> {
        self.create_post(post).await
    }
}
