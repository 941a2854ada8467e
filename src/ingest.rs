//! Turns decoded feed items into stored posts.
//!
//! Items are inserted one at a time in document order. A post whose URL is
//! already stored (by this feed, another feed, or an earlier item of the same
//! document) counts as skipped rather than failing the batch.

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::feed::{parse_date, DateParseError, RawFeedDocument, RawItem};
use crate::storage::{FeedStore, NewPost, StoreError};

/// Per-document insert counters. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub added: usize,
    pub skipped: usize,
}

impl fmt::Display for IngestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "added {} new posts, skipped {} existing posts",
            self.added, self.skipped
        )
    }
}

/// Reasons ingestion of a document stopped early.
///
/// Posts inserted before the failing item remain stored.
#[derive(Debug, Error)]
pub enum IngestError {
    /// An item's publish date matched no known layout
    #[error(transparent)]
    Date(#[from] DateParseError),

    /// A storage failure other than a duplicate URL
    #[error("Failed to store post {url}: {source}")]
    Storage {
        url: String,
        #[source]
        source: StoreError,
    },
}

/// Store every item of `document` as a post of `feed_id`.
///
/// # Errors
///
/// - [`IngestError::Date`] - The first item whose date cannot be parsed aborts the rest
/// - [`IngestError::Storage`] - Any insert failure that is not a uniqueness violation
pub async fn ingest_document<S: FeedStore>(
    store: &S,
    feed_id: Uuid,
    document: &RawFeedDocument,
) -> Result<IngestSummary, IngestError> {
    let mut summary = IngestSummary::default();

    for item in &document.items {
        let post = new_post(feed_id, item)?;

        match store.insert_post(&post).await {
            Ok(post_id) => {
                summary.added += 1;
                tracing::debug!(post_id = %post_id, url = %post.url, "Saved post");
            }
            Err(StoreError::UniqueViolation(_)) => {
                summary.skipped += 1;
                tracing::debug!(url = %post.url, "Post already stored, skipping");
            }
            Err(source) => {
                return Err(IngestError::Storage {
                    url: post.url,
                    source,
                })
            }
        }
    }

    Ok(summary)
}

fn new_post(feed_id: Uuid, item: &RawItem) -> Result<NewPost, DateParseError> {
    Ok(NewPost {
        feed_id,
        url: item.link.clone(),
        title: non_empty(&item.title),
        description: non_empty(&item.description),
        published_at: parse_date(&item.pub_date)?,
    })
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Database, Feed};
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn setup() -> (Database, Uuid) {
        let db = Database::open(":memory:").await.unwrap();
        let user = db.create_user("alice").await.unwrap();
        let feed = db
            .create_feed("Blog", "https://example.com/rss", user.id)
            .await
            .unwrap();
        (db, feed.id)
    }

    fn item(slug: &str, pub_date: &str) -> RawItem {
        RawItem {
            title: format!("Title {slug}"),
            link: format!("https://example.com/{slug}"),
            description: format!("About {slug}"),
            pub_date: pub_date.to_string(),
        }
    }

    fn document(items: Vec<RawItem>) -> RawFeedDocument {
        RawFeedDocument {
            title: "Blog".into(),
            description: String::new(),
            items,
        }
    }

    const DATE: &str = "Mon, 01 Jan 2024 10:00:00 +0000";

    #[tokio::test]
    async fn test_reingest_skips_everything() {
        let (db, feed_id) = setup().await;
        let doc = document(vec![item("a", DATE), item("b", DATE), item("c", DATE)]);

        let first = ingest_document(&db, feed_id, &doc).await.unwrap();
        assert_eq!(first, IngestSummary { added: 3, skipped: 0 });

        let second = ingest_document(&db, feed_id, &doc).await.unwrap();
        assert_eq!(second, IngestSummary { added: 0, skipped: 3 });

        assert_eq!(db.posts_for_feed(feed_id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_duplicate_link_within_one_document() {
        let (db, feed_id) = setup().await;
        let doc = document(vec![item("same", DATE), item("same", DATE)]);

        let summary = ingest_document(&db, feed_id, &doc).await.unwrap();
        assert_eq!(summary, IngestSummary { added: 1, skipped: 1 });
    }

    #[tokio::test]
    async fn test_empty_title_and_description_stored_as_absent() {
        let (db, feed_id) = setup().await;
        let doc = document(vec![RawItem {
            title: String::new(),
            link: "https://example.com/bare".into(),
            description: String::new(),
            pub_date: DATE.into(),
        }]);

        ingest_document(&db, feed_id, &doc).await.unwrap();

        let posts = db.posts_for_feed(feed_id).await.unwrap();
        assert_eq!(posts[0].title, None);
        assert_eq!(posts[0].description, None);
    }

    #[tokio::test]
    async fn test_dates_normalized_to_utc() {
        let (db, feed_id) = setup().await;
        let doc = document(vec![item("a", "Mon, 01 Jan 2024 05:00:00 -0500")]);

        ingest_document(&db, feed_id, &doc).await.unwrap();

        let posts = db.posts_for_feed(feed_id).await.unwrap();
        assert_eq!(
            posts[0].published_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 10, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_bad_date_aborts_but_keeps_earlier_items() {
        let (db, feed_id) = setup().await;
        let doc = document(vec![
            item("a", DATE),
            item("b", "not-a-date"),
            item("c", DATE),
        ]);

        let err = ingest_document(&db, feed_id, &doc).await.unwrap_err();
        match err {
            IngestError::Date(e) => assert_eq!(e.input, "not-a-date"),
            e => panic!("Expected Date error, got {e:?}"),
        }

        let posts = db.posts_for_feed(feed_id).await.unwrap();
        let urls: Vec<_> = posts.iter().map(|p| p.url.as_str()).collect();
        assert_eq!(urls, vec!["https://example.com/a"]);
    }

    #[tokio::test]
    async fn test_bad_date_leaves_other_feeds_untouched() {
        let (db, feed_id) = setup().await;
        let user = db.get_user_by_name("alice").await.unwrap();
        let other = db
            .create_feed("Other", "https://other.example.com/rss", user.id)
            .await
            .unwrap();
        ingest_document(&db, other.id, &document(vec![item("x", DATE)]))
            .await
            .unwrap();

        let result = ingest_document(&db, feed_id, &document(vec![item("y", "")])).await;

        assert!(matches!(result, Err(IngestError::Date(_))));
        assert_eq!(db.posts_for_feed(other.id).await.unwrap().len(), 1);
        assert!(db.posts_for_feed(feed_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_document_adds_nothing() {
        let (db, feed_id) = setup().await;
        let summary = ingest_document(&db, feed_id, &document(vec![]))
            .await
            .unwrap();
        assert_eq!(summary, IngestSummary::default());
    }

    #[test]
    fn test_summary_display() {
        let summary = IngestSummary { added: 2, skipped: 5 };
        assert_eq!(
            summary.to_string(),
            "added 2 new posts, skipped 5 existing posts"
        );
    }

    /// Accepts the first `ok_inserts` posts, then fails with a non-unique error
    struct FailingStore {
        ok_inserts: usize,
        attempts: AtomicUsize,
    }

    impl FeedStore for FailingStore {
        async fn select_least_recently_fetched_feed(&self) -> Result<Feed, StoreError> {
            Err(StoreError::NotFound("feed"))
        }

        async fn mark_feed_fetched(&self, _: Uuid, _: DateTime<Utc>) -> Result<(), StoreError> {
            Ok(())
        }

        async fn insert_post(&self, _: &NewPost) -> Result<Uuid, StoreError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.ok_inserts {
                Ok(Uuid::new_v4())
            } else {
                Err(StoreError::Database(sqlx::Error::PoolTimedOut))
            }
        }
    }

    #[tokio::test]
    async fn test_storage_failure_aborts_remaining_items() {
        let store = FailingStore {
            ok_inserts: 1,
            attempts: AtomicUsize::new(0),
        };
        let doc = document(vec![item("a", DATE), item("b", DATE), item("c", DATE)]);

        let err = ingest_document(&store, Uuid::new_v4(), &doc)
            .await
            .unwrap_err();

        match err {
            IngestError::Storage { url, .. } => assert_eq!(url, "https://example.com/b"),
            e => panic!("Expected Storage error, got {e:?}"),
        }
        assert_eq!(store.attempts.load(Ordering::SeqCst), 2);
    }
}
