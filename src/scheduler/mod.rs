//! Periodic feed ingestion.
//!
//! Each tick runs one cycle over exactly one feed:
//!
//! 1. select the least recently fetched feed (never-fetched first)
//! 2. mark it fetched *now*, before any network traffic
//! 3. fetch and decode its document
//! 4. ingest the items, skipping already-stored URLs
//!
//! Marking before fetching means a feed whose fetch fails or hangs gives up
//! its turn instead of being picked again on the next tick. Cycles never
//! overlap; ticks missed during a slow cycle are dropped.

mod ticker;

pub use ticker::{IntervalTicker, Ticker};

use std::fmt;
use std::future::Future;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::feed::{FetchError, Fetcher};
use crate::ingest::{ingest_document, IngestError, IngestSummary};
use crate::storage::{FeedStore, StoreError};
use crate::util::{parse_interval, IntervalError};

/// Everything a cycle needs, passed explicitly.
pub struct Context<S> {
    pub store: S,
    pub fetcher: Fetcher,
}

impl<S: FeedStore> Context<S> {
    pub fn new(store: S, fetcher: Fetcher) -> Self {
        Self { store, fetcher }
    }
}

/// Outcome of one successful cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub feed_name: String,
    pub feed_url: String,
    /// Title the document gave its channel
    pub channel_title: String,
    pub summary: IngestSummary,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Feed {}: {}", self.channel_title, self.summary)
    }
}

/// Why a single cycle ended early. Never fatal to the loop.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Could not select a feed to fetch: {0}")]
    Selection(#[source] StoreError),

    #[error("Could not mark feed {feed} as fetched: {source}")]
    MarkFetched {
        feed: String,
        #[source]
        source: StoreError,
    },

    #[error("Could not fetch feed {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("Could not ingest feed {url}: {source}")]
    Ingest {
        url: String,
        #[source]
        source: IngestError,
    },
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Invalid interval {input:?}: {source}")]
    InvalidInterval {
        input: String,
        #[source]
        source: IntervalError,
    },
}

/// Run one select → mark → fetch → ingest pass, stamping the feed with `now`.
pub async fn run_cycle<S: FeedStore>(
    ctx: &Context<S>,
    now: DateTime<Utc>,
) -> Result<CycleReport, CycleError> {
    let feed = ctx
        .store
        .select_least_recently_fetched_feed()
        .await
        .map_err(CycleError::Selection)?;

    tracing::debug!(
        feed_id = %feed.id,
        url = %feed.url,
        last_fetched_at = ?feed.last_fetched_at,
        "Selected feed"
    );

    ctx.store
        .mark_feed_fetched(feed.id, now)
        .await
        .map_err(|source| CycleError::MarkFetched {
            feed: feed.name.clone(),
            source,
        })?;

    let document = ctx
        .fetcher
        .fetch(&feed.url)
        .await
        .map_err(|source| CycleError::Fetch {
            url: feed.url.clone(),
            source,
        })?;

    if document.items.is_empty() {
        tracing::info!(feed = %feed.name, "No posts in {}", document.title);
    }

    let summary = ingest_document(&ctx.store, feed.id, &document)
        .await
        .map_err(|source| CycleError::Ingest {
            url: feed.url.clone(),
            source,
        })?;

    Ok(CycleReport {
        feed_name: feed.name,
        feed_url: feed.url,
        channel_title: document.title,
        summary,
    })
}

/// Run a cycle on every tick until `shutdown` resolves.
///
/// Shutdown is only observed between cycles; a cycle in progress always
/// finishes. Cycle errors are logged and the loop carries on.
pub async fn run_with_ticker<S, T, F>(ctx: &Context<S>, mut ticker: T, shutdown: F)
where
    S: FeedStore,
    T: Ticker,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!("Ingestion loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                match run_cycle(ctx, Utc::now()).await {
                    Ok(report) => tracing::info!(
                        feed = %report.feed_name,
                        url = %report.feed_url,
                        added = report.summary.added,
                        skipped = report.summary.skipped,
                        "{report}"
                    ),
                    Err(e) => tracing::warn!(error = %e, "Ingestion cycle failed"),
                }
            }
        }
    }
}

/// Parse `interval` and ingest one feed per interval until `shutdown` resolves.
///
/// The first cycle starts immediately.
///
/// # Errors
///
/// [`SchedulerError::InvalidInterval`] if `interval` is empty, malformed, or
/// not positive. The loop never starts in that case.
pub async fn run_ingestion_loop<S, F>(
    ctx: &Context<S>,
    interval: &str,
    shutdown: F,
) -> Result<(), SchedulerError>
where
    S: FeedStore,
    F: Future<Output = ()>,
{
    let period = parse_interval(interval).map_err(|source| SchedulerError::InvalidInterval {
        input: interval.to_string(),
        source,
    })?;

    tracing::info!(interval = ?period, "Ingestion loop started");
    run_with_ticker(ctx, IntervalTicker::new(period), shutdown).await;
    Ok(())
}
