//! Command handlers behind the `gator` subcommands.
//!
//! Each handler writes its human-readable output to `out` so the binary can
//! pass stdout and tests can pass a buffer.

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use thiserror::Error;

use crate::config::Config;
use crate::feed::Fetcher;
use crate::scheduler::{self, Context};
use crate::storage::{Database, Post, StoreError, User};
use crate::util::{parse_interval, validate_feed_url};

/// Default number of posts shown by `browse`
pub const DEFAULT_BROWSE_LIMIT: i64 = 2;

const PUBLISHED_FORMAT: &str = "%b %-d, %Y at %-I:%M %p";

/// Failures a user can act on, as opposed to internal errors.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("No user is logged in; run `gator login <name>` or `gator register <name>` first")]
    NotLoggedIn,

    #[error("User {0:?} does not exist")]
    UnknownUser(String),

    #[error("User {0:?} already exists")]
    UserExists(String),

    #[error("No feed registered with URL {0}")]
    UnknownFeed(String),

    #[error("A feed with URL {0} already exists")]
    FeedExists(String),

    #[error("{user} already follows {feed}")]
    AlreadyFollowing { user: String, feed: String },

    #[error("{user} does not follow {feed}")]
    NotFollowing { user: String, feed: String },
}

/// Shared state every handler runs against.
pub struct Session {
    pub db: Database,
    pub config: Config,
    pub config_path: PathBuf,
}

impl Session {
    pub fn new(db: Database, config: Config, config_path: PathBuf) -> Self {
        Self {
            db,
            config,
            config_path,
        }
    }

    /// The logged-in user, for commands that act on someone's behalf.
    pub async fn current_user(&self) -> Result<User> {
        let name = self
            .config
            .current_user_name
            .as_deref()
            .ok_or(CommandError::NotLoggedIn)?;

        match self.db.get_user_by_name(name).await {
            Ok(user) => Ok(user),
            Err(StoreError::NotFound(_)) => Err(CommandError::UnknownUser(name.to_string()).into()),
            Err(e) => Err(e).context("Failed to load current user"),
        }
    }

    fn set_user(&mut self, name: &str) -> Result<()> {
        self.config
            .set_user(name, &self.config_path)
            .with_context(|| format!("Failed to save config to {}", self.config_path.display()))
    }
}

// ============================================================================
// Accounts
// ============================================================================

pub async fn register(session: &mut Session, name: &str, out: &mut impl Write) -> Result<()> {
    let user = match session.db.create_user(name).await {
        Ok(user) => user,
        Err(e) if e.is_unique_violation() => {
            return Err(CommandError::UserExists(name.to_string()).into())
        }
        Err(e) => return Err(e).context("Failed to register user"),
    };
    session.set_user(&user.name)?;

    writeln!(out, "User was created successfully.")?;
    writeln!(
        out,
        "Id: {} created_at: {} name: {}",
        user.id,
        user.created_at.to_rfc3339(),
        user.name
    )?;
    Ok(())
}

pub async fn login(session: &mut Session, name: &str, out: &mut impl Write) -> Result<()> {
    match session.db.get_user_by_name(name).await {
        Ok(_) => {}
        Err(StoreError::NotFound(_)) => return Err(CommandError::UnknownUser(name.to_string()).into()),
        Err(e) => return Err(e).context("Failed to look up user"),
    }
    session.set_user(name)?;

    writeln!(out, "User has been set to {name}")?;
    Ok(())
}

pub async fn users(session: &Session, out: &mut impl Write) -> Result<()> {
    let names = session
        .db
        .list_user_names()
        .await
        .context("Failed to list users")?;
    let current = session.config.current_user_name.as_deref();

    for name in names {
        if Some(name.as_str()) == current {
            writeln!(out, "* {name} (current)")?;
        } else {
            writeln!(out, "* {name}")?;
        }
    }
    Ok(())
}

/// Delete every user, cascading to their feeds, follows and posts.
pub async fn reset(session: &Session, out: &mut impl Write) -> Result<()> {
    let removed = session
        .db
        .delete_all_users()
        .await
        .context("Failed to reset database")?;
    tracing::info!(users = removed, "Database reset");
    writeln!(out, "Database cleared successfully.")?;
    Ok(())
}

// ============================================================================
// Feeds and follows
// ============================================================================

/// Register a feed owned by the current user and follow it.
pub async fn add_feed(
    session: &Session,
    name: &str,
    url: &str,
    out: &mut impl Write,
) -> Result<()> {
    let user = session.current_user().await?;
    let url = url.trim();
    validate_feed_url(url).with_context(|| format!("Cannot add feed {url}"))?;

    let feed = match session.db.create_feed(name, url, user.id).await {
        Ok(feed) => feed,
        Err(e) if e.is_unique_violation() => {
            return Err(CommandError::FeedExists(url.to_string()).into())
        }
        Err(e) => return Err(e).context("Failed to create feed"),
    };
    let follow = session
        .db
        .create_feed_follow(user.id, feed.id)
        .await
        .context("Failed to follow new feed")?;

    writeln!(out, "Feed: {}", feed.name)?;
    writeln!(out, "URL: {}", feed.url)?;
    writeln!(out, "Followed by: {}", follow.user_name)?;
    Ok(())
}

pub async fn feeds(session: &Session, out: &mut impl Write) -> Result<()> {
    let feeds = session
        .db
        .list_feeds_with_owner()
        .await
        .context("Failed to list feeds")?;

    if feeds.is_empty() {
        writeln!(out, "No feeds registered yet.")?;
        return Ok(());
    }
    for feed in feeds {
        writeln!(out, "* {}", feed.name)?;
        writeln!(out, "  {}", feed.url)?;
        writeln!(out, "  added by {}", feed.owner_name)?;
    }
    Ok(())
}

pub async fn follow(session: &Session, url: &str, out: &mut impl Write) -> Result<()> {
    let user = session.current_user().await?;
    let feed = lookup_feed(&session.db, url).await?;

    let follow = match session.db.create_feed_follow(user.id, feed.id).await {
        Ok(follow) => follow,
        Err(e) if e.is_unique_violation() => {
            return Err(CommandError::AlreadyFollowing {
                user: user.name,
                feed: feed.name,
            }
            .into())
        }
        Err(e) => return Err(e).context("Failed to follow feed"),
    };

    writeln!(out, "{} now follows {}", follow.user_name, follow.feed_name)?;
    Ok(())
}

pub async fn following(session: &Session, out: &mut impl Write) -> Result<()> {
    let user = session.current_user().await?;
    let follows = session
        .db
        .feed_follows_for_user(user.id)
        .await
        .context("Failed to list follows")?;

    if follows.is_empty() {
        writeln!(out, "{} is not following any feeds", user.name)?;
        return Ok(());
    }
    writeln!(out, "Feeds followed by {}:", user.name)?;
    for follow in follows {
        writeln!(out, "* {}", follow.feed_name)?;
    }
    Ok(())
}

pub async fn unfollow(session: &Session, url: &str, out: &mut impl Write) -> Result<()> {
    let user = session.current_user().await?;
    let feed = lookup_feed(&session.db, url).await?;

    match session.db.delete_feed_follow(user.id, feed.id).await {
        Ok(()) => {}
        Err(StoreError::NotFound(_)) => {
            return Err(CommandError::NotFollowing {
                user: user.name,
                feed: feed.name,
            }
            .into())
        }
        Err(e) => return Err(e).context("Failed to unfollow feed"),
    }

    writeln!(out, "{} unfollowed {}", user.name, feed.name)?;
    Ok(())
}

async fn lookup_feed(db: &Database, url: &str) -> Result<crate::storage::Feed> {
    let url = url.trim();
    match db.get_feed_by_url(url).await {
        Ok(feed) => Ok(feed),
        Err(StoreError::NotFound(_)) => Err(CommandError::UnknownFeed(url.to_string()).into()),
        Err(e) => Err(e).context("Failed to look up feed"),
    }
}

// ============================================================================
// Posts
// ============================================================================

/// Show the newest posts from feeds the current user follows.
pub async fn browse(session: &Session, limit: i64, out: &mut impl Write) -> Result<()> {
    let user = session.current_user().await?;
    let posts = session
        .db
        .posts_for_user(user.id, limit)
        .await
        .context("Failed to load posts")?;

    if posts.is_empty() {
        writeln!(
            out,
            "No posts found. You might not be following any feeds, or the feeds don't have any posts yet."
        )?;
        return Ok(());
    }

    writeln!(out, "Showing {} most recent posts from your feeds:", posts.len())?;
    for post in &posts {
        writeln!(out)?;
        write_post(post, out)?;
    }
    Ok(())
}

fn write_post(post: &Post, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, " ** {} **", post.title.as_deref().unwrap_or("[No Title]"))?;
    writeln!(
        out,
        " ** Published: {}",
        post.published_at.format(PUBLISHED_FORMAT)
    )?;
    writeln!(out, " ~~~~~~~~~~")?;
    writeln!(
        out,
        " {}",
        post.description.as_deref().unwrap_or("[No Description]")
    )?;
    writeln!(out, " Link: {}", post.url)?;
    writeln!(out, " ~~~~~~~~~~")
}

// ============================================================================
// Aggregation
// ============================================================================

/// Ingest one feed per `interval` until `shutdown` resolves.
pub async fn agg<F>(session: &Session, interval: &str, shutdown: F, out: &mut impl Write) -> Result<()>
where
    F: Future<Output = ()>,
{
    parse_interval(interval).with_context(|| format!("Invalid interval {interval:?}"))?;

    let fetcher = Fetcher::new(&session.config.user_agent, session.config.request_timeout())
        .context("Failed to build HTTP client")?;
    let ctx = Context::new(session.db.clone(), fetcher);

    writeln!(out, "Collecting feeds every {}", interval.trim())?;
    out.flush()?;

    scheduler::run_ingestion_loop(&ctx, interval, shutdown).await?;
    Ok(())
}
