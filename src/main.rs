use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use gator::commands::{self, Session, DEFAULT_BROWSE_LIMIT};
use gator::config::{self, Config};
use gator::storage::Database;

#[derive(Parser, Debug)]
#[command(name = "gator", about = "RSS aggregator that ingests followed feeds into SQLite")]
struct Args {
    /// Config file (defaults to ~/.config/gator/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a user and log in as them
    Register { name: String },
    /// Switch to an existing user
    Login { name: String },
    /// List all users
    Users,
    /// Delete every user, feed and post
    Reset,
    /// Fetch one feed every INTERVAL (e.g. 30s, 1m, 1h30m) until interrupted
    Agg { interval: String },
    /// Register a feed and follow it
    Addfeed { name: String, url: String },
    /// List all registered feeds
    Feeds,
    /// Follow an existing feed by URL
    Follow { url: String },
    /// List feeds the current user follows
    Following,
    /// Stop following a feed
    Unfollow { url: String },
    /// Show the newest posts from followed feeds
    Browse {
        #[arg(default_value_t = DEFAULT_BROWSE_LIMIT as u32)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_dir = config::config_dir()?;
    let config_path = args
        .config
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = config.resolve_db_path(&config_dir);
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = Database::open(db_path_str)
        .await
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;

    let mut session = Session::new(db, config, config_path);
    let mut out = std::io::stdout().lock();

    match args.command {
        Command::Register { name } => commands::register(&mut session, &name, &mut out).await,
        Command::Login { name } => commands::login(&mut session, &name, &mut out).await,
        Command::Users => commands::users(&session, &mut out).await,
        Command::Reset => commands::reset(&session, &mut out).await,
        Command::Agg { interval } => {
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
            };
            commands::agg(&session, &interval, shutdown, &mut out).await
        }
        Command::Addfeed { name, url } => commands::add_feed(&session, &name, &url, &mut out).await,
        Command::Feeds => commands::feeds(&session, &mut out).await,
        Command::Follow { url } => commands::follow(&session, &url, &mut out).await,
        Command::Following => commands::following(&session, &mut out).await,
        Command::Unfollow { url } => commands::unfollow(&session, &url, &mut out).await,
        Command::Browse { limit } => commands::browse(&session, i64::from(limit), &mut out).await,
    }
}
