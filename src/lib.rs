//! gator: an RSS aggregator.
//!
//! Users follow feeds; a scheduler refreshes the least recently fetched feed
//! on every tick and stores new items as posts, skipping URLs it has already
//! seen.

pub mod commands;
pub mod config;
pub mod feed;
pub mod ingest;
pub mod scheduler;
pub mod storage;
pub mod util;
