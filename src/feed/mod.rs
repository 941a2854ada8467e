//! Retrieval and decoding of RSS feeds.
//!
//! - [`fetcher`] - HTTP GET with a client-agent header, timeout and size cap
//! - [`parser`] - Minimal RSS 2.0 decoding with HTML-entity unescaping
//! - [`date`] - Normalization of publish dates across common layouts
//!
//! # Example
//!
//! ```ignore
//! use gator::feed::{parse_date, Fetcher, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
//!
//! let fetcher = Fetcher::new(DEFAULT_USER_AGENT, DEFAULT_TIMEOUT)?;
//! let document = fetcher.fetch("https://blog.example.com/index.xml").await?;
//! for item in &document.items {
//!     let published = parse_date(&item.pub_date)?;
//! }
//! ```

mod date;
mod fetcher;
mod parser;

pub use date::{parse_date, DateLayout, DateParseError, LayoutError, LAYOUTS};
pub use fetcher::{FetchError, Fetcher, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
pub use parser::{parse_feed, DecodeError, RawFeedDocument, RawItem};
