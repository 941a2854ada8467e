//! Input validation shared by the command layer and the scheduler.
//!
//! - **Intervals**: `"30s"`, `"1h30m"` style polling periods
//! - **Feed URLs**: http(s) checks before a feed is registered
//!
//! # Examples
//!
//! ```
//! use gator::util::{parse_interval, validate_feed_url};
//! use std::time::Duration;
//!
//! assert_eq!(parse_interval("1m").unwrap(), Duration::from_secs(60));
//! assert!(validate_feed_url("https://example.com/feed.xml").is_ok());
//! ```

mod duration;
mod url_validator;

pub use duration::{parse_interval, IntervalError};
pub use url_validator::{validate_feed_url, UrlValidationError};
