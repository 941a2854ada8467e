use thiserror::Error;
use url::Url;

/// Errors that can occur while validating a feed URL.
#[derive(Error, Debug, PartialEq)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host to connect to.
    #[error("URL has no host")]
    MissingHost,
}

/// Validates a URL string for use as a feed source.
///
/// Only `http` and `https` URLs with a host are accepted. Loopback and
/// private addresses are allowed so self-hosted feeds can be followed.
///
/// # Examples
///
/// ```
/// use gator::util::validate_feed_url;
///
/// let url = validate_feed_url("https://example.com/feed.xml").unwrap();
/// assert_eq!(url.host_str(), Some("example.com"));
///
/// assert!(validate_feed_url("file:///etc/passwd").is_err());
/// assert!(validate_feed_url("not a url").is_err());
/// ```
pub fn validate_feed_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlValidationError::MissingHost),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_https_url() {
        let url = validate_feed_url("https://blog.boot.dev/index.xml").unwrap();
        assert_eq!(url.host_str(), Some("blog.boot.dev"));
        assert_eq!(url.path(), "/index.xml");
    }

    #[test]
    fn test_valid_http_url_with_port() {
        let url = validate_feed_url("http://example.com:8080/rss").unwrap();
        assert_eq!(url.port(), Some(8080));
    }

    #[test]
    fn test_surrounding_whitespace_trimmed() {
        assert!(validate_feed_url("  https://example.com/rss\n").is_ok());
    }

    #[test]
    fn test_local_hosts_allowed() {
        assert!(validate_feed_url("http://localhost:3000/feed").is_ok());
        assert!(validate_feed_url("http://127.0.0.1/feed").is_ok());
        assert!(validate_feed_url("http://192.168.1.10/rss").is_ok());
    }

    #[test]
    fn test_rejects_non_http_schemes() {
        assert_eq!(
            validate_feed_url("ftp://example.com/feed"),
            Err(UrlValidationError::UnsupportedScheme("ftp".into()))
        );
        assert!(matches!(
            validate_feed_url("file:///etc/passwd"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_rejects_unparseable() {
        assert!(matches!(
            validate_feed_url("example.com/rss"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
        assert!(matches!(
            validate_feed_url(""),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }
}
