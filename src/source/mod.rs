//! Feed fetching abstraction layer.
//!
//! This module defines the [`FeedFetcher`] trait and the common [`FeedItem`]
//! type.  The engine only talks to the trait; [`HttpFetcher`] is the real
//! implementation and tests substitute an in-memory one.
//!
//! ## For contributors: adding a feed format
//!
//! 1. Create a new file in this directory (e.g. `jsonfeed.rs`) with a
//!    `parse(bytes) -> Result<Vec<FeedItem>, FetchError>` function.
//! 2. Add it to the chain in [`parse_body`].
//!
//! The poller, the seen-set and the converter are all format-agnostic.

mod atom;
mod feed_item;
mod http;
mod rss;

#[cfg(test)]
pub mod fake;

pub use feed_item::FeedItem;
pub use http::{FetchConfig, HttpFetcher};

use async_trait::async_trait;

use crate::error::FetchError;

/// Something that can turn a source URL into its current items.
///
/// The poller calls [`fetch()`](FeedFetcher::fetch) once per source per
/// cycle.  Implementations must return items in feed order; the poller
/// converts them in that order.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch and parse the feed at `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>, FetchError>;
}

/// Parse a fetched body as RSS, falling back to Atom.
pub fn parse_body(bytes: &[u8]) -> Result<Vec<FeedItem>, FetchError> {
    match rss::parse(bytes) {
        Ok(items) => Ok(items),
        Err(rss_err) => atom::parse(bytes).map_err(|atom_err| {
            FetchError::Parse(format!("not RSS ({rss_err}) and not Atom ({atom_err})"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_body_accepts_both_formats() {
        let rss = br#"<rss version="2.0"><channel><title>t</title>
            <item><guid>r1</guid></item></channel></rss>"#;
        let atom = br#"<feed xmlns="http://www.w3.org/2005/Atom"><title>t</title>
            <id>f</id><updated>2024-01-01T00:00:00Z</updated>
            <entry><title>a</title><id>a1</id><updated>2024-01-01T00:00:00Z</updated></entry>
            </feed>"#;

        assert_eq!(parse_body(rss).unwrap()[0].id, "r1");
        assert_eq!(parse_body(atom).unwrap()[0].id, "a1");
    }

    #[test]
    fn parse_body_reports_both_failures() {
        let err = parse_body(b"<html><body>nope</body></html>").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("not RSS"), "{msg}");
        assert!(msg.contains("not Atom"), "{msg}");
    }
}
