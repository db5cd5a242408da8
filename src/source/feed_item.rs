//! The item type shared by every feed format.
//!
//! `FeedItem` is one entry from a source, normalised from RSS or Atom.  The
//! rest of the engine (de-duplication, conversion) never looks at the native
//! feed types.
//!
//! ## Identifiers
//!
//! `id` is what the seen-set records, so it has to be stable across fetches.
//! Sources provide one (RSS `<guid>`, Atom `<id>`) most of the time; when they
//! don't, [`FeedItem::derive_id`] hashes title and link instead.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Title used when the feed entry has none.
pub const UNTITLED: &str = "Untitled";

/// A single feed entry, normalised from any feed format.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FeedItem {
    /// Stable unique identifier used for de-duplication.
    pub id: String,

    /// Human-readable headline.
    pub title: String,

    /// URL of the full content on the web.
    pub link: Option<String>,

    /// Publication timestamp, if the feed gave a parseable one.
    pub published: Option<DateTime<Utc>>,

    /// Author name, if any.
    pub author: Option<String>,

    /// Raw markup body (full content when available, summary otherwise).
    pub body: String,
}

impl FeedItem {
    /// Build an item, deriving its id from `native_id` or title + link.
    pub fn new(
        native_id: Option<&str>,
        title: Option<&str>,
        link: Option<&str>,
        body: impl Into<String>,
    ) -> Self {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(UNTITLED)
            .to_string();
        let link = link.map(str::trim).filter(|l| !l.is_empty()).map(String::from);
        let id = Self::derive_id(native_id, &title, link.as_deref());

        Self {
            id,
            title,
            link,
            published: None,
            author: None,
            body: body.into(),
        }
    }

    pub fn with_published(mut self, published: Option<DateTime<Utc>>) -> Self {
        self.published = published;
        self
    }

    pub fn with_author(mut self, author: Option<&str>) -> Self {
        self.author = author
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(String::from);
        self
    }

    /// Compute the stable identifier for an entry.
    ///
    /// The native id wins when present. Ids with control characters (line
    /// breaks, tabs) can't be stored one per line, so they are replaced by
    /// their own hash.
    pub fn derive_id(native_id: Option<&str>, title: &str, link: Option<&str>) -> String {
        match native_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) if id.chars().any(char::is_control) => hash_hex(id),
            Some(id) => id.to_string(),
            None => hash_hex(&format!("{title}\n{}", link.unwrap_or_default())),
        }
    }
}

/// First 32 hex characters of the SHA-256 of `input`.
fn hash_hex(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..16])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_id_is_kept_trimmed() {
        let item = FeedItem::new(Some("  guid-1 \n"), Some("T"), None, "");
        assert_eq!(item.id, "guid-1");
    }

    #[test]
    fn missing_id_hashes_title_and_link() {
        let a = FeedItem::new(None, Some("Post"), Some("https://example.com/p"), "");
        let b = FeedItem::new(Some("   "), Some("Post"), Some("https://example.com/p"), "x");
        let c = FeedItem::new(None, Some("Post"), Some("https://example.com/q"), "");

        assert_eq!(a.id, b.id, "blank native id falls back the same way");
        assert_ne!(a.id, c.id);
        assert_eq!(a.id.len(), 32);
    }

    #[test]
    fn multiline_native_id_is_hashed() {
        let item = FeedItem::new(Some("tag:a\ntag:b"), Some("T"), None, "");
        assert!(!item.id.contains('\n'));
        assert_eq!(item.id.len(), 32);
    }

    #[test]
    fn native_id_with_tab_is_hashed_and_storable() {
        let item = FeedItem::new(Some("tag:x\tpost-1"), Some("T"), None, "");
        assert_eq!(item.id.len(), 32);
        assert!(crate::store::is_storable(&item.id));

        let again = FeedItem::new(Some("tag:x\tpost-1"), Some("Retitled"), None, "");
        assert_eq!(item.id, again.id);
    }

    #[test]
    fn missing_title_defaults_to_untitled() {
        let item = FeedItem::new(Some("g"), None, None, "");
        assert_eq!(item.title, UNTITLED);

        let blank = FeedItem::new(Some("g"), Some(" "), None, "");
        assert_eq!(blank.title, UNTITLED);
    }

    #[test]
    fn blank_author_is_none() {
        let item = FeedItem::new(Some("g"), None, None, "").with_author(Some("  "));
        assert!(item.author.is_none());
    }
}
