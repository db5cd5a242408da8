//! Atom 1.0 parsing, used when a body isn't RSS.

use chrono::Utc;

use super::FeedItem;
use crate::error::FetchError;

/// Parse raw bytes as an Atom feed.
pub fn parse(bytes: &[u8]) -> Result<Vec<FeedItem>, FetchError> {
    let feed = atom_syndication::Feed::read_from(bytes)
        .map_err(|e| FetchError::Parse(e.to_string()))?;
    Ok(parse_feed(&feed))
}

/// Convert an already-parsed feed, preserving entry order.
pub fn parse_feed(feed: &atom_syndication::Feed) -> Vec<FeedItem> {
    feed.entries()
        .iter()
        .map(|entry| {
            // rel="alternate" is the permalink; take the first link otherwise.
            let link = entry
                .links()
                .iter()
                .find(|l| l.rel() == "alternate")
                .or_else(|| entry.links().first())
                .map(|l| l.href());

            let body = entry
                .content()
                .and_then(|c| c.value())
                .or_else(|| entry.summary().map(|s| s.value.as_str()))
                .unwrap_or_default();

            let published = entry
                .published()
                .copied()
                .unwrap_or_else(|| *entry.updated())
                .with_timezone(&Utc);

            FeedItem::new(
                Some(entry.id()),
                Some(entry.title().value.as_str()),
                link,
                body,
            )
            .with_published(Some(published))
            .with_author(entry.authors().first().map(|p| p.name()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example</title>
  <id>urn:example:feed</id>
  <updated>2024-03-01T00:00:00Z</updated>
  <entry>
    <title>Atom One</title>
    <id>urn:example:1</id>
    <link rel="alternate" href="https://example.com/a1"/>
    <updated>2024-03-01T10:00:00Z</updated>
    <published>2024-02-28T09:00:00Z</published>
    <author><name>Bea</name></author>
    <summary>sum</summary>
    <content type="html">&lt;p&gt;body&lt;/p&gt;</content>
  </entry>
  <entry>
    <title>Atom Two</title>
    <id>urn:example:2</id>
    <updated>2024-03-02T10:00:00Z</updated>
    <summary>only summary</summary>
  </entry>
</feed>"#;

    #[test]
    fn parse_extracts_entries() {
        let items = parse(FEED.as_bytes()).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "urn:example:1");
        assert_eq!(items[0].title, "Atom One");
        assert_eq!(items[0].link.as_deref(), Some("https://example.com/a1"));
        assert_eq!(items[0].body, "<p>body</p>");
        assert_eq!(items[0].author.as_deref(), Some("Bea"));
        assert_eq!(
            items[0].published.map(|p| p.to_rfc3339()),
            Some("2024-02-28T09:00:00+00:00".to_string())
        );
    }

    #[test]
    fn summary_and_updated_are_fallbacks() {
        let items = parse(FEED.as_bytes()).unwrap();

        assert_eq!(items[1].body, "only summary");
        assert!(items[1].link.is_none());
        assert_eq!(
            items[1].published.map(|p| p.to_rfc3339()),
            Some("2024-03-02T10:00:00+00:00".to_string())
        );
    }
}
