//! RSS 2.0 parsing.
//!
//! Pure conversion from an [`rss::Channel`] to [`FeedItem`]s. The network side
//! lives in [`super::http`], so these functions can be tested on inline XML.

use chrono::{DateTime, Utc};

use super::FeedItem;
use crate::error::FetchError;

/// Parse raw bytes as an RSS channel.
pub fn parse(bytes: &[u8]) -> Result<Vec<FeedItem>, FetchError> {
    let channel =
        rss::Channel::read_from(bytes).map_err(|e| FetchError::Parse(e.to_string()))?;
    Ok(parse_channel(&channel))
}

/// Convert an already-parsed channel, preserving item order.
pub fn parse_channel(channel: &rss::Channel) -> Vec<FeedItem> {
    channel
        .items()
        .iter()
        .map(|item| {
            // Prefer <content:encoded>, fall back to <description>.
            let body = item
                .content()
                .or_else(|| item.description())
                .unwrap_or_default();

            // Parse RFC-2822 date; gracefully degrade to None on failure.
            let published = item
                .pub_date()
                .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())
                .map(|dt| dt.with_timezone(&Utc));

            let author = item.author().or_else(|| {
                item.dublin_core_ext()
                    .and_then(|dc| dc.creators().first())
                    .map(String::as_str)
            });

            FeedItem::new(
                item.guid().map(|g| g.value()),
                item.title(),
                item.link(),
                body,
            )
            .with_published(published)
            .with_author(author)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
