//! In-memory [`FeedFetcher`] for poller and monitor tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{FeedFetcher, FeedItem};
use crate::error::FetchError;

#[derive(Default)]
pub struct FakeFetcher {
    feeds: Mutex<HashMap<String, Result<Vec<FeedItem>, String>>>,
    calls: Mutex<Vec<String>>,
    cancel_on_fetch: Mutex<Option<CancellationToken>>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `items` for `url` from now on.
    pub fn set(&self, url: &str, items: Vec<FeedItem>) {
        self.feeds.lock().unwrap().insert(url.to_string(), Ok(items));
    }

    /// Make every fetch of `url` fail.
    pub fn fail(&self, url: &str, reason: &str) {
        self.feeds
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(reason.to_string()));
    }

    /// Cancel `token` the first time any feed is fetched.
    pub fn cancel_on_fetch(&self, token: CancellationToken) {
        *self.cancel_on_fetch.lock().unwrap() = Some(token);
    }

    /// URLs fetched so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FeedFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(token) = self.cancel_on_fetch.lock().unwrap().take() {
            token.cancel();
        }

        match self.feeds.lock().unwrap().get(url) {
            Some(Ok(items)) => Ok(items.clone()),
            Some(Err(reason)) => Err(FetchError::Parse(reason.clone())),
            None => Err(FetchError::Parse(format!("no feed registered for {url}"))),
        }
    }
}

/// Shorthand constructor for tests.
pub fn item(id: &str) -> FeedItem {
    FeedItem::new(
        Some(id),
        Some(&format!("Post {id}")),
        Some(&format!("https://example.com/{id}")),
        format!("<p>Body of {id}</p>"),
    )
}
