//! Polling one source.
//!
//! [`poll`] fetches a source, skips items its seen-set already holds, converts
//! the rest in feed order, and records each id only after its document has
//! been written.  Nothing here is fatal: a failed fetch ends this source's poll
//! for the cycle, a failed item is left unrecorded so the next cycle retries it.
//!
//! ## For contributors
//!
//! The order "convert, then record" is what makes reruns safe.  If the
//! process dies between the two, the item is converted again next time and
//! overwrites the same file.  Don't swap them.

use std::fmt;
use std::path::Path;

use tracing::{debug, error, info, warn};

use crate::convert::Converter;
use crate::error::{ConvertError, FetchError, StoreError};
use crate::registry::Source;
use crate::source::FeedFetcher;
use crate::store::SeenStore;

/// What went wrong during one poll.
#[derive(Debug)]
pub enum PollError {
    Fetch(FetchError),
    /// The seen-set couldn't be read; nothing was converted.
    StoreLoad(StoreError),
    Convert { item: String, error: ConvertError },
    /// The document was written but its id wasn't recorded; it will be redone.
    Record { item: String, error: StoreError },
}

impl fmt::Display for PollError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(e) => write!(f, "fetch failed: {e}"),
            Self::StoreLoad(e) => write!(f, "seen-set unavailable: {e}"),
            Self::Convert { item, error } => write!(f, "item {item}: {error}"),
            Self::Record { item, error } => write!(f, "item {item} not recorded: {error}"),
        }
    }
}

/// Outcome of polling one source.
#[derive(Debug, Default)]
pub struct PollReport {
    /// Items fetched this time.
    pub fetched: usize,
    /// Items converted and recorded.
    pub new_count: usize,
    /// Items skipped because they were already recorded.
    pub seen_count: usize,
    pub errors: Vec<PollError>,
}

impl PollReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Poll `source` once, writing new documents into `output_dir`.
pub async fn poll(
    source: &Source,
    fetcher: &dyn FeedFetcher,
    store: &mut SeenStore,
    converter: &Converter,
    output_dir: &Path,
) -> PollReport {
    let mut report = PollReport::default();

    debug!(source = %source.url, "fetching");
    let items = match fetcher.fetch(&source.url).await {
        Ok(items) => items,
        Err(e) => {
            warn!(source = %source.url, error = %e, "fetch failed, skipping source this cycle");
            report.errors.push(PollError::Fetch(e));
            return report;
        }
    };
    report.fetched = items.len();
    info!(source = %source.url, entries = items.len(), "fetched feed");

    let seen = match store.load(&source.id) {
        Ok(seen) => seen,
        Err(e) => {
            error!(source = %source.url, error = %e, "cannot read seen-set, skipping source this cycle");
            report.errors.push(PollError::StoreLoad(e));
            return report;
        }
    };

    for item in &items {
        if seen.contains(&item.id) {
            debug!(source = %source.url, item = %item.id, title = %item.title, "already processed");
            report.seen_count += 1;
            continue;
        }

        info!(source = %source.url, item = %item.id, title = %item.title, "processing new item");
        let path = match converter.convert(item, output_dir) {
            Ok(path) => path,
            Err(e) => {
                warn!(source = %source.url, item = %item.id, error = %e, "conversion failed, will retry next cycle");
                report.errors.push(PollError::Convert {
                    item: item.id.clone(),
                    error: e,
                });
                continue;
            }
        };

        if let Err(e) = seen.record(&item.id) {
            error!(
                source = %source.url,
                item = %item.id,
                path = %path.display(),
                error = %e,
                "document written but id NOT recorded, it will be converted again"
            );
            report.errors.push(PollError::Record {
                item: item.id.clone(),
                error: e,
            });
            continue;
        }

        info!(source = %source.url, item = %item.id, path = %path.display(), "created document");
        report.new_count += 1;
    }

    report
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
