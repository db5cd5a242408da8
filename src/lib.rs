//! rss2epub: watch feeds, package every new item as an EPUB.
//!
//! ## Architecture overview
//!
//! ```text
//! ┌────────────┐ snapshot ┌────────────┐  items   ┌────────────┐
//! │ registry   │ ───────► │ monitor    │ ───────► │ poll       │
//! │ (list file)│          │ (loop)     │          │ (1 source) │
//! └────────────┘          └────────────┘          └─────┬──────┘
//!                                                      │
//!                    ┌──────────────┬──────────────────┼─────────────┐
//!                    ▼              ▼                  ▼             ▼
//!              ┌──────────┐   ┌──────────┐      ┌───────────┐  ┌──────────┐
//!              │ source/  │   │ store    │      │ convert/  │  │ sanitize │
//!              │ (fetch)  │   │ (seen)   │      │ (package) │  │ (clean)  │
//!              └──────────┘   └──────────┘      └───────────┘  └──────────┘
//! ```
//!
//! * **`source/`**: the `FeedFetcher` trait, `FeedItem`, RSS/Atom parsing
//!   and the HTTP fetcher.
//! * **`store`**: append-only per-source record of processed item ids.
//! * **`sanitize`**: feed HTML down to a small XHTML subset.
//! * **`convert/`**: `Converter` and the EPUB packager.
//! * **`registry`**: source-list loading, diffing and change detection.
//! * **`poll`**: fetch → skip seen → convert → record, for one source.
//! * **`monitor`**: the INIT → RUNNING → STOPPED loop over all sources.

pub mod convert;
pub mod error;
pub mod monitor;
pub mod poll;
pub mod registry;
pub mod sanitize;
pub mod source;
pub mod store;

pub use convert::{Converter, EpubPackager};
pub use monitor::{Monitor, RunSummary, Schedule, Settings};
pub use registry::SourceRegistry;
pub use source::{FeedFetcher, FeedItem, FetchConfig, HttpFetcher};
pub use store::SeenStore;
