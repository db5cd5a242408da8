//! Item conversion: sanitize, package, write.
//!
//! [`Converter::convert`] is the only entry point the poller uses.  The
//! packaging format sits behind [`Packager`]; [`EpubPackager`] is the one the
//! binary ships with.

mod epub;

pub use epub::EpubPackager;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{ConvertError, PackageError, SanitizeError};
use crate::sanitize;
use crate::source::FeedItem;

/// Everything a packager needs to build one document.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub title: String,
    /// Well-formed XHTML fragment.
    pub body: String,
    pub link: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub author: Option<String>,
    pub language: String,
}

/// Turns a [`Document`] into the bytes of one output file.
pub trait Packager: Send + Sync {
    /// File extension, without the dot.
    fn extension(&self) -> &str;

    fn package(&self, doc: &Document) -> Result<Vec<u8>, PackageError>;
}

/// Reduces a raw item body to an XHTML fragment.
pub type Sanitizer = fn(&str) -> Result<String, SanitizeError>;

pub struct Converter {
    packager: Box<dyn Packager>,
    sanitizer: Sanitizer,
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(EpubPackager)
    }
}

impl Converter {
    pub fn new(packager: impl Packager + 'static) -> Self {
        Self {
            packager: Box::new(packager),
            sanitizer: sanitize::clean,
        }
    }

    /// Replace the body sanitizer, [`sanitize::clean`] by default.
    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    /// Where `item_id`'s document lands inside `output_dir`.
    ///
    /// Depends on the id alone, so reconverting an item overwrites it.
    pub fn output_path(&self, item_id: &str, output_dir: &Path) -> PathBuf {
        let digest = Sha256::digest(item_id.as_bytes());
        let hash = hex::encode(digest);
        output_dir.join(format!("{}.{}", &hash[..16], self.packager.extension()))
    }

    /// Convert `item` and write it under `output_dir`.
    pub fn convert(&self, item: &FeedItem, output_dir: &Path) -> Result<PathBuf, ConvertError> {
        let doc = self.document_for(item);
        let bytes = self.packager.package(&doc)?;

        let path = self.output_path(&item.id, output_dir);
        write_atomic(&path, &bytes).map_err(|source| ConvertError::Write {
            path: path.clone(),
            source,
        })?;

        debug!(item = %item.id, path = %path.display(), bytes = bytes.len(), "wrote document");
        Ok(path)
    }

    /// Build the packager input, degrading to escaped raw text if cleaning
    /// fails.
    pub fn document_for(&self, item: &FeedItem) -> Document {
        let cleaned = match (self.sanitizer)(&item.body) {
            Ok(body) => body,
            Err(e) => {
                warn!(item = %item.id, error = %e, "sanitizing failed, using raw body");
                sanitize::plain_paragraph(&item.body)
            }
        };

        let mut body = String::new();
        if let Some(meta) = metadata_line(item) {
            body.push_str(&meta);
        }
        body.push_str(&cleaned);

        Document {
            id: item.id.clone(),
            title: item.title.clone(),
            body,
            link: item.link.clone(),
            published: item.published,
            author: item.author.clone(),
            language: "en".to_string(),
        }
    }
}

fn metadata_line(item: &FeedItem) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(published) = item.published {
        parts.push(published.format("%Y-%m-%d %H:%M UTC").to_string());
    }
    if let Some(link) = &item.link {
        let link = quick_xml::escape::escape(link.as_str());
        parts.push(format!("<a href=\"{link}\">{link}</a>"));
    }
    if parts.is_empty() {
        return None;
    }
    Some(format!("<p class=\"meta\">{}</p>", parts.join(" · ")))
}

/// Write through a temp file in the same directory, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
