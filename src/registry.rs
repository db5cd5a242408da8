//! The list of monitored sources and its hot-reload bookkeeping.
//!
//! A [`Snapshot`] is an immutable, ordered list of [`Source`]s loaded from the
//! source-list file, plus the file's [`ListMarker`] at load time.  The
//! [`SourceRegistry`] swaps in a whole new snapshot when the marker moves,
//! so a cycle always sees one complete list.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use sha2::{Digest, Sha256};
use tracing::{info, warn};
use url::Url;

use crate::error::{ParseError, RegistryError};

/// Stable per-source identifier, derived from the URL.
///
/// Names the source's seen-set file and output subdirectory, so it has to
/// survive reloads and restarts unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(String);

impl SourceId {
    pub fn from_url(url: &str) -> Self {
        let digest = Sha256::digest(url.as_bytes());
        Self(hex::encode(&digest[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One monitored feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub url: String,
    pub id: SourceId,
}

impl Source {
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let id = SourceId::from_url(&url);
        Self { url, id }
    }
}

/// Modification marker of the source-list file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListMarker {
    pub modified: SystemTime,
    pub len: u64,
}

impl ListMarker {
    /// Current marker of `path`, or `None` if it can't be stat'ed.
    pub fn of(path: &Path) -> Option<Self> {
        let meta = path.metadata().ok()?;
        Some(Self {
            modified: meta.modified().ok()?,
            len: meta.len(),
        })
    }
}

/// Check whether a source URL is one the fetcher can handle.
pub fn parse_source_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" | "file" => Ok(url),
        other => Err(format!("unsupported scheme {other:?}")),
    }
}

/// A complete, immutable source list.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub sources: Vec<Source>,
    /// `None` for snapshots that don't come from a file.
    pub marker: Option<ListMarker>,
}

impl Snapshot {
    /// Load the source list at `path`.
    ///
    /// One URL per line; blank lines and `#` comments are ignored, malformed
    /// lines are skipped with a warning, and a repeated URL keeps its first
    /// position.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        // Marker first: an edit racing the read then shows up next tick.
        let marker = ListMarker::of(path);
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(RegistryError::Missing(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut sources = Vec::new();
        let mut seen = HashSet::new();
        for (idx, line) in text.lines().enumerate() {
            match parse_line(idx + 1, line) {
                Ok(Some(url)) => {
                    if seen.insert(url.to_string()) {
                        sources.push(Source::new(url));
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), "skipping source-list entry: {e}"),
            }
        }

        Ok(Self { sources, marker })
    }

    /// A one-source snapshot with no backing file.
    pub fn single(url: impl Into<String>) -> Self {
        Self {
            sources: vec![Source::new(url)],
            marker: None,
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// `Ok(None)` for blank and comment lines.
fn parse_line(line_no: usize, line: &str) -> Result<Option<&str>, ParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    parse_source_url(line)
        .map(|_| Some(line))
        .map_err(|reason| ParseError {
            line: line_no,
            reason: format!("{line:?}: {reason}"),
        })
}

/// Whether the file at `path` differs from `last`.
///
/// A file that can't be stat'ed (e.g. deleted) counts as unchanged, so the
/// last good snapshot stays in effect.
pub fn has_changed(path: &Path, last: Option<&ListMarker>) -> bool {
    match ListMarker::of(path) {
        Some(current) => last != Some(&current),
        None => false,
    }
}

/// Sources added and removed between two snapshots, by identifier.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    pub added: Vec<Source>,
    pub removed: Vec<Source>,
}

impl SnapshotDiff {
    pub fn between(old: &Snapshot, new: &Snapshot) -> Self {
        let old_ids: HashSet<&SourceId> = old.sources.iter().map(|s| &s.id).collect();
        let new_ids: HashSet<&SourceId> = new.sources.iter().map(|s| &s.id).collect();

        Self {
            added: new
                .sources
                .iter()
                .filter(|s| !old_ids.contains(&s.id))
                .cloned()
                .collect(),
            removed: old
                .sources
                .iter()
                .filter(|s| !new_ids.contains(&s.id))
                .cloned()
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// The current snapshot plus where it came from.
#[derive(Debug)]
pub struct SourceRegistry {
    path: Option<PathBuf>,
    snapshot: Snapshot,
}

impl SourceRegistry {
    /// Load the initial snapshot.  Failure here is fatal to the caller.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        let snapshot = Snapshot::load(&path)?;
        Ok(Self {
            path: Some(path),
            snapshot,
        })
    }

    /// A fixed registry of exactly one source.
    pub fn single(url: impl Into<String>) -> Self {
        Self {
            path: None,
            snapshot: Snapshot::single(url),
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Reload if the backing file changed.
    ///
    /// Returns the diff when a new snapshot was swapped in.  A failed reload
    /// keeps the previous snapshot.
    pub fn refresh(&mut self) -> Option<SnapshotDiff> {
        let path = self.path.as_deref()?;
        if !has_changed(path, self.snapshot.marker.as_ref()) {
            return None;
        }

        let next = match Snapshot::load(path) {
            Ok(next) => next,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "source list reload failed, keeping previous list");
                return None;
            }
        };

        let diff = SnapshotDiff::between(&self.snapshot, &next);
        for source in &diff.added {
            info!(source = %source.url, id = %source.id, "source added");
        }
        for source in &diff.removed {
            info!(source = %source.url, id = %source.id, "source removed");
        }
        info!(path = %path.display(), sources = next.len(), "source list reloaded");

        self.snapshot = next;
        Some(diff)
    }
}
