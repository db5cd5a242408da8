//! Durable per-source record of processed item ids.
//!
//! Each source gets one append-only text file, `<state_dir>/<source_id>.seen`,
//! with one id per line.  The file is read once into a [`HashSet`] the first
//! time a source is touched; after that, membership checks are in-memory and
//! [`SeenSet::record`] appends a single line and syncs it before returning.
//!
//! The file is never rewritten.  A line that can't be read back (bad UTF-8,
//! control characters, or a torn final line with no newline) is skipped with a
//! warning so one bad byte never stops the engine.  [`is_storable`] is the
//! same rule applied on the write side: an id it refuses would not survive a
//! reload.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::StoreError;
use crate::registry::SourceId;

/// Terminates a torn final line so it stays unreadable once a newline follows.
const TORN_MARK: char = '\u{7f}';

/// Whether `item_id` reads back unchanged from a seen-set file.
pub fn is_storable(item_id: &str) -> bool {
    !item_id.is_empty() && item_id.trim() == item_id && !item_id.chars().any(char::is_control)
}

/// The seen-set of a single source.
#[derive(Debug)]
pub struct SeenSet {
    path: PathBuf,
    ids: HashSet<String>,
    /// The file ends in a torn line; the next append must start a new one.
    needs_newline: bool,
}

impl SeenSet {
    /// Load the set stored at `path`.  A missing file is an empty set.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        let (ids, needs_newline) = parse_lines(&bytes, &path);
        debug!(path = %path.display(), count = ids.len(), "loaded seen-set");

        Ok(Self {
            path,
            ids,
            needs_newline,
        })
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.ids.contains(item_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Durably append `item_id`.
    ///
    /// Returns only after the line has been written with a single `write_all`
    /// and synced.  Recording an id that is already present is a no-op.
    pub fn record(&mut self, item_id: &str) -> Result<(), StoreError> {
        if !is_storable(item_id) {
            return Err(StoreError::InvalidId(item_id.to_string()));
        }
        if self.ids.contains(item_id) {
            return Ok(());
        }

        let mut line = String::with_capacity(item_id.len() + 3);
        if self.needs_newline {
            line.push(TORN_MARK);
            line.push('\n');
        }
        line.push_str(item_id);
        line.push('\n');

        self.append(line.as_bytes())
            .map_err(|source| StoreError::Io {
                path: self.path.clone(),
                source,
            })?;

        self.needs_newline = false;
        self.ids.insert(item_id.to_string());
        Ok(())
    }

    fn append(&self, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(bytes)?;
        file.sync_data()
    }
}

/// Split a seen-set file into ids, skipping anything malformed.
///
/// The second value is true when the file ends in an unterminated line.
fn parse_lines(bytes: &[u8], path: &Path) -> (HashSet<String>, bool) {
    let mut ids = HashSet::new();
    let torn = !bytes.is_empty() && !bytes.ends_with(b"\n");

    let mut lines: Vec<&[u8]> = bytes.split(|b| *b == b'\n').collect();
    // `split` yields a trailing empty slice after the final newline.
    let tail = lines.pop().unwrap_or_default();

    for (idx, raw) in lines.iter().enumerate() {
        let line_no = idx + 1;
        match std::str::from_utf8(raw) {
            Ok(line) => {
                let id = line.trim();
                if id.is_empty() {
                    continue;
                }
                if id.ends_with(TORN_MARK) {
                    debug!(path = %path.display(), line = line_no, "skipping torn seen-set line");
                    continue;
                }
                if id.chars().any(char::is_control) {
                    warn!(path = %path.display(), line = line_no, "skipping seen-set line with control characters");
                    continue;
                }
                ids.insert(id.to_string());
            }
            Err(_) => {
                warn!(path = %path.display(), line = line_no, "skipping seen-set line that is not valid UTF-8");
            }
        }
    }

    if torn {
        warn!(
            path = %path.display(),
            line = lines.len() + 1,
            bytes = tail.len(),
            "skipping unterminated final seen-set line"
        );
    }

    (ids, torn)
}

/// Every source's seen-set under one state directory, loaded lazily.
#[derive(Debug)]
pub struct SeenStore {
    dir: PathBuf,
    sets: HashMap<SourceId, SeenSet>,
}

impl SeenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            sets: HashMap::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Drop `source`'s cached set.  The file stays; a later load rereads it.
    pub fn forget(&mut self, source: &SourceId) {
        if self.sets.remove(source).is_some() {
            debug!(source = %source, "dropped cached seen-set");
        }
    }

    /// Number of sets currently held in memory.
    pub fn cached(&self) -> usize {
        self.sets.len()
    }

    /// Path of the file backing `source`'s set.
    pub fn path_for(&self, source: &SourceId) -> PathBuf {
        self.dir.join(format!("{source}.seen"))
    }

    /// The set for `source`, read from disk on first use.
    pub fn load(&mut self, source: &SourceId) -> Result<&mut SeenSet, StoreError> {
        let path = self.path_for(source);
        match self.sets.entry(source.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(SeenSet::open(path)?)),
        }
    }

    /// Whether `item_id` has been processed for `source`.
    ///
    /// A set that can't be read is logged and treated as empty; callers that
    /// need to tell the two apart use [`SeenStore::load`].
    pub fn contains(&mut self, source: &SourceId, item_id: &str) -> bool {
        match self.load(source) {
            Ok(set) => set.contains(item_id),
            Err(e) => {
                warn!(source = %source, error = %e, "seen-set unreadable");
                false
            }
        }
    }

    /// Durably mark `item_id` as processed for `source`.
    pub fn record(&mut self, source: &SourceId, item_id: &str) -> Result<(), StoreError> {
        self.load(source)?.record(item_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(s: &str) -> SourceId {
        SourceId::from_url(s)
    }

    #[test]
    fn unknown_source_is_empty_and_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SeenStore::new(dir.path().join("state"));
        let source = sid("https://example.com/a.rss");

        assert!(!store.contains(&source, "i1"));
        assert!(!store.path_for(&source).exists());
    }

    #[test]
    fn record_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let source = sid("https://example.com/a.rss");

        let mut store = SeenStore::new(dir.path());
        store.record(&source, "i1").unwrap();
        store.record(&source, "i2").unwrap();
        assert!(store.contains(&source, "i1"));

        let mut reopened = SeenStore::new(dir.path());
        assert!(reopened.contains(&source, "i1"));
        assert!(reopened.contains(&source, "i2"));
        assert!(!reopened.contains(&source, "i3"));
    }

    #[test]
    fn recording_twice_writes_one_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.seen");

        let mut set = SeenSet::open(&path).unwrap();
        set.record("i1").unwrap();
        set.record("i1").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "i1\n");
    }

    #[test]
    fn malformed_line_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.seen");
        let mut bytes = b"good-1\n".to_vec();
        bytes.extend_from_slice(&[0xff, 0xfe, b'x', b'\n']);
        bytes.extend_from_slice(b"bad\x07bell\n\ngood-2\n");
        fs::write(&path, bytes).unwrap();

        let set = SeenSet::open(&path).unwrap();

        assert_eq!(set.len(), 2);
        assert!(set.contains("good-1"));
        assert!(set.contains("good-2"));
    }

    #[test]
    fn torn_tail_is_skipped_and_not_glued_to_next_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.seen");
        fs::write(&path, "i1\nhalf-writ").unwrap();

        let mut set = SeenSet::open(&path).unwrap();
        assert!(set.contains("i1"));
        assert!(!set.contains("half-writ"));

        set.record("i2").unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "i1\nhalf-writ\u{7f}\ni2\n"
        );

        let reopened = SeenSet::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.contains("i1"));
        assert!(reopened.contains("i2"));
        assert!(!reopened.contains("half-writ"));
    }

    #[test]
    fn rejects_ids_that_would_not_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.seen");
        let mut set = SeenSet::open(&path).unwrap();

        for bad in ["a\nb", "a\rb", "tag:x\tpost-1", "bell\x07", " padded", ""] {
            assert!(
                matches!(set.record(bad), Err(StoreError::InvalidId(_))),
                "{bad:?}"
            );
        }
        assert!(set.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn every_recorded_id_is_seen_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.seen");
        let ids = ["tag:example.com,2024:post-1", "https://e.com/?p=1", "café ☕"];

        let mut set = SeenSet::open(&path).unwrap();
        for id in ids {
            set.record(id).unwrap();
        }

        let reopened = SeenSet::open(&path).unwrap();
        for id in ids {
            assert!(is_storable(id));
            assert!(reopened.contains(id), "{id:?}");
        }
    }

    #[test]
    fn forget_drops_cache_but_keeps_file() {
        let dir = tempfile::tempdir().unwrap();
        let source = sid("https://example.com/a.rss");
        let mut store = SeenStore::new(dir.path());
        store.record(&source, "i1").unwrap();
        assert_eq!(store.cached(), 1);

        store.forget(&source);

        assert_eq!(store.cached(), 0);
        assert!(store.path_for(&source).exists());
        assert!(store.contains(&source, "i1"));
    }

    #[test]
    fn unreadable_set_surfaces_from_load() {
        let dir = tempfile::tempdir().unwrap();
        let source = sid("https://example.com/a.rss");
        let mut store = SeenStore::new(dir.path());
        // A directory where the file should be can't be read as one.
        fs::create_dir_all(store.path_for(&source)).unwrap();

        assert!(store.load(&source).is_err());
        assert!(!store.contains(&source, "i1"));
    }
}
