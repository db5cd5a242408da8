//! Error types for every engine component.
//!
//! Only [`ConfigError`] is fatal, and only at startup. Everything else is
//! scoped to one source or one item and is reported in the cycle summary.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Startup misconfiguration. Halts the process.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("source list {path} could not be loaded: {source}")]
    SourceList {
        path: PathBuf,
        #[source]
        source: RegistryError,
    },

    #[error("output directory {path} is not usable: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("state directory {path} is not usable: {source}")]
    StateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid feed URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("could not build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Failure loading the source-list file.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("source list {0} does not exist")]
    Missing(PathBuf),

    #[error("I/O error reading source list: {0}")]
    Io(#[from] io::Error),
}

/// A malformed source-list line. Recoverable: the line is skipped.
#[derive(Debug, Error)]
#[error("line {line}: {reason}")]
pub struct ParseError {
    pub line: usize,
    pub reason: String,
}

/// Fetching or parsing one source failed. Aborts only that source's poll.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unsupported URL scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("feed parse error: {0}")]
    Parse(String),
}

/// Sanitizing an item body failed. Never surfaces past the converter.
#[derive(Debug, Error)]
pub enum SanitizeError {
    #[error("markup could not be parsed: {0}")]
    Parse(String),
}

/// Building the packaged document bytes failed.
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Converting one item failed. The item is retried next cycle.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("packaging failed: {0}")]
    Package(#[from] PackageError),

    #[error("writing {path} failed: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Durable write or read of a seen-set failed.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("seen-set {path} I/O error: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("item id {0:?} contains a line break and cannot be stored")]
    InvalidId(String),
}
