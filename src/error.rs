//! Error types for classmap.
//!
//! Every variant carries the offending locator, path, or index name so a
//! failure can be traced back to the artifact that produced it. Errors are
//! never used for ordinary control flow: per-file problems are logged and
//! skipped by the scan orchestrator, and only configuration mistakes or
//! snapshot merges surface to the caller.

use crate::meta::classfile::ClassParseError;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ClassmapError>;

/// All errors produced by classmap.
#[derive(Debug, Error)]
pub enum ClassmapError {
    /// No resolver strategy matched a source locator. Fatal to that locator
    /// only; the scan continues with the remaining locators.
    #[error("could not resolve a container from locator `{locator}`: no matching resolver")]
    Resolution { locator: String },

    /// The metadata adapter or a scanner failed on a single file.
    #[error("could not extract metadata from `{path}`")]
    Extraction {
        path: String,
        #[source]
        source: Box<ClassmapError>,
    },

    /// A query named an index whose producing scanner was never registered.
    /// Raised instead of returning an empty result so misconfiguration is
    /// visible at the query site.
    #[error("index `{index}` was not configured; register its scanner before querying")]
    Configuration { index: String },

    /// Reading or decoding a persisted snapshot failed during collect/merge.
    #[error("could not merge snapshot `{path}`")]
    Merge {
        path: String,
        #[source]
        source: Box<ClassmapError>,
    },

    /// An I/O failure at a known path.
    #[error("I/O error at `{path}`")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A zip archive could not be opened or enumerated.
    #[error("archive error at `{path}`")]
    Archive {
        path: String,
        #[source]
        source: zip::result::ZipError,
    },

    /// An entry of a streamed archive cannot be read sequentially, e.g.
    /// its sizes are deferred to a trailing data descriptor.
    #[error("unsupported streamed archive entry `{entry}` in `{path}`: {reason}")]
    Stream {
        path: String,
        entry: String,
        reason: String,
    },

    /// A class file failed to parse.
    #[error("malformed class file `{path}`")]
    ClassParse {
        path: String,
        #[source]
        source: ClassParseError,
    },

    /// An invalid regular expression was given to a name filter.
    #[error("invalid filter pattern `{pattern}`")]
    Filter {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A snapshot document could not be serialized or deserialized.
    #[error("invalid snapshot document")]
    Snapshot(#[from] serde_json::Error),

    /// The parallel scan pool could not be constructed.
    #[error("could not build the scan thread pool")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl ClassmapError {
    /// Wrap an error as a per-file extraction failure at `path`.
    pub(crate) fn extraction(path: &str, source: ClassmapError) -> Self {
        ClassmapError::Extraction {
            path: path.to_string(),
            source: Box::new(source),
        }
    }

    /// Wrap an error as a snapshot merge failure at `path`.
    pub(crate) fn merge(path: &str, source: ClassmapError) -> Self {
        ClassmapError::Merge {
            path: path.to_string(),
            source: Box::new(source),
        }
    }

    pub(crate) fn io(path: &str, source: std::io::Error) -> Self {
        ClassmapError::Io {
            path: path.to_string(),
            source,
        }
    }
}
