//! Virtual file system over scan sources.
//!
//! A [`Locator`] names a source of compiled artifacts: a directory tree, an
//! archive on disk, an archive embedded in another archive, or an archive
//! that can only be read as a forward stream. Resolvers turn locators into
//! [`Container`]s, which enumerate [`VirtualFile`]s with a name, a relative
//! path, and a content stream opened on demand.
//!
//! Resolution walks an ordered resolver list; the first resolver that both
//! matches the locator and opens it successfully wins, and a resolver that
//! matches but fails to open is logged and skipped so the next one can try.

pub mod dir;
pub mod stream;
pub mod zip;

use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{ClassmapError, Result};

/// Archive suffixes recognized by the default resolvers.
const ARCHIVE_SUFFIXES: [&str; 4] = [".jar", ".zip", ".war", ".ear"];

/// A name for a source of compiled artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator(String);

impl Locator {
    pub fn new(spec: impl Into<String>) -> Self {
        Locator(spec.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// Whether the locator carries an archive suffix.
    pub fn is_archive(&self) -> bool {
        ARCHIVE_SUFFIXES.iter().any(|s| self.0.ends_with(s))
    }

    /// Split a nested-archive locator of the form `outer.jar!/inner` into
    /// the outer archive locator and the inner path.
    pub fn embedded_split(&self) -> Option<(Locator, String)> {
        for suffix in ARCHIVE_SUFFIXES {
            let marker = format!("{suffix}!/");
            if let Some(at) = self.0.find(&marker) {
                let outer = &self.0[..at + suffix.len()];
                let inner = &self.0[at + marker.len()..];
                return Some((Locator::new(outer), inner.to_string()));
            }
        }
        None
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Locator {
    fn from(s: &str) -> Self {
        Locator::new(s)
    }
}

impl From<&Path> for Locator {
    fn from(p: &Path) -> Self {
        Locator::new(p.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for Locator {
    fn from(p: PathBuf) -> Self {
        Locator::new(p.to_string_lossy().into_owned())
    }
}

/// One file inside a container. The content stream is opened lazily and at
/// most once per file instance; dropping the reader releases it.
pub trait VirtualFile {
    /// Base name, e.g. `Service.class`.
    fn name(&self) -> &str;

    /// Path relative to the container root, with `/` separators.
    fn relative_path(&self) -> &str;

    /// Open the content stream.
    fn open(&self) -> Result<Box<dyn Read + '_>>;
}

/// An opened scan source. Enumeration is restartable: every call to
/// [`Container::files`] starts a fresh pass in the container's natural
/// order.
pub trait Container {
    /// Display form of the locator this container was opened from.
    fn locator(&self) -> &str;

    /// Enumerate the container's files. Per-entry failures are yielded as
    /// errors without ending the iteration.
    fn files(&self) -> Result<FileIter<'_>>;
}

/// Boxed file iterator returned by containers.
pub type FileIter<'a> = Box<dyn Iterator<Item = Result<Box<dyn VirtualFile + 'a>>> + 'a>;

/// A strategy for opening one kind of locator.
pub trait Resolver: Send + Sync {
    /// Cheap check whether this resolver can handle the locator.
    fn matches(&self, locator: &Locator) -> bool;

    /// Open the locator into a container.
    fn open(&self, locator: &Locator) -> Result<Box<dyn Container>>;
}

/// An ordered resolver chain. Each instance owns its list, so callers can
/// prepend custom resolvers without affecting other instances.
pub struct Vfs {
    resolvers: Vec<Box<dyn Resolver>>,
}

impl Default for Vfs {
    fn default() -> Self {
        Vfs {
            resolvers: vec![
                Box::new(zip::EmbeddedResolver),
                Box::new(dir::DirResolver),
                Box::new(zip::ArchiveResolver),
                Box::new(stream::StreamResolver),
            ],
        }
    }
}

impl Vfs {
    pub fn new() -> Self {
        Self::default()
    }

    /// A chain with exactly the given resolvers, tried in order.
    pub fn with_resolvers(resolvers: Vec<Box<dyn Resolver>>) -> Self {
        Vfs { resolvers }
    }

    /// Insert a resolver ahead of the existing chain.
    pub fn prepend(&mut self, resolver: Box<dyn Resolver>) {
        self.resolvers.insert(0, resolver);
    }

    /// Resolve a locator into a container via the first resolver that
    /// matches and opens it.
    pub fn resolve(&self, locator: &Locator) -> Result<Box<dyn Container>> {
        for resolver in &self.resolvers {
            if !resolver.matches(locator) {
                continue;
            }
            match resolver.open(locator) {
                Ok(container) => return Ok(container),
                Err(error) => {
                    warn!(%locator, %error, "resolver matched but failed to open, trying next");
                }
            }
        }
        Err(ClassmapError::Resolution {
            locator: locator.to_string(),
        })
    }
}

impl fmt::Debug for Vfs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vfs")
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}
