//! Scan configuration.
//!
//! A [`Config`] is built fluently and handed to [`crate::ClassMap::new`].
//! Defaults: subtype and type-tag scanners, sequential scanning, supertype
//! expansion enabled, and type resolution against the scanned locators.

use std::sync::Arc;

use crate::filter::NameFilter;
use crate::meta::{ClassFileAdapter, MetadataAdapter};
use crate::scanners::{Scanner, SubTypesScanner, TypeTagsScanner};
use crate::vfs::{Locator, Vfs};

pub struct Config {
    pub(crate) locators: Vec<Locator>,
    pub(crate) scanners: Vec<Box<dyn Scanner>>,
    pub(crate) input_filter: Option<NameFilter>,
    /// `Some(n)` scans locators on a pool of `n` workers; `None` scans
    /// sequentially on the calling thread.
    pub(crate) threads: Option<usize>,
    pub(crate) expand_super_types: bool,
    /// Locators consulted when resolving ancestors of scanned types.
    /// Empty means the scan locators themselves.
    pub(crate) resolve_contexts: Vec<Locator>,
    pub(crate) adapter: Arc<dyn MetadataAdapter>,
    pub(crate) vfs: Vfs,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            locators: Vec::new(),
            scanners: vec![Box::new(SubTypesScanner::new()), Box::new(TypeTagsScanner::new())],
            input_filter: None,
            threads: None,
            expand_super_types: true,
            resolve_contexts: Vec::new(),
            adapter: Arc::new(ClassFileAdapter),
            vfs: Vfs::new(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one source to scan.
    pub fn add_locator(mut self, locator: impl Into<Locator>) -> Self {
        self.locators.push(locator.into());
        self
    }

    /// Add several sources to scan.
    pub fn locators<I, L>(mut self, locators: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Locator>,
    {
        self.locators.extend(locators.into_iter().map(Into::into));
        self
    }

    /// Replace the scanner set.
    pub fn scanners(mut self, scanners: Vec<Box<dyn Scanner>>) -> Self {
        self.scanners = scanners;
        self
    }

    /// Add one scanner, replacing any configured scanner feeding the same
    /// index.
    pub fn add_scanner(mut self, scanner: Box<dyn Scanner>) -> Self {
        self.scanners.retain(|s| s.index() != scanner.index());
        self.scanners.push(scanner);
        self
    }

    /// Drop whole files before any scanner sees them. Class files are
    /// matched by their dotted type name, other files by relative path.
    pub fn filter_inputs(mut self, filter: NameFilter) -> Self {
        self.input_filter = Some(filter);
        self
    }

    /// Scan locators in parallel on `threads` workers.
    pub fn parallel(mut self, threads: usize) -> Self {
        self.threads = Some(threads.max(1));
        self
    }

    /// Scan locators one at a time on the calling thread.
    pub fn sequential(mut self) -> Self {
        self.threads = None;
        self
    }

    /// Enable or disable post-scan supertype closure expansion.
    pub fn expand_super_types(mut self, expand: bool) -> Self {
        self.expand_super_types = expand;
        self
    }

    /// Resolve ancestors of scanned types against these locators instead
    /// of the scan locators.
    pub fn resolve_from<I, L>(mut self, locators: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<Locator>,
    {
        self.resolve_contexts = locators.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the metadata adapter.
    pub fn adapter(mut self, adapter: Arc<dyn MetadataAdapter>) -> Self {
        self.adapter = adapter;
        self
    }

    /// Replace the resolver chain used to open locators.
    pub fn vfs(mut self, vfs: Vfs) -> Self {
        self.vfs = vfs;
        self
    }

    pub(crate) fn resolve_contexts(&self) -> &[Locator] {
        if self.resolve_contexts.is_empty() {
            &self.locators
        } else {
            &self.resolve_contexts
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("locators", &self.locators)
            .field(
                "scanners",
                &self.scanners.iter().map(|s| s.index()).collect::<Vec<_>>(),
            )
            .field("threads", &self.threads)
            .field("expand_super_types", &self.expand_super_types)
            .finish()
    }
}
