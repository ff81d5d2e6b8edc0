//! The scanner contract.
//!
//! A scanner inspects one file at a time and appends entries to the store
//! under its own index. Scanners are identified by a stable index name, so
//! the index a scanner feeds and the index a query reads agree across
//! processes and snapshots. Descriptor-driven scanners receive a shared
//! [`TypeMeta`] that the orchestrator extracts at most once per file.

mod kinds;

pub use kinds::{
    MemberTagsScanner, MemberUsageScanner, ParamNamesScanner, ResourcesScanner,
    SignaturesScanner, SubTypesScanner, TypeElementsScanner, TypeTagsScanner,
};

use crate::error::Result;
use crate::filter::NameFilter;
use crate::meta::{TypeMeta, CLASS_SUFFIX};
use crate::store::Store;

/// Well-known index names fed by the built-in scanners.
pub mod index {
    pub const SUB_TYPES: &str = "SubTypes";
    pub const TYPE_TAGS: &str = "TypeTags";
    pub const MEMBER_TAGS: &str = "MemberTags";
    pub const SIGNATURES: &str = "Signatures";
    pub const PARAM_NAMES: &str = "ParamNames";
    pub const MEMBER_USAGE: &str = "MemberUsage";
    pub const RESOURCES: &str = "Resources";
    pub const TYPE_ELEMENTS: &str = "TypeElements";
}

/// Identity of one file under scan.
#[derive(Debug, Clone, Copy)]
pub struct FileInfo<'a> {
    /// Base name, e.g. `Service.class`.
    pub name: &'a str,
    /// Container-relative path with `/` separators.
    pub path: &'a str,
}

/// One indexing strategy.
pub trait Scanner: Send + Sync {
    /// Stable name of the index this scanner feeds.
    fn index(&self) -> &'static str;

    /// Whether the scanner wants this file at all, by path.
    fn accepts(&self, path: &str) -> bool {
        path.ends_with(CLASS_SUFFIX)
    }

    /// Whether the scanner consumes the extracted type descriptor. The
    /// orchestrator only decodes a file when at least one accepting
    /// scanner returns true here.
    fn uses_descriptor(&self) -> bool {
        true
    }

    /// Inspect one file and write entries to the store. `meta` is present
    /// for descriptor-driven scanners and shared across all scanners of
    /// the same file.
    fn scan(&self, file: &FileInfo<'_>, meta: Option<&TypeMeta>, store: &Store) -> Result<()>;
}

/// Shared keep-or-drop decision for scanner result keys.
pub(crate) fn accepts_result(filter: &Option<NameFilter>, key: &str) -> bool {
    filter.as_ref().map(|f| f.test(key)).unwrap_or(true)
}
