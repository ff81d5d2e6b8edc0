//! # classmap
//!
//! Scan compiled Java artifacts and query type relationships.
//!
//! classmap walks directories, archives, nested archives, and archive
//! streams, feeds each file through a set of pluggable scanners, and
//! builds an in-memory multi-index of what it found: supertype edges,
//! annotation tags, member signatures, usage references, and resources.
//! Queries answer transitively, so asking for the subtypes of a type
//! returns its whole recorded hierarchy.
//!
//! ## Key Features
//!
//! - **Multi-index store**: one concurrent store, one index per scanner
//! - **Transitive queries**: closures over supertype and tag edges
//! - **Pluggable sources**: directories, zip archives, `outer.jar!/inner`
//!   nesting, forward-only archive streams
//! - **Closure repair**: ancestors outside the scanned set are resolved
//!   and stitched in after the scan
//! - **Persistent**: the store round-trips through JSON snapshots
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use classmap::{ClassMap, Config, SubTypesScanner, TypeTagsScanner};
//!
//! let map = ClassMap::new(
//!     Config::new()
//!         .add_locator("target/classes")
//!         .add_locator("lib/app.jar")
//!         .scanners(vec![
//!             Box::new(SubTypesScanner::new()),
//!             Box::new(TypeTagsScanner::new()),
//!         ])
//!         .parallel(4),
//! )?;
//!
//! for sub in map.sub_types_of("com.app.Repository")? {
//!     println!("{sub}");
//! }
//! # Ok::<(), classmap::ClassmapError>(())
//! ```

pub mod config;
pub mod error;
pub mod expand;
pub mod filter;
pub mod map;
pub mod meta;
pub mod scanners;
pub mod store;
pub mod vfs;

// Re-exports for convenience
pub use error::{ClassmapError, Result};

pub use config::Config;
pub use expand::{TypeResolver, VfsTypeResolver};
pub use filter::NameFilter;
pub use map::ClassMap;
pub use meta::{ClassFileAdapter, FieldMeta, MemberRef, MetadataAdapter, MethodMeta, TypeMeta};
pub use scanners::{
    index, FileInfo, MemberTagsScanner, MemberUsageScanner, ParamNamesScanner, ResourcesScanner,
    Scanner, SignaturesScanner, SubTypesScanner, TypeElementsScanner, TypeTagsScanner,
};
pub use store::Store;
pub use vfs::{Container, Locator, Resolver, VirtualFile, Vfs};
