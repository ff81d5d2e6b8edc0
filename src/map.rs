//! The scan facade.
//!
//! [`ClassMap::new`] resolves each configured locator into a container,
//! walks its files through the configured scanners, optionally expands the
//! supertype closure, and exposes query helpers over the resulting store.
//! A locator that fails to resolve is logged and skipped; a file that
//! fails to decode is logged and withheld from descriptor-driven
//! scanners; only configuration mistakes surface as errors.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::time::Instant;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ClassmapError, Result};
use crate::expand::{self, TypeResolver, VfsTypeResolver};
use crate::meta::{TypeMeta, CLASS_SUFFIX};
use crate::scanners::{index, FileInfo, SignaturesScanner};
use crate::store::Store;
use crate::vfs::{Container, Locator, VirtualFile};

/// An index of type relationships built by scanning compiled artifacts.
pub struct ClassMap {
    store: Store,
    config: Config,
}

impl ClassMap {
    /// Scan all configured locators and build the index.
    pub fn new(config: Config) -> Result<Self> {
        let map = ClassMap {
            store: Store::new(),
            config,
        };
        for scanner in &map.config.scanners {
            map.store.register_index(scanner.index());
        }
        map.scan()?;
        if map.config.expand_super_types {
            let resolver = VfsTypeResolver::new(
                &map.config.vfs,
                map.config.resolve_contexts(),
                map.config.adapter.clone(),
            );
            expand::expand_super_types(&map.store, &resolver);
        }
        Ok(map)
    }

    /// Convenience constructor: scan the given locators with the default
    /// configuration.
    pub fn scan_locators<I, L>(locators: I) -> Result<Self>
    where
        I: IntoIterator<Item = L>,
        L: Into<Locator>,
    {
        ClassMap::new(Config::new().locators(locators))
    }

    fn scan(&self) -> Result<()> {
        if self.config.locators.is_empty() {
            warn!("nothing to scan: no locators configured");
            return Ok(());
        }
        let started = Instant::now();
        match self.config.threads {
            None => {
                for locator in &self.config.locators {
                    self.scan_locator(locator);
                }
            }
            Some(threads) => {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build()?;
                pool.scope(|scope| {
                    for locator in &self.config.locators {
                        scope.spawn(move |_| self.scan_locator(locator));
                    }
                });
                // The pool is dropped here; after the scope every task has
                // finished and the store holds the complete result.
            }
        }
        let (keys, values) = self.store.counts();
        info!(
            locators = self.config.locators.len(),
            keys,
            values,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scan finished"
        );
        Ok(())
    }

    fn scan_locator(&self, locator: &Locator) {
        let container = match self.config.vfs.resolve(locator) {
            Ok(container) => container,
            Err(error) => {
                warn!(%locator, %error, "could not open locator, skipping");
                return;
            }
        };
        self.scan_container(container.as_ref());
    }

    fn scan_container(&self, container: &dyn Container) {
        let files = match container.files() {
            Ok(files) => files,
            Err(error) => {
                warn!(locator = container.locator(), %error, "could not enumerate container, skipping");
                return;
            }
        };
        for file in files {
            match file {
                Ok(file) => self.scan_file(container.locator(), file.as_ref()),
                Err(error) => {
                    debug!(locator = container.locator(), %error, "skipping unreadable entry");
                }
            }
        }
    }

    fn scan_file(&self, locator: &str, file: &dyn VirtualFile) {
        let path = file.relative_path();
        let logical = logical_name(path);
        if let Some(filter) = &self.config.input_filter {
            // Class files are matched by their dotted type name, everything
            // else by its relative path.
            let subject = if path.ends_with(CLASS_SUFFIX) {
                logical.as_str()
            } else {
                path
            };
            if !filter.test(subject) {
                return;
            }
        }
        let info = FileInfo {
            name: file.name(),
            path,
        };
        let mut meta: Option<TypeMeta> = None;
        let mut extraction_failed = false;
        for scanner in &self.config.scanners {
            if !scanner.accepts(path) {
                continue;
            }
            if scanner.uses_descriptor() {
                // An undecodable file only disables descriptor-driven
                // scanners; the rest still see it.
                if extraction_failed {
                    continue;
                }
                if meta.is_none() {
                    if !self.config.adapter.accepts(path) {
                        continue;
                    }
                    match self.extract(path, file) {
                        Ok(extracted) => meta = Some(extracted),
                        Err(error) => {
                            debug!(locator, path, %error, "could not extract metadata, skipping descriptor scanners");
                            extraction_failed = true;
                            continue;
                        }
                    }
                }
            }
            if let Err(error) = scanner.scan(&info, meta.as_ref(), &self.store) {
                debug!(locator, path, scanner = scanner.index(), %error, "scanner failed on file");
            }
        }
    }

    fn extract(&self, path: &str, file: &dyn VirtualFile) -> Result<TypeMeta> {
        let mut bytes = Vec::new();
        file.open()?
            .read_to_end(&mut bytes)
            .map_err(|source| ClassmapError::io(path, source))?;
        self.config
            .adapter
            .descriptor_of(path, &bytes)
            .map_err(|source| ClassmapError::extraction(path, source))
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    /// Direct subtypes of `type_name`.
    pub fn sub_types_of(&self, type_name: &str) -> Result<Vec<String>> {
        self.store.get(index::SUB_TYPES, [type_name])
    }

    /// All transitive subtypes of `type_name`.
    pub fn all_sub_types_of(&self, type_name: &str) -> Result<Vec<String>> {
        self.store.get_all(index::SUB_TYPES, [type_name])
    }

    /// All types carrying `tag`, plus the transitive subtypes of every
    /// tagged type and of every tag used as a meta-tag.
    pub fn types_tagged_with(&self, tag: &str) -> Result<Vec<String>> {
        let tagged = self.store.get(index::TYPE_TAGS, [tag])?;
        let through_tags = self.store.get_all_including(index::TYPE_TAGS, tagged)?;
        self.store.get_all_including(index::SUB_TYPES, through_tags)
    }

    /// Member keys carrying `tag` on a field, method, or parameter.
    pub fn members_tagged_with(&self, tag: &str) -> Result<Vec<String>> {
        self.store.get(index::MEMBER_TAGS, [tag])
    }

    /// Method keys whose parameter list matches `param_types` exactly.
    pub fn methods_with_signature(&self, param_types: &[&str]) -> Result<Vec<String>> {
        self.store
            .get(index::SIGNATURES, [SignaturesScanner::params_key(param_types)])
    }

    /// Method keys returning `type_name`.
    pub fn methods_returning(&self, type_name: &str) -> Result<Vec<String>> {
        self.store.get(index::SIGNATURES, [type_name])
    }

    /// Declared parameter names of the method with `method_key`, in
    /// declaration order. Empty when the artifact carried no debug tables.
    pub fn method_param_names(&self, method_key: &str) -> Result<Vec<String>> {
        let recorded = self.store.get(index::PARAM_NAMES, [method_key])?;
        Ok(match recorded.first() {
            Some(joined) => joined.split(", ").map(str::to_string).collect(),
            None => Vec::new(),
        })
    }

    /// Types whose constant pool references the member with `member_key`.
    pub fn member_usage(&self, member_key: &str) -> Result<Vec<String>> {
        self.store.get(index::MEMBER_USAGE, [member_key])
    }

    /// Relative paths of non-class resources whose base name matches the
    /// pattern.
    pub fn resources(&self, pattern: &Regex) -> Result<Vec<String>> {
        let names: Vec<String> = self
            .store
            .keys(index::RESOURCES)?
            .into_iter()
            .filter(|name| pattern.is_match(name))
            .collect();
        self.store.get(index::RESOURCES, names)
    }

    /// Every type recorded under the hierarchy root. Meaningful only when
    /// the subtype scanner was configured to keep `java.lang.Object`
    /// edges.
    pub fn all_types(&self) -> Result<Vec<String>> {
        self.store.get_all(index::SUB_TYPES, ["java.lang.Object"])
    }

    /// The underlying store, for direct index access.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Run closure expansion again with a caller-provided resolver.
    pub fn expand_super_types_with(&self, resolver: &dyn TypeResolver) {
        expand::expand_super_types(&self.store, resolver);
    }

    // ─── Merge and Persistence ───────────────────────────────────────────

    /// Fold another map's entries into this one.
    pub fn merge(&self, other: &ClassMap) {
        self.store.merge(other.store());
    }

    /// Write the store as a JSON snapshot.
    pub fn save<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, &self.store)?;
        Ok(())
    }

    /// Write the store as a JSON snapshot at `path`.
    pub fn save_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let display = path.to_string_lossy();
        let file = File::create(path).map_err(|source| ClassmapError::io(&display, source))?;
        self.save(BufWriter::new(file))
    }

    /// Rebuild a map from a JSON snapshot without scanning. Decode failures
    /// surface as merge errors labelled `<reader>`, since no path is known.
    pub fn collect<R: Read>(reader: R) -> Result<ClassMap> {
        ClassMap::decode(reader).map_err(|source| ClassmapError::merge("<reader>", source))
    }

    /// Rebuild a map from the JSON snapshot at `path`.
    pub fn collect_file(path: impl AsRef<Path>) -> Result<ClassMap> {
        let path = path.as_ref();
        let display = path.to_string_lossy();
        let file = File::open(path).map_err(|source| {
            ClassmapError::merge(&display, ClassmapError::io(&display, source))
        })?;
        ClassMap::decode(BufReader::new(file))
            .map_err(|source| ClassmapError::merge(&display, source))
    }

    fn decode<R: Read>(reader: R) -> Result<ClassMap> {
        let store: Store = serde_json::from_reader(reader)?;
        Ok(ClassMap {
            store,
            config: Config::new().expand_super_types(false),
        })
    }

    /// Read the snapshot at `path` into this map.
    pub fn collect_into(&self, path: impl AsRef<Path>) -> Result<()> {
        let other = ClassMap::collect_file(path)?;
        self.merge(&other);
        Ok(())
    }
}

impl std::fmt::Debug for ClassMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (keys, values) = self.store.counts();
        f.debug_struct("ClassMap")
            .field("indexes", &self.store.index_names())
            .field("keys", &keys)
            .field("values", &values)
            .finish()
    }
}

/// Dotted logical name of a container-relative path, with the class suffix
/// removed: `com/app/Service.class` becomes `com.app.Service`.
fn logical_name(path: &str) -> String {
    let trimmed = path.strip_suffix(CLASS_SUFFIX).unwrap_or(path);
    trimmed.replace('/', ".")
}
