//! Supertype closure expansion.
//!
//! A scan only records edges for types it actually read, so a hierarchy
//! whose intermediate classes live outside the scanned locators ends up
//! with gaps. Expansion repairs them: for every top-level key of the
//! subtype index (a key that is nobody's value), the ancestor chain is
//! resolved out of band and the missing `ancestor -> key` edges are
//! inserted, recursing upward until an ancestor is already known or can no
//! longer be resolved.

use std::collections::HashSet;
use std::io::Read;
use std::sync::Arc;

use tracing::debug;

use crate::meta::MetadataAdapter;
use crate::scanners::index;
use crate::store::Store;
use crate::vfs::{Locator, Vfs};

/// Resolves the direct supertypes of a named type from outside the scanned
/// set. Returning `None` ends the ancestor chain at that type.
pub trait TypeResolver {
    fn super_types_of(&self, name: &str) -> Option<Vec<String>>;
}

/// Insert missing ancestor edges into the subtype index. A no-op when the
/// index was never configured.
pub fn expand_super_types(store: &Store, resolver: &dyn TypeResolver) {
    if !store.has_index(index::SUB_TYPES) {
        return;
    }
    let keys = match store.keys(index::SUB_TYPES) {
        Ok(keys) => keys,
        Err(_) => return,
    };
    let values: HashSet<String> = match store.values(index::SUB_TYPES) {
        Ok(values) => values.into_iter().collect(),
        Err(_) => return,
    };
    for key in keys {
        if values.contains(&key) {
            continue; // not a top of the recorded hierarchy
        }
        expand_one(store, resolver, &key);
    }
}

fn expand_one(store: &Store, resolver: &dyn TypeResolver, name: &str) {
    let Some(supers) = resolver.super_types_of(name) else {
        return;
    };
    for super_type in supers {
        // A false return means the edge already existed, so the chain
        // above it was already expanded.
        if store.put(index::SUB_TYPES, &super_type, name) {
            debug!(sub = name, super_type, "expanded supertype edge");
            expand_one(store, resolver, &super_type);
        }
    }
}

/// Resolves ancestors by locating `name.replace('.', "/") + ".class"` in a
/// set of resolution contexts and decoding it with the configured adapter.
pub struct VfsTypeResolver<'a> {
    vfs: &'a Vfs,
    contexts: &'a [Locator],
    adapter: Arc<dyn MetadataAdapter>,
}

impl<'a> VfsTypeResolver<'a> {
    pub fn new(vfs: &'a Vfs, contexts: &'a [Locator], adapter: Arc<dyn MetadataAdapter>) -> Self {
        VfsTypeResolver {
            vfs,
            contexts,
            adapter,
        }
    }
}

impl TypeResolver for VfsTypeResolver<'_> {
    fn super_types_of(&self, name: &str) -> Option<Vec<String>> {
        let wanted = format!("{}.class", name.replace('.', "/"));
        for context in self.contexts {
            let container = match self.vfs.resolve(context) {
                Ok(container) => container,
                Err(error) => {
                    debug!(%context, %error, "resolution context unavailable");
                    continue;
                }
            };
            let files = match container.files() {
                Ok(files) => files,
                Err(error) => {
                    debug!(%context, %error, "could not enumerate resolution context");
                    continue;
                }
            };
            for file in files.flatten() {
                if file.relative_path() != wanted {
                    continue;
                }
                let mut bytes = Vec::new();
                let meta = file
                    .open()
                    .and_then(|mut reader| {
                        reader
                            .read_to_end(&mut bytes)
                            .map_err(|source| crate::error::ClassmapError::io(&wanted, source))?;
                        self.adapter.descriptor_of(file.relative_path(), &bytes)
                    });
                match meta {
                    Ok(meta) => {
                        let supers: Vec<String> = meta
                            .super_types()
                            .into_iter()
                            .filter(|s| s != "java.lang.Object")
                            .collect();
                        return if supers.is_empty() { None } else { Some(supers) };
                    }
                    Err(error) => {
                        debug!(%context, path = wanted, %error, "could not decode ancestor");
                        return None;
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapResolver(HashMap<&'static str, Vec<&'static str>>);

    impl TypeResolver for MapResolver {
        fn super_types_of(&self, name: &str) -> Option<Vec<String>> {
            self.0
                .get(name)
                .map(|s| s.iter().map(|s| s.to_string()).collect())
        }
    }

    #[test]
    fn test_inserts_missing_ancestor_edges() {
        // Scanned: C extends B, but only C was on the scan path. B extends
        // A in a context outside the scan.
        let store = Store::new();
        store.put("SubTypes", "B", "C");
        let resolver = MapResolver(HashMap::from([("B", vec!["A"])]));
        expand_super_types(&store, &resolver);
        assert_eq!(store.get("SubTypes", ["A"]).unwrap(), vec!["B"]);
        let mut all = store.get_all("SubTypes", ["A"]).unwrap();
        all.sort();
        assert_eq!(all, vec!["B", "C"]);
    }

    #[test]
    fn test_recursion_climbs_whole_chain() {
        let store = Store::new();
        store.put("SubTypes", "C", "D");
        let resolver = MapResolver(HashMap::from([("C", vec!["B"]), ("B", vec!["A"])]));
        expand_super_types(&store, &resolver);
        let mut all = store.get_all("SubTypes", ["A"]).unwrap();
        all.sort();
        assert_eq!(all, vec!["B", "C", "D"]);
    }

    #[test]
    fn test_existing_edges_short_circuit() {
        let store = Store::new();
        store.put("SubTypes", "B", "C");
        store.put("SubTypes", "A", "B");
        // Resolver would loop forever if the present A -> B edge did not
        // stop the recursion.
        struct Loop;
        impl TypeResolver for Loop {
            fn super_types_of(&self, name: &str) -> Option<Vec<String>> {
                match name {
                    "B" => Some(vec!["A".into()]),
                    _ => None,
                }
            }
        }
        expand_super_types(&store, &Loop);
        assert_eq!(store.get("SubTypes", ["A"]).unwrap(), vec!["B"]);
    }

    #[test]
    fn test_without_subtype_index_is_a_noop() {
        let store = Store::new();
        expand_super_types(&store, &MapResolver(HashMap::new()));
        assert!(!store.has_index("SubTypes"));
    }

    #[test]
    fn test_unresolvable_root_is_left_alone() {
        let store = Store::new();
        store.put("SubTypes", "B", "C");
        expand_super_types(&store, &MapResolver(HashMap::new()));
        assert_eq!(store.keys("SubTypes").unwrap(), vec!["B"]);
    }
}
