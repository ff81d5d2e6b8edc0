//! The built-in scanners.

use super::{accepts_result, index, FileInfo, Scanner};
use crate::error::Result;
use crate::filter::NameFilter;
use crate::meta::{TypeMeta, CLASS_SUFFIX};
use crate::store::Store;

macro_rules! with_filter {
    () => {
        /// Restrict which result keys this scanner records.
        pub fn with_filter(mut self, filter: NameFilter) -> Self {
            self.filter = Some(filter);
            self
        }
    };
}

/// Records supertype edges: `supertype -> subtype`, one entry per direct
/// superclass and interface. `java.lang.Object` edges are dropped unless
/// requested, since every class would otherwise collapse under one key.
#[derive(Debug, Default)]
pub struct SubTypesScanner {
    filter: Option<NameFilter>,
    include_object: bool,
}

impl SubTypesScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `java.lang.Object` edges, enabling queries over all scanned
    /// types.
    pub fn including_object() -> Self {
        SubTypesScanner {
            filter: None,
            include_object: true,
        }
    }

    with_filter!();
}

impl Scanner for SubTypesScanner {
    fn index(&self) -> &'static str {
        index::SUB_TYPES
    }

    fn scan(&self, _file: &FileInfo<'_>, meta: Option<&TypeMeta>, store: &Store) -> Result<()> {
        let Some(meta) = meta else { return Ok(()) };
        for super_type in meta.super_types() {
            if super_type == "java.lang.Object" && !self.include_object {
                continue;
            }
            if accepts_result(&self.filter, &super_type) {
                store.put(self.index(), &super_type, &meta.name);
            }
        }
        Ok(())
    }
}

/// Records type-level tags: `tag -> type`.
#[derive(Debug, Default)]
pub struct TypeTagsScanner {
    filter: Option<NameFilter>,
}

impl TypeTagsScanner {
    pub fn new() -> Self {
        Self::default()
    }

    with_filter!();
}

impl Scanner for TypeTagsScanner {
    fn index(&self) -> &'static str {
        index::TYPE_TAGS
    }

    fn scan(&self, _file: &FileInfo<'_>, meta: Option<&TypeMeta>, store: &Store) -> Result<()> {
        let Some(meta) = meta else { return Ok(()) };
        for tag in &meta.tags {
            if accepts_result(&self.filter, tag) {
                store.put(self.index(), tag, &meta.name);
            }
        }
        Ok(())
    }
}

/// Records member-level tags: `tag -> member key`, covering fields,
/// methods, and method parameters.
#[derive(Debug, Default)]
pub struct MemberTagsScanner {
    filter: Option<NameFilter>,
}

impl MemberTagsScanner {
    pub fn new() -> Self {
        Self::default()
    }

    with_filter!();
}

impl Scanner for MemberTagsScanner {
    fn index(&self) -> &'static str {
        index::MEMBER_TAGS
    }

    fn scan(&self, _file: &FileInfo<'_>, meta: Option<&TypeMeta>, store: &Store) -> Result<()> {
        let Some(meta) = meta else { return Ok(()) };
        for field in &meta.fields {
            let key = meta.field_key(field);
            for tag in &field.tags {
                if accepts_result(&self.filter, tag) {
                    store.put(self.index(), tag, &key);
                }
            }
        }
        for method in &meta.methods {
            let key = meta.method_key(method);
            for tag in method.tags.iter().chain(method.param_tags.iter().flatten()) {
                if accepts_result(&self.filter, tag) {
                    store.put(self.index(), tag, &key);
                }
            }
        }
        Ok(())
    }
}

/// Records method signatures: the bracketed parameter list and the return
/// type each map to the method key, so one index answers both
/// by-parameters and by-return queries.
#[derive(Debug, Default)]
pub struct SignaturesScanner {
    filter: Option<NameFilter>,
}

impl SignaturesScanner {
    pub fn new() -> Self {
        Self::default()
    }

    with_filter!();

    /// The key under which a parameter list is recorded.
    pub fn params_key(param_types: &[impl AsRef<str>]) -> String {
        let joined: Vec<&str> = param_types.iter().map(|p| p.as_ref()).collect();
        format!("[{}]", joined.join(", "))
    }
}

impl Scanner for SignaturesScanner {
    fn index(&self) -> &'static str {
        index::SIGNATURES
    }

    fn scan(&self, _file: &FileInfo<'_>, meta: Option<&TypeMeta>, store: &Store) -> Result<()> {
        let Some(meta) = meta else { return Ok(()) };
        for method in &meta.methods {
            let key = meta.method_key(method);
            let params = Self::params_key(&method.param_types);
            if accepts_result(&self.filter, &params) {
                store.put(self.index(), &params, &key);
            }
            if accepts_result(&self.filter, &method.return_type) {
                store.put(self.index(), &method.return_type, &key);
            }
        }
        Ok(())
    }
}

/// Records declared parameter names: `method key -> "a, b, c"`. Methods
/// compiled without debug tables produce no entry.
#[derive(Debug, Default)]
pub struct ParamNamesScanner {
    filter: Option<NameFilter>,
}

impl ParamNamesScanner {
    pub fn new() -> Self {
        Self::default()
    }

    with_filter!();
}

impl Scanner for ParamNamesScanner {
    fn index(&self) -> &'static str {
        index::PARAM_NAMES
    }

    fn scan(&self, _file: &FileInfo<'_>, meta: Option<&TypeMeta>, store: &Store) -> Result<()> {
        let Some(meta) = meta else { return Ok(()) };
        for method in &meta.methods {
            if method.param_names.is_empty() {
                continue;
            }
            let key = meta.method_key(method);
            if accepts_result(&self.filter, &key) {
                store.put(self.index(), &key, &method.param_names.join(", "));
            }
        }
        Ok(())
    }
}

/// Records usage edges at class granularity: `member key -> referencing
/// type`, derived from the constant pool of the referencing class.
#[derive(Debug, Default)]
pub struct MemberUsageScanner {
    filter: Option<NameFilter>,
}

impl MemberUsageScanner {
    pub fn new() -> Self {
        Self::default()
    }

    with_filter!();
}

impl Scanner for MemberUsageScanner {
    fn index(&self) -> &'static str {
        index::MEMBER_USAGE
    }

    fn scan(&self, _file: &FileInfo<'_>, meta: Option<&TypeMeta>, store: &Store) -> Result<()> {
        let Some(meta) = meta else { return Ok(()) };
        for member_ref in &meta.member_refs {
            let key = member_ref.key();
            if accepts_result(&self.filter, &key) {
                store.put(self.index(), &key, &meta.name);
            }
        }
        Ok(())
    }
}

/// Records non-class files: `base name -> relative path`. The only built-in
/// scanner that runs without a type descriptor.
#[derive(Debug, Default)]
pub struct ResourcesScanner {
    filter: Option<NameFilter>,
}

impl ResourcesScanner {
    pub fn new() -> Self {
        Self::default()
    }

    with_filter!();
}

impl Scanner for ResourcesScanner {
    fn index(&self) -> &'static str {
        index::RESOURCES
    }

    fn accepts(&self, path: &str) -> bool {
        !path.ends_with(CLASS_SUFFIX)
    }

    fn uses_descriptor(&self) -> bool {
        false
    }

    fn scan(&self, file: &FileInfo<'_>, _meta: Option<&TypeMeta>, store: &Store) -> Result<()> {
        if accepts_result(&self.filter, file.name) {
            store.put(self.index(), file.name, file.path);
        }
        Ok(())
    }
}

/// Records a type's own elements: `type -> field name` and
/// `type -> method(param types)`.
#[derive(Debug)]
pub struct TypeElementsScanner {
    filter: Option<NameFilter>,
    include_fields: bool,
    include_methods: bool,
    public_only: bool,
}

impl Default for TypeElementsScanner {
    fn default() -> Self {
        TypeElementsScanner {
            filter: None,
            include_fields: true,
            include_methods: true,
            public_only: false,
        }
    }
}

impl TypeElementsScanner {
    pub fn new() -> Self {
        Self::default()
    }

    with_filter!();

    pub fn fields(mut self, include: bool) -> Self {
        self.include_fields = include;
        self
    }

    pub fn methods(mut self, include: bool) -> Self {
        self.include_methods = include;
        self
    }

    pub fn public_only(mut self, public_only: bool) -> Self {
        self.public_only = public_only;
        self
    }
}

impl Scanner for TypeElementsScanner {
    fn index(&self) -> &'static str {
        index::TYPE_ELEMENTS
    }

    fn scan(&self, _file: &FileInfo<'_>, meta: Option<&TypeMeta>, store: &Store) -> Result<()> {
        let Some(meta) = meta else { return Ok(()) };
        if !accepts_result(&self.filter, &meta.name) {
            return Ok(());
        }
        if self.include_fields {
            for field in &meta.fields {
                if self.public_only && !field.is_public {
                    continue;
                }
                store.put(self.index(), &meta.name, &field.name);
            }
        }
        if self.include_methods {
            for method in &meta.methods {
                if self.public_only && !method.is_public {
                    continue;
                }
                let element = format!("{}({})", method.name, method.param_types.join(", "));
                store.put(self.index(), &meta.name, &element);
            }
        }
        Ok(())
    }
}
