//! Type metadata extracted from compiled artifacts.
//!
//! A [`TypeMeta`] is the neutral descriptor scanners consume: the type's
//! name, supertypes, tags, member signatures, and the member references its
//! constant pool records. The [`MetadataAdapter`] trait decouples scanners
//! from the concrete binary format; [`ClassFileAdapter`] is the built-in
//! implementation for JVM class files.

pub mod classfile;

use crate::error::Result;

/// File suffix of compiled JVM types.
pub const CLASS_SUFFIX: &str = ".class";

/// Metadata of one scanned type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMeta {
    /// Dotted fully qualified name, e.g. `com.app.Service`.
    pub name: String,
    /// Direct superclass, absent only for the root of the hierarchy.
    pub super_name: Option<String>,
    /// Directly implemented interfaces.
    pub interfaces: Vec<String>,
    /// Tags (annotation type names) attached to the type itself.
    pub tags: Vec<String>,
    pub fields: Vec<FieldMeta>,
    pub methods: Vec<MethodMeta>,
    /// Field and method references found in the constant pool, used to
    /// record usage edges at class granularity.
    pub member_refs: Vec<MemberRef>,
    pub is_public: bool,
}

impl TypeMeta {
    /// Direct supertypes: the superclass (if any) followed by interfaces.
    pub fn super_types(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(s) = &self.super_name {
            out.push(s.clone());
        }
        out.extend(self.interfaces.iter().cloned());
        out
    }

    /// Stable key for a field of this type, e.g. `com.app.Service.count`.
    pub fn field_key(&self, field: &FieldMeta) -> String {
        format!("{}.{}", self.name, field.name)
    }

    /// Stable key for a method of this type, e.g.
    /// `com.app.Service.find(int, java.lang.String)`.
    pub fn method_key(&self, method: &MethodMeta) -> String {
        format!(
            "{}.{}({})",
            self.name,
            method.name,
            method.param_types.join(", ")
        )
    }
}

/// Metadata of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMeta {
    pub name: String,
    /// Dotted type name, e.g. `int` or `java.lang.String[]`.
    pub type_name: String,
    pub tags: Vec<String>,
    pub is_public: bool,
    pub is_static: bool,
}

/// Metadata of one method or constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodMeta {
    /// Simple name; constructors appear as `<init>`.
    pub name: String,
    pub param_types: Vec<String>,
    pub return_type: String,
    pub tags: Vec<String>,
    /// Tags per parameter position; empty when no parameter carries any.
    pub param_tags: Vec<Vec<String>>,
    /// Declared parameter names when the debug tables carry them.
    pub param_names: Vec<String>,
    pub is_public: bool,
    pub is_static: bool,
}

/// A reference to a member of some type, as recorded in a constant pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    /// Dotted name of the type owning the member.
    pub owner: String,
    pub name: String,
    /// Parameter type names for method references, `None` for field
    /// references.
    pub params: Option<Vec<String>>,
}

impl MemberRef {
    /// Stable key matching [`TypeMeta::method_key`] / [`TypeMeta::field_key`].
    pub fn key(&self) -> String {
        match &self.params {
            Some(params) => format!("{}.{}({})", self.owner, self.name, params.join(", ")),
            None => format!("{}.{}", self.owner, self.name),
        }
    }
}

/// Decodes raw file bytes into [`TypeMeta`]. Implementations must be cheap
/// to call for `accepts` and may reject files by path alone.
pub trait MetadataAdapter: Send + Sync {
    /// Whether this adapter can decode the file at `path`.
    fn accepts(&self, path: &str) -> bool;

    /// Decode the file content into a descriptor. Called at most once per
    /// file; the result is shared across all scanners.
    fn descriptor_of(&self, path: &str, bytes: &[u8]) -> Result<TypeMeta>;
}

/// The built-in adapter for JVM `.class` files.
#[derive(Debug, Default, Clone)]
pub struct ClassFileAdapter;

impl MetadataAdapter for ClassFileAdapter {
    fn accepts(&self, path: &str) -> bool {
        path.ends_with(CLASS_SUFFIX) && !path.ends_with("module-info.class")
    }

    fn descriptor_of(&self, path: &str, bytes: &[u8]) -> Result<TypeMeta> {
        classfile::parse(bytes).map_err(|source| crate::error::ClassmapError::ClassParse {
            path: path.to_string(),
            source,
        })
    }
}
