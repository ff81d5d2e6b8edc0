//! A minimal JVM class file reader.
//!
//! Decodes the constant pool, supertype references, member declarations,
//! runtime-visible annotations, local variable tables, and the member
//! references recorded in the constant pool. Bytecode itself is never
//! interpreted; the attributes not needed for indexing are skipped by
//! length.

use thiserror::Error;

use super::{FieldMeta, MemberRef, MethodMeta, TypeMeta};

const MAGIC: u32 = 0xCAFE_BABE;

const ACC_PUBLIC: u16 = 0x0001;
const ACC_STATIC: u16 = 0x0008;

/// Errors produced while decoding a class file.
#[derive(Debug, Error)]
pub enum ClassParseError {
    #[error("unexpected end of class file at offset {offset}")]
    Eof { offset: usize },
    #[error("bad magic number {found:#010x}")]
    BadMagic { found: u32 },
    #[error("unknown constant pool tag {tag} at entry {entry}")]
    UnknownPoolTag { tag: u8, entry: u16 },
    #[error("constant pool index {index} out of range or of the wrong kind")]
    BadPoolIndex { index: u16 },
    #[error("invalid UTF-8 in constant pool entry {entry}")]
    BadUtf8 { entry: u16 },
    #[error("malformed descriptor `{descriptor}`")]
    BadDescriptor { descriptor: String },
    #[error("unknown element value tag {tag:#04x} in annotation")]
    BadElementValue { tag: u8 },
}

type PResult<T> = std::result::Result<T, ClassParseError>;

/// Parse a complete class file into a [`TypeMeta`].
pub fn parse(bytes: &[u8]) -> PResult<TypeMeta> {
    let mut r = Reader::new(bytes);
    let magic = r.u4()?;
    if magic != MAGIC {
        return Err(ClassParseError::BadMagic { found: magic });
    }
    r.skip(4)?; // minor, major

    let pool = Pool::read(&mut r)?;

    let access = r.u2()?;
    let this_class = r.u2()?;
    let name = pool.class_name(this_class)?;
    let super_index = r.u2()?;
    let super_name = if super_index == 0 {
        None
    } else {
        Some(pool.class_name(super_index)?)
    };

    let interface_count = r.u2()?;
    let mut interfaces = Vec::with_capacity(interface_count as usize);
    for _ in 0..interface_count {
        interfaces.push(pool.class_name(r.u2()?)?);
    }

    let field_count = r.u2()?;
    let mut fields = Vec::with_capacity(field_count as usize);
    for _ in 0..field_count {
        fields.push(read_field(&mut r, &pool)?);
    }

    let method_count = r.u2()?;
    let mut methods = Vec::with_capacity(method_count as usize);
    for _ in 0..method_count {
        methods.push(read_method(&mut r, &pool)?);
    }

    let mut tags = Vec::new();
    let attr_count = r.u2()?;
    for _ in 0..attr_count {
        let attr_name = pool.utf8(r.u2()?)?.to_string();
        let len = r.u4()? as usize;
        let body = r.take(len)?;
        if attr_name == "RuntimeVisibleAnnotations" {
            tags = read_annotations(&mut Reader::new(body), &pool)?;
        }
    }

    Ok(TypeMeta {
        name,
        super_name,
        interfaces,
        tags,
        fields,
        methods,
        member_refs: pool.member_refs()?,
        is_public: access & ACC_PUBLIC != 0,
    })
}

// ─── Byte Reader ─────────────────────────────────────────────────────────

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn eof(&self) -> ClassParseError {
        ClassParseError::Eof { offset: self.pos }
    }

    fn u1(&mut self) -> PResult<u8> {
        let b = *self.bytes.get(self.pos).ok_or_else(|| self.eof())?;
        self.pos += 1;
        Ok(b)
    }

    fn u2(&mut self) -> PResult<u16> {
        let s = self.take(2)?;
        Ok(u16::from_be_bytes([s[0], s[1]]))
    }

    fn u4(&mut self) -> PResult<u32> {
        let s = self.take(4)?;
        Ok(u32::from_be_bytes([s[0], s[1], s[2], s[3]]))
    }

    fn take(&mut self, n: usize) -> PResult<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or_else(|| self.eof())?;
        let s = self.bytes.get(self.pos..end).ok_or_else(|| self.eof())?;
        self.pos = end;
        Ok(s)
    }

    fn skip(&mut self, n: usize) -> PResult<()> {
        self.take(n).map(|_| ())
    }
}

// ─── Constant Pool ───────────────────────────────────────────────────────

enum Const {
    Utf8(String),
    Class(u16),
    NameAndType { name: u16, desc: u16 },
    FieldRef { class: u16, nat: u16 },
    MethodRef { class: u16, nat: u16 },
    Other,
}

struct Pool {
    entries: Vec<Const>,
}

impl Pool {
    fn read(r: &mut Reader<'_>) -> PResult<Self> {
        let count = r.u2()?;
        let mut entries = Vec::with_capacity(count as usize);
        entries.push(Const::Other); // entry 0 is unused
        let mut i = 1u16;
        while i < count {
            let tag = r.u1()?;
            let entry = match tag {
                1 => {
                    let len = r.u2()? as usize;
                    let raw = r.take(len)?;
                    // Modified UTF-8 differs from UTF-8 only for NUL and
                    // supplementary characters, neither of which occurs in
                    // the names indexed here.
                    let s = std::str::from_utf8(raw)
                        .map_err(|_| ClassParseError::BadUtf8 { entry: i })?;
                    Const::Utf8(s.to_string())
                }
                3 | 4 => {
                    r.skip(4)?;
                    Const::Other
                }
                5 | 6 => {
                    r.skip(8)?;
                    entries.push(Const::Other);
                    i += 1; // long and double occupy two pool slots
                    Const::Other
                }
                7 => Const::Class(r.u2()?),
                8 => {
                    r.skip(2)?;
                    Const::Other
                }
                9 => Const::FieldRef {
                    class: r.u2()?,
                    nat: r.u2()?,
                },
                10 | 11 => Const::MethodRef {
                    class: r.u2()?,
                    nat: r.u2()?,
                },
                12 => Const::NameAndType {
                    name: r.u2()?,
                    desc: r.u2()?,
                },
                15 => {
                    r.skip(3)?;
                    Const::Other
                }
                16 | 19 | 20 => {
                    r.skip(2)?;
                    Const::Other
                }
                17 | 18 => {
                    r.skip(4)?;
                    Const::Other
                }
                other => return Err(ClassParseError::UnknownPoolTag { tag: other, entry: i }),
            };
            entries.push(entry);
            i += 1;
        }
        Ok(Pool { entries })
    }

    fn get(&self, index: u16) -> PResult<&Const> {
        self.entries
            .get(index as usize)
            .ok_or(ClassParseError::BadPoolIndex { index })
    }

    fn utf8(&self, index: u16) -> PResult<&str> {
        match self.get(index)? {
            Const::Utf8(s) => Ok(s),
            _ => Err(ClassParseError::BadPoolIndex { index }),
        }
    }

    /// Dotted name of a class entry. Array classes keep their descriptor
    /// form and are filtered out by the caller.
    fn class_name(&self, index: u16) -> PResult<String> {
        match self.get(index)? {
            Const::Class(name_index) => Ok(self.utf8(*name_index)?.replace('/', ".")),
            _ => Err(ClassParseError::BadPoolIndex { index }),
        }
    }

    fn name_and_type(&self, index: u16) -> PResult<(&str, &str)> {
        match self.get(index)? {
            Const::NameAndType { name, desc } => Ok((self.utf8(*name)?, self.utf8(*desc)?)),
            _ => Err(ClassParseError::BadPoolIndex { index }),
        }
    }

    /// Field and method references recorded in the pool, as usage targets.
    fn member_refs(&self) -> PResult<Vec<MemberRef>> {
        let mut out = Vec::new();
        for entry in &self.entries {
            let (class, nat, is_method) = match entry {
                Const::FieldRef { class, nat } => (*class, *nat, false),
                Const::MethodRef { class, nat } => (*class, *nat, true),
                _ => continue,
            };
            let owner = self.class_name(class)?;
            if owner.starts_with('[') {
                continue; // reference to an array pseudo-class
            }
            let (name, desc) = self.name_and_type(nat)?;
            let params = if is_method {
                Some(method_descriptor(desc)?.0)
            } else {
                None
            };
            out.push(MemberRef {
                owner,
                name: name.to_string(),
                params,
            });
        }
        Ok(out)
    }
}

// ─── Members ─────────────────────────────────────────────────────────────

fn read_field(r: &mut Reader<'_>, pool: &Pool) -> PResult<FieldMeta> {
    let access = r.u2()?;
    let name = pool.utf8(r.u2()?)?.to_string();
    let type_name = field_type(pool.utf8(r.u2()?)?)?;
    let mut tags = Vec::new();
    let attr_count = r.u2()?;
    for _ in 0..attr_count {
        let attr_name = pool.utf8(r.u2()?)?.to_string();
        let len = r.u4()? as usize;
        let body = r.take(len)?;
        if attr_name == "RuntimeVisibleAnnotations" {
            tags = read_annotations(&mut Reader::new(body), pool)?;
        }
    }
    Ok(FieldMeta {
        name,
        type_name,
        tags,
        is_public: access & ACC_PUBLIC != 0,
        is_static: access & ACC_STATIC != 0,
    })
}

fn read_method(r: &mut Reader<'_>, pool: &Pool) -> PResult<MethodMeta> {
    let access = r.u2()?;
    let name = pool.utf8(r.u2()?)?.to_string();
    let (param_types, return_type) = method_descriptor(pool.utf8(r.u2()?)?)?;
    let is_static = access & ACC_STATIC != 0;

    let mut tags = Vec::new();
    let mut param_tags = Vec::new();
    let mut locals: Vec<(u16, String)> = Vec::new();
    let attr_count = r.u2()?;
    for _ in 0..attr_count {
        let attr_name = pool.utf8(r.u2()?)?.to_string();
        let len = r.u4()? as usize;
        let body = r.take(len)?;
        match attr_name.as_str() {
            "RuntimeVisibleAnnotations" => {
                tags = read_annotations(&mut Reader::new(body), pool)?;
            }
            "RuntimeVisibleParameterAnnotations" => {
                let mut a = Reader::new(body);
                let params = a.u1()?;
                for _ in 0..params {
                    param_tags.push(read_annotations(&mut a, pool)?);
                }
            }
            "Code" => {
                locals = read_local_variables(&mut Reader::new(body), pool)?;
            }
            _ => {}
        }
    }

    // Parameter names are the slot-ordered locals live from instruction
    // zero, minus the receiver slot for instance methods.
    locals.retain(|(slot, _)| is_static || *slot != 0);
    locals.sort_by_key(|(slot, _)| *slot);
    let param_names: Vec<String> = locals
        .into_iter()
        .take(param_types.len())
        .map(|(_, name)| name)
        .collect();

    Ok(MethodMeta {
        name,
        param_types,
        return_type,
        tags,
        param_tags,
        param_names,
        is_public: access & ACC_PUBLIC != 0,
        is_static,
    })
}

/// Walk a Code attribute for its LocalVariableTable, returning the
/// `(slot, name)` pairs whose scope starts at instruction zero.
fn read_local_variables(r: &mut Reader<'_>, pool: &Pool) -> PResult<Vec<(u16, String)>> {
    r.skip(4)?; // max_stack, max_locals
    let code_len = r.u4()? as usize;
    r.skip(code_len)?;
    let exception_count = r.u2()? as usize;
    r.skip(exception_count * 8)?;

    let mut out = Vec::new();
    let attr_count = r.u2()?;
    for _ in 0..attr_count {
        let attr_name = pool.utf8(r.u2()?)?.to_string();
        let len = r.u4()? as usize;
        let body = r.take(len)?;
        if attr_name == "LocalVariableTable" {
            let mut t = Reader::new(body);
            let entries = t.u2()?;
            for _ in 0..entries {
                let start_pc = t.u2()?;
                t.skip(2)?; // length
                let name = pool.utf8(t.u2()?)?.to_string();
                t.skip(2)?; // descriptor
                let slot = t.u2()?;
                if start_pc == 0 {
                    out.push((slot, name));
                }
            }
        }
    }
    Ok(out)
}

// ─── Annotations ─────────────────────────────────────────────────────────

fn read_annotations(r: &mut Reader<'_>, pool: &Pool) -> PResult<Vec<String>> {
    let count = r.u2()?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let type_index = r.u2()?;
        out.push(field_type(pool.utf8(type_index)?)?);
        let pairs = r.u2()?;
        for _ in 0..pairs {
            r.skip(2)?; // element name
            skip_element_value(r)?;
        }
    }
    Ok(out)
}

fn skip_element_value(r: &mut Reader<'_>) -> PResult<()> {
    let tag = r.u1()?;
    match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' | b'c' => r.skip(2),
        b'e' => r.skip(4),
        b'@' => {
            r.skip(2)?; // type index
            let pairs = r.u2()?;
            for _ in 0..pairs {
                r.skip(2)?;
                skip_element_value(r)?;
            }
            Ok(())
        }
        b'[' => {
            let count = r.u2()?;
            for _ in 0..count {
                skip_element_value(r)?;
            }
            Ok(())
        }
        other => Err(ClassParseError::BadElementValue { tag: other }),
    }
}

// ─── Descriptors ─────────────────────────────────────────────────────────

/// Decode a single field descriptor, e.g. `[Ljava/lang/String;` into
/// `java.lang.String[]`.
pub fn field_type(descriptor: &str) -> PResult<String> {
    let bytes = descriptor.as_bytes();
    let mut pos = 0;
    let name = next_type(bytes, &mut pos, descriptor)?;
    if pos != bytes.len() {
        return Err(bad_descriptor(descriptor));
    }
    Ok(name)
}

/// Decode a method descriptor into its parameter type names and return
/// type name.
pub fn method_descriptor(descriptor: &str) -> PResult<(Vec<String>, String)> {
    let bytes = descriptor.as_bytes();
    if bytes.first() != Some(&b'(') {
        return Err(bad_descriptor(descriptor));
    }
    let mut pos = 1;
    let mut params = Vec::new();
    loop {
        match bytes.get(pos) {
            Some(b')') => {
                pos += 1;
                break;
            }
            Some(_) => params.push(next_type(bytes, &mut pos, descriptor)?),
            None => return Err(bad_descriptor(descriptor)),
        }
    }
    let ret = next_type(bytes, &mut pos, descriptor)?;
    if pos != bytes.len() {
        return Err(bad_descriptor(descriptor));
    }
    Ok((params, ret))
}

fn next_type(bytes: &[u8], pos: &mut usize, descriptor: &str) -> PResult<String> {
    let mut dims = 0;
    while bytes.get(*pos) == Some(&b'[') {
        dims += 1;
        *pos += 1;
    }
    let base = match bytes.get(*pos) {
        Some(b'B') => "byte".to_string(),
        Some(b'C') => "char".to_string(),
        Some(b'D') => "double".to_string(),
        Some(b'F') => "float".to_string(),
        Some(b'I') => "int".to_string(),
        Some(b'J') => "long".to_string(),
        Some(b'S') => "short".to_string(),
        Some(b'Z') => "boolean".to_string(),
        Some(b'V') => "void".to_string(),
        Some(b'L') => {
            let start = *pos + 1;
            let end = bytes[start..]
                .iter()
                .position(|&b| b == b';')
                .map(|i| start + i)
                .ok_or_else(|| bad_descriptor(descriptor))?;
            let name = std::str::from_utf8(&bytes[start..end])
                .map_err(|_| bad_descriptor(descriptor))?
                .replace('/', ".");
            *pos = end;
            name
        }
        _ => return Err(bad_descriptor(descriptor)),
    };
    *pos += 1;
    let mut name = base;
    for _ in 0..dims {
        name.push_str("[]");
    }
    Ok(name)
}

fn bad_descriptor(descriptor: &str) -> ClassParseError {
    ClassParseError::BadDescriptor {
        descriptor: descriptor.to_string(),
    }
}
