//! Fixture helpers: synthesized class files and archives.

use std::io::{Seek, Write};
use std::path::Path;

use zip::write::FileOptions;

/// A minimal class file: supertypes and type annotations only, no members.
pub fn class_bytes(name: &str, super_name: &str, interfaces: &[&str], tags: &[&str]) -> Vec<u8> {
    fn utf8(pool: &mut Vec<Vec<u8>>, s: &str) -> u16 {
        let mut e = vec![1u8];
        e.extend_from_slice(&(s.len() as u16).to_be_bytes());
        e.extend_from_slice(s.as_bytes());
        pool.push(e);
        pool.len() as u16
    }
    fn class(pool: &mut Vec<Vec<u8>>, s: &str) -> u16 {
        let name_index = utf8(pool, &s.replace('.', "/"));
        let mut e = vec![7u8];
        e.extend_from_slice(&name_index.to_be_bytes());
        pool.push(e);
        pool.len() as u16
    }

    let mut pool: Vec<Vec<u8>> = Vec::new();
    let this = class(&mut pool, name);
    let superc = class(&mut pool, super_name);
    let ifaces: Vec<u16> = interfaces.iter().map(|i| class(&mut pool, i)).collect();
    let rva = if tags.is_empty() {
        None
    } else {
        let attr_name = utf8(&mut pool, "RuntimeVisibleAnnotations");
        let descs: Vec<u16> = tags
            .iter()
            .map(|t| utf8(&mut pool, &format!("L{};", t.replace('.', "/"))))
            .collect();
        Some((attr_name, descs))
    };

    let mut out = Vec::new();
    out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes()); // minor
    out.extend_from_slice(&52u16.to_be_bytes()); // major
    out.extend_from_slice(&(pool.len() as u16 + 1).to_be_bytes());
    for entry in &pool {
        out.extend_from_slice(entry);
    }
    out.extend_from_slice(&0x0021u16.to_be_bytes()); // public super
    out.extend_from_slice(&this.to_be_bytes());
    out.extend_from_slice(&superc.to_be_bytes());
    out.extend_from_slice(&(ifaces.len() as u16).to_be_bytes());
    for i in ifaces {
        out.extend_from_slice(&i.to_be_bytes());
    }
    out.extend_from_slice(&0u16.to_be_bytes()); // fields
    out.extend_from_slice(&0u16.to_be_bytes()); // methods
    match rva {
        None => out.extend_from_slice(&0u16.to_be_bytes()),
        Some((attr_name, descs)) => {
            let mut body = (descs.len() as u16).to_be_bytes().to_vec();
            for d in descs {
                body.extend_from_slice(&d.to_be_bytes());
                body.extend_from_slice(&0u16.to_be_bytes()); // no element pairs
            }
            out.extend_from_slice(&1u16.to_be_bytes());
            out.extend_from_slice(&attr_name.to_be_bytes());
            out.extend_from_slice(&(body.len() as u32).to_be_bytes());
            out.extend_from_slice(&body);
        }
    }
    out
}

/// Relative `.class` path of a dotted type name.
pub fn class_path(name: &str) -> String {
    format!("{}.class", name.replace('.', "/"))
}

/// Write classes into a directory tree rooted at `root`.
pub fn write_classes(root: &Path, classes: &[(&str, Vec<u8>)]) {
    for (name, bytes) in classes {
        let path = root.join(class_path(name));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }
}

/// Write named entries into a fresh archive through `writer`.
pub fn write_archive<W: Write + Seek>(writer: W, entries: &[(&str, &[u8])]) {
    let mut zip = zip::ZipWriter::new(writer);
    for (name, content) in entries {
        zip.start_file(*name, FileOptions::default()).unwrap();
        zip.write_all(content).unwrap();
    }
    zip.finish().unwrap();
}
