//! Archive containers backed by seekable zip files.
//!
//! Covers plain archives on disk, archives embedded inside another archive
//! (`outer.jar!/BOOT-INF/lib/core.jar`), and directory views inside an
//! archive (`outer.jar!/BOOT-INF/classes`).

use std::cell::RefCell;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::PathBuf;
use std::rc::Rc;

use zip::ZipArchive;

use super::{Container, FileIter, Locator, Resolver, VirtualFile};
use crate::error::{ClassmapError, Result};

trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// Opens locators that point at archive files on disk.
pub struct ArchiveResolver;

impl Resolver for ArchiveResolver {
    fn matches(&self, locator: &Locator) -> bool {
        locator.is_archive() && locator.as_path().is_file()
    }

    fn open(&self, locator: &Locator) -> Result<Box<dyn Container>> {
        Ok(Box::new(ZipContainer::open(locator.as_path())?))
    }
}

/// Opens nested-archive locators of the form `outer.jar!/inner`. When the
/// inner path names an archive entry, that entry is read out and served as
/// an in-memory archive; otherwise the inner path is treated as a directory
/// prefix inside the outer archive.
pub struct EmbeddedResolver;

impl Resolver for EmbeddedResolver {
    fn matches(&self, locator: &Locator) -> bool {
        locator
            .embedded_split()
            .map(|(outer, _)| outer.as_path().is_file())
            .unwrap_or(false)
    }

    fn open(&self, locator: &Locator) -> Result<Box<dyn Container>> {
        let (outer, inner) = locator
            .embedded_split()
            .ok_or_else(|| ClassmapError::Resolution {
                locator: locator.to_string(),
            })?;
        if Locator::new(inner.as_str()).is_archive() {
            let file = File::open(outer.as_path())
                .map_err(|source| ClassmapError::io(outer.as_str(), source))?;
            let mut archive =
                ZipArchive::new(BufReader::new(file)).map_err(|source| ClassmapError::Archive {
                    path: outer.to_string(),
                    source,
                })?;
            let mut entry = archive
                .by_name(&inner)
                .map_err(|source| ClassmapError::Archive {
                    path: locator.to_string(),
                    source,
                })?;
            let mut bytes = Vec::new();
            entry
                .read_to_end(&mut bytes)
                .map_err(|source| ClassmapError::io(locator.as_str(), source))?;
            Ok(Box::new(ZipContainer::from_bytes(
                bytes,
                locator.to_string(),
            )))
        } else {
            let container = ZipContainer::open(outer.as_path())?
                .with_display(locator.to_string())
                .with_prefix(inner);
            Ok(Box::new(container))
        }
    }
}

enum ZipSource {
    Disk(PathBuf),
    Memory(Vec<u8>),
}

/// A zip archive, optionally narrowed to the entries under a prefix.
pub struct ZipContainer {
    source: ZipSource,
    prefix: Option<String>,
    display: String,
}

impl ZipContainer {
    /// Open an archive on disk, validating its central directory.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let display = path.to_string_lossy().into_owned();
        let container = ZipContainer {
            source: ZipSource::Disk(path),
            prefix: None,
            display,
        };
        container.archive()?; // fail fast on unreadable archives
        Ok(container)
    }

    /// Serve an archive held fully in memory, e.g. one extracted from an
    /// enclosing archive.
    pub fn from_bytes(bytes: Vec<u8>, display: String) -> Self {
        ZipContainer {
            source: ZipSource::Memory(bytes),
            prefix: None,
            display,
        }
    }

    /// Narrow enumeration to entries under `prefix`; relative paths are
    /// reported without it.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into();
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        self.prefix = Some(prefix);
        self
    }

    fn with_display(mut self, display: String) -> Self {
        self.display = display;
        self
    }

    fn archive(&self) -> Result<ZipArchive<Box<dyn ReadSeek + '_>>> {
        let reader: Box<dyn ReadSeek + '_> = match &self.source {
            ZipSource::Disk(path) => {
                let file = File::open(path)
                    .map_err(|source| ClassmapError::io(&self.display, source))?;
                Box::new(BufReader::new(file))
            }
            ZipSource::Memory(bytes) => Box::new(Cursor::new(bytes.as_slice())),
        };
        ZipArchive::new(reader).map_err(|source| ClassmapError::Archive {
            path: self.display.clone(),
            source,
        })
    }
}

impl Container for ZipContainer {
    fn locator(&self) -> &str {
        &self.display
    }

    fn files(&self) -> Result<FileIter<'_>> {
        let mut archive = self.archive()?;
        // Names come from the already-parsed central directory; content is
        // read lazily per entry.
        let mut entries = Vec::new();
        for index in 0..archive.len() {
            let entry = archive
                .by_index_raw(index)
                .map_err(|source| ClassmapError::Archive {
                    path: self.display.clone(),
                    source,
                })?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let relative = match &self.prefix {
                Some(prefix) => match name.strip_prefix(prefix) {
                    Some(rest) => rest.to_string(),
                    None => continue,
                },
                None => name,
            };
            entries.push((index, relative));
        }
        let archive = Rc::new(RefCell::new(archive));
        let display = self.display.clone();
        let iter = entries.into_iter().map(move |(index, relative)| {
            let file: Box<dyn VirtualFile + '_> = Box::new(ZipEntryFile {
                archive: Rc::clone(&archive),
                display: display.clone(),
                index,
                name: relative.rsplit('/').next().unwrap_or(&relative).to_string(),
                relative,
            });
            Ok(file)
        });
        Ok(Box::new(iter))
    }
}

struct ZipEntryFile<'a> {
    archive: Rc<RefCell<ZipArchive<Box<dyn ReadSeek + 'a>>>>,
    display: String,
    index: usize,
    name: String,
    relative: String,
}

impl VirtualFile for ZipEntryFile<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn relative_path(&self) -> &str {
        &self.relative
    }

    fn open(&self) -> Result<Box<dyn Read + '_>> {
        let mut archive = self.archive.borrow_mut();
        let mut entry = archive
            .by_index(self.index)
            .map_err(|source| ClassmapError::Archive {
                path: self.display.clone(),
                source,
            })?;
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut bytes)
            .map_err(|source| ClassmapError::io(&self.relative, source))?;
        Ok(Box::new(Cursor::new(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn write_archive(entries: &[(&str, &[u8])]) -> tempfile::NamedTempFile {
        let file = tempfile::Builder::new().suffix(".jar").tempfile().unwrap();
        let mut writer = zip::ZipWriter::new(file.reopen().unwrap());
        for (name, content) in entries {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
        file
    }

    fn read_all(container: &dyn Container) -> Vec<(String, Vec<u8>)> {
        let mut out = Vec::new();
        for file in container.files().unwrap() {
            let file = file.unwrap();
            let mut bytes = Vec::new();
            file.open().unwrap().read_to_end(&mut bytes).unwrap();
            out.push((file.relative_path().to_string(), bytes));
        }
        out
    }

    #[test]
    fn test_enumerates_archive_entries() {
        let file = write_archive(&[
            ("com/app/A.class", b"aa"),
            ("META-INF/MANIFEST.MF", b"mf"),
        ]);
        let container = ZipContainer::open(file.path()).unwrap();
        let all = read_all(&container);
        assert_eq!(all.len(), 2);
        assert!(all.contains(&("com/app/A.class".to_string(), b"aa".to_vec())));
    }

    #[test]
    fn test_prefix_view_strips_prefix() {
        let file = write_archive(&[
            ("BOOT-INF/classes/com/app/A.class", b"aa"),
            ("BOOT-INF/lib/dep.jar", b"zz"),
        ]);
        let container = ZipContainer::open(file.path())
            .unwrap()
            .with_prefix("BOOT-INF/classes");
        let all = read_all(&container);
        assert_eq!(all, vec![("com/app/A.class".to_string(), b"aa".to_vec())]);
    }

    #[test]
    fn test_embedded_archive_entry() {
        let mut inner = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(Cursor::new(&mut inner));
            writer
                .start_file("com/app/B.class", FileOptions::default())
                .unwrap();
            writer.write_all(b"bb").unwrap();
            writer.finish().unwrap();
        }
        let outer = write_archive(&[("BOOT-INF/lib/core.jar", inner.as_slice())]);
        let locator = Locator::new(format!(
            "{}!/BOOT-INF/lib/core.jar",
            outer.path().to_string_lossy()
        ));
        assert!(EmbeddedResolver.matches(&locator));
        let container = EmbeddedResolver.open(&locator).unwrap();
        let all = read_all(container.as_ref());
        assert_eq!(all, vec![("com/app/B.class".to_string(), b"bb".to_vec())]);
    }

    #[test]
    fn test_enumeration_is_restartable() {
        let file = write_archive(&[("a.txt", b"1"), ("b.txt", b"2")]);
        let container = ZipContainer::open(file.path()).unwrap();
        assert_eq!(container.files().unwrap().count(), 2);
        assert_eq!(container.files().unwrap().count(), 2);
    }
}
