//! Directory containers.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use super::{Container, FileIter, Locator, Resolver, VirtualFile};
use crate::error::{ClassmapError, Result};

/// Opens locators that point at directories on disk.
pub struct DirResolver;

impl Resolver for DirResolver {
    fn matches(&self, locator: &Locator) -> bool {
        locator.as_path().is_dir()
    }

    fn open(&self, locator: &Locator) -> Result<Box<dyn Container>> {
        Ok(Box::new(DirContainer::new(locator.as_path())))
    }
}

/// A directory tree enumerated recursively in sorted order.
pub struct DirContainer {
    root: PathBuf,
    display: String,
}

impl DirContainer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let display = root.to_string_lossy().into_owned();
        DirContainer { root, display }
    }
}

impl Container for DirContainer {
    fn locator(&self) -> &str {
        &self.display
    }

    fn files(&self) -> Result<FileIter<'_>> {
        let root = self.root.clone();
        let walk = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .sort_by_file_name(std::cmp::Ord::cmp)
            .build();
        let iter = walk.filter_map(move |entry| match entry {
            Ok(entry) => {
                if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                    Some(DirFile::boxed(&root, entry.into_path()))
                } else {
                    None
                }
            }
            Err(error) => Some(Err(ClassmapError::Io {
                path: root.to_string_lossy().into_owned(),
                source: std::io::Error::other(error),
            })),
        });
        Ok(Box::new(iter))
    }
}

struct DirFile {
    path: PathBuf,
    name: String,
    relative: String,
}

impl DirFile {
    fn boxed<'a>(root: &Path, path: PathBuf) -> Result<Box<dyn VirtualFile + 'a>> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let relative = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        Ok(Box::new(DirFile {
            path,
            name,
            relative,
        }))
    }
}

impl VirtualFile for DirFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn relative_path(&self) -> &str {
        &self.relative
    }

    fn open(&self) -> Result<Box<dyn Read + '_>> {
        let file = File::open(&self.path)
            .map_err(|source| ClassmapError::io(&self.path.to_string_lossy(), source))?;
        Ok(Box::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("com/app")).unwrap();
        std::fs::write(dir.path().join("com/app/A.class"), b"aa").unwrap();
        std::fs::write(dir.path().join("com/app/B.class"), b"bb").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"n").unwrap();
        dir
    }

    #[test]
    fn test_enumerates_files_with_relative_paths() {
        let dir = fixture();
        let container = DirContainer::new(dir.path());
        let mut paths: Vec<String> = container
            .files()
            .unwrap()
            .map(|f| f.unwrap().relative_path().to_string())
            .collect();
        paths.sort();
        assert_eq!(paths, vec!["com/app/A.class", "com/app/B.class", "notes.txt"]);
    }

    #[test]
    fn test_open_reads_content() {
        let dir = fixture();
        let container = DirContainer::new(dir.path());
        for file in container.files().unwrap() {
            let file = file.unwrap();
            if file.name() == "A.class" {
                let mut buf = Vec::new();
                file.open().unwrap().read_to_end(&mut buf).unwrap();
                assert_eq!(buf, b"aa");
                return;
            }
        }
        panic!("A.class not enumerated");
    }

    #[test]
    fn test_enumeration_is_restartable() {
        let dir = fixture();
        let container = DirContainer::new(dir.path());
        let first = container.files().unwrap().count();
        let second = container.files().unwrap().count();
        assert_eq!(first, 3);
        assert_eq!(first, second);
    }
}
