//! Streamed archive containers.
//!
//! Reads a zip archive strictly forward, one local file header at a time,
//! without the central directory. All entries share the underlying stream,
//! so a file's content window is only readable while enumeration is
//! positioned on that entry: each entry is assigned a window of
//! decompressed offsets `[from, end)`, and reads outside the current window
//! observe end-of-stream instead of another entry's bytes. Entries whose
//! sizes are deferred to a trailing data descriptor cannot be skipped
//! reliably and fail extraction.

use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;

use flate2::bufread::DeflateDecoder;

use super::{Container, FileIter, Locator, Resolver, VirtualFile};
use crate::error::{ClassmapError, Result};

const LOCAL_HEADER_SIG: u32 = 0x0403_4b50;
const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
const METHOD_STORED: u16 = 0;
const METHOD_DEFLATED: u16 = 8;

/// Fallback resolver for archive locators that no seekable resolver could
/// open.
pub struct StreamResolver;

impl Resolver for StreamResolver {
    fn matches(&self, locator: &Locator) -> bool {
        locator.is_archive()
    }

    fn open(&self, locator: &Locator) -> Result<Box<dyn Container>> {
        // Validate the source up front so resolution can fall through.
        File::open(locator.as_path()).map_err(|source| ClassmapError::io(locator.as_str(), source))?;
        Ok(Box::new(StreamContainer::new(locator.as_path())))
    }
}

enum StreamState {
    Idle,
    Between(BufReader<File>),
    Stored(io::Take<BufReader<File>>),
    Deflated(DeflateDecoder<io::Take<BufReader<File>>>),
    Done,
}

/// A forward-only archive stream. Enumeration is restartable: every call
/// to [`Container::files`] reopens the source and rewinds the shared
/// cursor.
pub struct StreamContainer {
    path: PathBuf,
    display: String,
    state: RefCell<StreamState>,
    /// Decompressed bytes consumed since enumeration started.
    cursor: Cell<u64>,
}

impl StreamContainer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let display = path.to_string_lossy().into_owned();
        StreamContainer {
            path,
            display,
            state: RefCell::new(StreamState::Idle),
            cursor: Cell::new(0),
        }
    }

    /// Drain the current entry (if any) and return to header position,
    /// advancing the cursor to the end of the entry's window.
    fn finish_current(&self) -> io::Result<()> {
        let state = self.state.replace(StreamState::Idle);
        let next = match state {
            StreamState::Stored(mut take) => {
                let n = io::copy(&mut take, &mut io::sink())?;
                self.cursor.set(self.cursor.get() + n);
                StreamState::Between(take.into_inner())
            }
            StreamState::Deflated(mut decoder) => {
                let n = io::copy(&mut decoder, &mut io::sink())?;
                self.cursor.set(self.cursor.get() + n);
                let mut take = decoder.into_inner();
                // Discard compressed bytes the decoder did not consume.
                io::copy(&mut take, &mut io::sink())?;
                StreamState::Between(take.into_inner())
            }
            other => other,
        };
        self.state.replace(next);
        Ok(())
    }

    fn io_err(&self, source: io::Error) -> ClassmapError {
        ClassmapError::io(&self.display, source)
    }
}

impl Container for StreamContainer {
    fn locator(&self) -> &str {
        &self.display
    }

    fn files(&self) -> Result<FileIter<'_>> {
        let file = File::open(&self.path).map_err(|source| self.io_err(source))?;
        self.state.replace(StreamState::Between(BufReader::new(file)));
        self.cursor.set(0);
        Ok(Box::new(StreamFiles { dir: self }))
    }
}

struct StreamFiles<'a> {
    dir: &'a StreamContainer,
}

impl<'a> Iterator for StreamFiles<'a> {
    type Item = Result<Box<dyn VirtualFile + 'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        let dir = self.dir;
        if let Err(source) = dir.finish_current() {
            dir.state.replace(StreamState::Done);
            return Some(Err(dir.io_err(source)));
        }
        loop {
            let mut reader = match dir.state.replace(StreamState::Idle) {
                StreamState::Between(reader) => reader,
                other => {
                    dir.state.replace(other);
                    return None;
                }
            };
            let header = match read_local_header(&mut reader) {
                Ok(Some(header)) => header,
                Ok(None) => {
                    dir.state.replace(StreamState::Done);
                    return None;
                }
                Err(source) => {
                    dir.state.replace(StreamState::Done);
                    return Some(Err(dir.io_err(source)));
                }
            };
            if header.flags & FLAG_DATA_DESCRIPTOR != 0 {
                dir.state.replace(StreamState::Done);
                return Some(Err(ClassmapError::Stream {
                    path: dir.display.clone(),
                    entry: header.name,
                    reason: "sizes deferred to a trailing data descriptor".into(),
                }));
            }
            if header.name.ends_with('/') {
                // Directory entry, nothing to read past its (empty) body.
                if let Err(source) =
                    io::copy(&mut (&mut reader).take(header.compressed_size), &mut io::sink())
                {
                    dir.state.replace(StreamState::Done);
                    return Some(Err(dir.io_err(source)));
                }
                dir.state.replace(StreamState::Between(reader));
                continue;
            }
            let take = reader.take(header.compressed_size);
            let state = match header.method {
                METHOD_STORED => StreamState::Stored(take),
                METHOD_DEFLATED => StreamState::Deflated(DeflateDecoder::new(take)),
                other => {
                    dir.state.replace(StreamState::Done);
                    return Some(Err(ClassmapError::Stream {
                        path: dir.display.clone(),
                        entry: header.name,
                        reason: format!("unsupported compression method {other}"),
                    }));
                }
            };
            dir.state.replace(state);
            let from = dir.cursor.get();
            let end = from + header.uncompressed_size;
            let name = header
                .name
                .rsplit('/')
                .next()
                .unwrap_or(&header.name)
                .to_string();
            let file: Box<dyn VirtualFile + 'a> = Box::new(StreamFile {
                dir,
                name,
                relative: header.name,
                from,
                end,
            });
            return Some(Ok(file));
        }
    }
}

struct LocalHeader {
    flags: u16,
    method: u16,
    compressed_size: u64,
    uncompressed_size: u64,
    name: String,
}

/// Read one local file header, or `None` when the central directory or the
/// end of the stream is reached.
fn read_local_header(reader: &mut BufReader<File>) -> io::Result<Option<LocalHeader>> {
    let mut sig = [0u8; 4];
    match reader.read_exact(&mut sig) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }
    if u32::from_le_bytes(sig) != LOCAL_HEADER_SIG {
        return Ok(None);
    }
    let mut fixed = [0u8; 26];
    reader.read_exact(&mut fixed)?;
    let u16_at = |at: usize| u16::from_le_bytes([fixed[at], fixed[at + 1]]);
    let u32_at =
        |at: usize| u32::from_le_bytes([fixed[at], fixed[at + 1], fixed[at + 2], fixed[at + 3]]);
    let flags = u16_at(2);
    let method = u16_at(4);
    let compressed_size = u32_at(14) as u64;
    let uncompressed_size = u32_at(18) as u64;
    let name_len = u16_at(22) as usize;
    let extra_len = u16_at(24) as usize;
    let mut name = vec![0u8; name_len];
    reader.read_exact(&mut name)?;
    io::copy(&mut reader.by_ref().take(extra_len as u64), &mut io::sink())?;
    Ok(Some(LocalHeader {
        flags,
        method,
        compressed_size,
        uncompressed_size,
        name: String::from_utf8_lossy(&name).into_owned(),
    }))
}

struct StreamFile<'a> {
    dir: &'a StreamContainer,
    name: String,
    relative: String,
    from: u64,
    end: u64,
}

impl VirtualFile for StreamFile<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn relative_path(&self) -> &str {
        &self.relative
    }

    fn open(&self) -> Result<Box<dyn Read + '_>> {
        Ok(Box::new(StreamFileReader {
            dir: self.dir,
            from: self.from,
            end: self.end,
        }))
    }
}

struct StreamFileReader<'a> {
    dir: &'a StreamContainer,
    from: u64,
    end: u64,
}

impl Read for StreamFileReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let cursor = self.dir.cursor.get();
        // Enumeration has moved past this entry's window.
        if cursor < self.from || cursor >= self.end {
            return Ok(0);
        }
        let want = buf.len().min((self.end - cursor) as usize);
        let mut state = self.dir.state.borrow_mut();
        let n = match &mut *state {
            StreamState::Stored(take) => take.read(&mut buf[..want])?,
            StreamState::Deflated(decoder) => decoder.read(&mut buf[..want])?,
            _ => return Ok(0),
        };
        self.dir.cursor.set(cursor + n as u64);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::CompressionMethod;

    fn write_archive(entries: &[(&str, &[u8], CompressionMethod)]) -> tempfile::NamedTempFile {
        let file = tempfile::Builder::new().suffix(".jar").tempfile().unwrap();
        let mut writer = zip::ZipWriter::new(file.reopen().unwrap());
        for (name, content, method) in entries {
            let options = FileOptions::default().compression_method(*method);
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap();
        file
    }

    #[test]
    fn test_streams_stored_and_deflated_entries() {
        let file = write_archive(&[
            ("com/app/A.class", b"stored bytes", CompressionMethod::Stored),
            ("com/app/B.class", b"deflated bytes", CompressionMethod::Deflated),
        ]);
        let container = StreamContainer::new(file.path());
        let mut seen = Vec::new();
        for entry in container.files().unwrap() {
            let entry = entry.unwrap();
            let mut content = Vec::new();
            entry.open().unwrap().read_to_end(&mut content).unwrap();
            seen.push((entry.relative_path().to_string(), content));
        }
        assert_eq!(
            seen,
            vec![
                ("com/app/A.class".to_string(), b"stored bytes".to_vec()),
                ("com/app/B.class".to_string(), b"deflated bytes".to_vec()),
            ]
        );
    }

    #[test]
    fn test_skipped_entry_reads_as_empty() {
        let file = write_archive(&[
            ("a.txt", b"first", CompressionMethod::Deflated),
            ("b.txt", b"second", CompressionMethod::Deflated),
        ]);
        let container = StreamContainer::new(file.path());
        let mut files = container.files().unwrap();
        let first = files.next().unwrap().unwrap();
        let second = files.next().unwrap().unwrap();
        // The cursor has moved past the first entry's window.
        let mut stale = Vec::new();
        first.open().unwrap().read_to_end(&mut stale).unwrap();
        assert!(stale.is_empty());
        let mut content = Vec::new();
        second.open().unwrap().read_to_end(&mut content).unwrap();
        assert_eq!(content, b"second");
    }

    #[test]
    fn test_partial_read_then_advance() {
        let file = write_archive(&[
            ("a.txt", b"abcdefgh", CompressionMethod::Deflated),
            ("b.txt", b"next", CompressionMethod::Deflated),
        ]);
        let container = StreamContainer::new(file.path());
        let mut files = container.files().unwrap();
        let first = files.next().unwrap().unwrap();
        let mut reader = first.open().unwrap();
        let mut half = [0u8; 4];
        reader.read_exact(&mut half).unwrap();
        assert_eq!(&half, b"abcd");
        drop(reader);
        // Advancing drains the remainder of the first entry.
        let second = files.next().unwrap().unwrap();
        let mut content = Vec::new();
        second.open().unwrap().read_to_end(&mut content).unwrap();
        assert_eq!(content, b"next");
    }

    #[test]
    fn test_enumeration_is_restartable() {
        let file = write_archive(&[("a.txt", b"one", CompressionMethod::Stored)]);
        let container = StreamContainer::new(file.path());
        // Content must be read while the entry's window is current; each new
        // enumeration rewinds the stream for another full pass.
        for _ in 0..2 {
            let mut count = 0;
            for entry in container.files().unwrap() {
                let entry = entry.unwrap();
                let mut content = Vec::new();
                entry.open().unwrap().read_to_end(&mut content).unwrap();
                assert_eq!(content, b"one");
                count += 1;
            }
            assert_eq!(count, 1);
        }
    }

    #[test]
    fn test_directory_entries_are_skipped() {
        let file = tempfile::Builder::new().suffix(".jar").tempfile().unwrap();
        let mut writer = zip::ZipWriter::new(file.reopen().unwrap());
        writer.add_directory("com/app/", FileOptions::default()).unwrap();
        writer
            .start_file("com/app/A.class", FileOptions::default())
            .unwrap();
        writer.write_all(b"aa").unwrap();
        writer.finish().unwrap();
        let container = StreamContainer::new(file.path());
        let names: Vec<String> = container
            .files()
            .unwrap()
            .map(|f| f.unwrap().relative_path().to_string())
            .collect();
        assert_eq!(names, vec!["com/app/A.class"]);
    }
}
