use crate::entry::Entry;
use crate::error::GrexError;
use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A readable, seekable stream that can be handed to another thread.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// A byte-addressable container that resources point into.
///
/// Either a file on disk, or bytes that were already decoded from another
/// resource (an archive nested inside an archive). Cloning a `Source` is cheap.
#[derive(Clone)]
pub enum Source {
    /// A container file on disk.
    File(Arc<PathBuf>),
    /// Decoded bytes held in memory.
    Memory(Arc<[u8]>),
}

impl Source {
    /// Creates a source backed by the file at `path`. The file is not opened.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        Source::File(Arc::new(path.as_ref().to_path_buf()))
    }

    /// Creates a source backed by bytes held in memory.
    pub fn from_bytes<B: Into<Arc<[u8]>>>(bytes: B) -> Self {
        Source::Memory(bytes.into())
    }

    /// Decodes `entry` and uses its bytes as a new container.
    pub fn from_entry(entry: &Entry) -> Result<Self, GrexError> {
        Ok(Source::Memory(entry.extract()?.into()))
    }

    /// Opens a new, independent cursor positioned at the start of the container.
    ///
    /// Every call returns its own handle, so concurrent readers never share a position.
    pub fn open(&self) -> Result<Box<dyn ReadSeek>, GrexError> {
        match self {
            Source::File(path) => {
                let file = File::open(path.as_ref()).map_err(|err| match err.kind() {
                    std::io::ErrorKind::NotFound => {
                        GrexError::FileNotFound(path.display().to_string())
                    }
                    _ => GrexError::Io(err),
                })?;
                Ok(Box::new(BufReader::new(file)))
            }
            Source::Memory(bytes) => Ok(Box::new(Cursor::new(Arc::clone(bytes)))),
        }
    }

    /// Returns the live size of the container.
    ///
    /// Files are re-inspected on every call so that a container that shrank after
    /// parsing is noticed at extraction time.
    pub fn size(&self) -> Result<u64, GrexError> {
        match self {
            Source::File(path) => Ok(fs::metadata(path.as_ref())?.len()),
            Source::Memory(bytes) => Ok(bytes.len() as u64),
        }
    }

    /// Returns the path of a file backed source.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Source::File(path) => Some(path.as_path()),
            Source::Memory(_) => None,
        }
    }

    /// Returns `true` if both sources refer to the same container.
    pub fn same_container(&self, other: &Source) -> bool {
        match (self, other) {
            (Source::File(a), Source::File(b)) => a == b,
            (Source::Memory(a), Source::Memory(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::File(path) => f.debug_tuple("File").field(path.as_ref()).finish(),
            Source::Memory(bytes) => write!(f, "Memory({} bytes)", bytes.len()),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::File(path) => write!(f, "{}", path.display()),
            Source::Memory(bytes) => write!(f, "<memory: {} bytes>", bytes.len()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::SeekFrom;

    #[test]
    fn memory_cursors_are_independent() {
        let source = Source::from_bytes(vec![1u8, 2, 3, 4]);
        let mut first = source.open().unwrap();
        let mut second = source.open().unwrap();
        first.seek(SeekFrom::Start(2)).unwrap();

        let mut byte = [0u8; 1];
        second.read_exact(&mut byte).unwrap();
        assert_eq!(byte[0], 1);
        first.read_exact(&mut byte).unwrap();
        assert_eq!(byte[0], 3);
    }

    #[test]
    fn missing_file_is_reported_by_name() {
        let source = Source::from_path("/definitely/not/here.pak");
        assert!(matches!(source.open(), Err(GrexError::FileNotFound(_))));
    }
}
