use std::cmp::min;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Backing data for a segment, with positional read support.
///
/// This trait provides thread-safe, stateless access to the bytes behind a
/// segment. Unlike `Read + Seek`, each call specifies its own offset, enabling
/// concurrent reads from multiple threads without synchronization.
///
/// Offsets are local to the source: `0` is the first byte of the source, not
/// of the composite stream it is bound into.
pub trait Source: Send + Sync {
    /// Reads bytes from the source at the given offset into `buf`.
    ///
    /// Returns the number of bytes actually read. A short read indicates
    /// the end of the source was reached.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Reads exactly `buf.len()` bytes from the source at `offset`.
    ///
    /// Returns [`io::ErrorKind::UnexpectedEof`] if the source ends before the
    /// buffer is filled.
    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let mut total = 0;

        while total < buf.len() {
            let n = self.read_at(offset + total as u64, &mut buf[total..])?;

            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "unexpected EOF in source",
                ));
            }

            total += n;
        }

        Ok(())
    }

    /// Returns the total length of the source in bytes.
    fn len(&self) -> u64;

    /// Returns `true` if the source is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<S: Source + ?Sized> Source for Arc<S> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_at(offset, buf)
    }

    fn len(&self) -> u64 {
        (**self).len()
    }
}

impl<S: Source + ?Sized> Source for &S {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_at(offset, buf)
    }

    fn len(&self) -> u64 {
        (**self).len()
    }
}

impl<S: Source + ?Sized> Source for Box<S> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_at(offset, buf)
    }

    fn len(&self) -> u64 {
        (**self).len()
    }
}

/// Copies from `data` at `offset`, clamped to the end of `data`.
fn copy_from_slice_at(data: &[u8], offset: u64, buf: &mut [u8]) -> usize {
    if offset >= data.len() as u64 {
        return 0;
    }

    let start = offset as usize;
    let n = min(buf.len(), data.len() - start);

    buf[..n].copy_from_slice(&data[start..start + n]);

    n
}

/// An owned in-memory blob, e.g. a header produced by a container builder.
///
/// Reads are pure slice indexing: no locks, no state.
#[derive(Clone)]
pub struct MemorySource {
    data: Arc<[u8]>,
}

impl MemorySource {
    pub fn new(data: impl Into<Arc<[u8]>>) -> Self {
        Self { data: data.into() }
    }

    /// Returns the whole blob.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for MemorySource {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl From<&[u8]> for MemorySource {
    fn from(data: &[u8]) -> Self {
        Self::new(data)
    }
}

impl From<Arc<[u8]>> for MemorySource {
    fn from(data: Arc<[u8]>) -> Self {
        Self { data }
    }
}

impl std::fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySource")
            .field("len", &self.data.len())
            .finish()
    }
}

impl Source for MemorySource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        Ok(copy_from_slice_at(&self.data, offset, buf))
    }

    fn len(&self) -> u64 {
        self.data.len() as u64
    }
}

impl Source for [u8] {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        Ok(copy_from_slice_at(self, offset, buf))
    }

    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }
}

impl Source for Vec<u8> {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        Ok(copy_from_slice_at(self, offset, buf))
    }

    fn len(&self) -> u64 {
        Vec::len(self) as u64
    }
}

/// A window `[offset, offset + len)` of a file on disk.
///
/// The slice owns its file handle and reads with positional I/O, so the OS
/// cursor of the handle is never touched and concurrent reads need no lock.
///
/// The window is clamped to what the caller declared, not to the file size:
/// if the file is shorter than the window, reads past its end come back short
/// and the composite stream reports them as backing read failures.
pub struct FileSlice {
    file: File,
    path: PathBuf,
    offset: u64,
    len: u64,
}

impl FileSlice {
    /// Opens `path` for reading and exposes `len` bytes starting at `offset`.
    pub fn open(path: impl AsRef<Path>, offset: u64, len: u64) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;

        Ok(Self::from_file(file, path, offset, len))
    }

    /// Wraps an already opened file.
    pub fn from_file(file: File, path: impl Into<PathBuf>, offset: u64, len: u64) -> Self {
        Self {
            file,
            path: path.into(),
            offset,
            len,
        }
    }

    /// Returns the path the slice was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the offset of the window within the file.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }
}

impl std::fmt::Debug for FileSlice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSlice")
            .field("path", &self.path)
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl Source for FileSlice {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || offset >= self.len {
            return Ok(0);
        }

        let n = min(buf.len() as u64, self.len - offset) as usize;
        let file_offset = self.offset.checked_add(offset).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("offset {offset:#x} past window at {:#x} overflows", self.offset),
            )
        })?;

        positional_read(&self.file, file_offset, &mut buf[..n])
    }

    fn len(&self) -> u64 {
        self.len
    }
}

#[cfg(unix)]
fn positional_read(file: &File, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;

    loop {
        match file.read_at(buf, offset) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            r => break r,
        }
    }
}

#[cfg(windows)]
fn positional_read(file: &File, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;

    // seek_read moves the handle's cursor, but nothing else observes it.
    loop {
        match file.seek_read(buf, offset) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            r => break r,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn memory_source_clamps_to_end() {
        let src = MemorySource::new(vec![1u8, 2, 3, 4]);
        let mut buf = [0u8; 8];

        assert_eq!(src.read_at(2, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[3, 4]);
        assert_eq!(src.read_at(4, &mut buf).unwrap(), 0);
        assert_eq!(src.read_at(100, &mut buf).unwrap(), 0);
    }

    #[test]
    fn read_exact_at_reports_eof() {
        let src = MemorySource::new(vec![0u8; 4]);
        let mut buf = [0u8; 5];

        let err = src.read_exact_at(0, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn file_slice_reads_window() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();

        let slice = FileSlice::open(file.path(), 3, 4).unwrap();
        let mut buf = [0u8; 10];

        assert_eq!(slice.len(), 4);
        assert_eq!(slice.read_at(0, &mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"3456");
        assert_eq!(slice.read_at(2, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"56");
        assert_eq!(slice.read_at(4, &mut buf).unwrap(), 0);
    }

    #[test]
    fn file_slice_past_file_end_is_short() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();

        let slice = FileSlice::open(file.path(), 0, 10).unwrap();
        let mut buf = [0u8; 10];

        let err = slice.read_exact_at(0, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn file_slice_offset_overflow_is_an_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let slice = FileSlice::open(file.path(), u64::MAX, 4).unwrap();
        let mut buf = [0u8; 4];

        let err = slice.read_at(1, &mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn shared_sources_forward() {
        let src: Arc<dyn Source> = Arc::new(MemorySource::new(vec![7u8; 3]));
        let borrowed = &src;
        let mut buf = [0u8; 3];

        borrowed.read_exact_at(0, &mut buf).unwrap();
        assert_eq!(buf, [7, 7, 7]);
        assert_eq!(Source::len(borrowed), 3);
    }
}
