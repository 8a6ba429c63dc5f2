use fileemu_stream::composite::ReadError;
use fileemu_stream::{CompositeStream, StreamReader};
use std::sync::Arc;

/// A constructed emulated file handed back to the host.
///
/// Clones share the same immutable stream. Each consumer reads either with
/// positional reads or through its own [`StreamReader`].
#[derive(Debug, Clone)]
pub struct EmulatedFile {
    stream: Arc<CompositeStream>,
}

impl EmulatedFile {
    pub fn new(stream: CompositeStream) -> Self {
        Self {
            stream: Arc::new(stream),
        }
    }

    pub fn len(&self) -> u64 {
        self.stream.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stream.is_empty()
    }

    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, ReadError> {
        CompositeStream::read_at(&self.stream, offset, buf)
    }

    /// Opens a new cursor positioned at the start of the file.
    pub fn reader(&self) -> StreamReader {
        self.stream.reader()
    }

    pub fn stream(&self) -> &Arc<CompositeStream> {
        &self.stream
    }

    /// Returns whether both handles share one stream.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.stream, &other.stream)
    }
}

impl From<CompositeStream> for EmulatedFile {
    fn from(stream: CompositeStream) -> Self {
        Self::new(stream)
    }
}
