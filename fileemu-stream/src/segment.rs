use crate::padding::PaddingSource;
use crate::range::OffsetRange;
use crate::source::{FileSlice, MemorySource, Source};
use std::fmt::{Display, Formatter};

/// Where the bytes of a segment come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// A slice of a file on disk.
    File,
    /// Synthetic fill bytes between blocks.
    Padding,
    /// An in-memory blob such as a generated header.
    Memory,
    /// Anything else, e.g. another composite stream.
    Other,
}

impl Display for SegmentKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::File => "file",
            Self::Padding => "padding",
            Self::Memory => "memory",
            Self::Other => "other",
        };

        f.write_str(name)
    }
}

/// Binds one backing source to the virtual range it occupies.
///
/// The source is owned by the segment and dropped together with the
/// composite stream. To bind a source owned elsewhere, pass an `Arc` of it.
pub struct Segment {
    source: Box<dyn Source>,
    range: OffsetRange,
    kind: SegmentKind,
}

impl Segment {
    /// Binds `source` to `range`.
    ///
    /// The source must be able to satisfy reads covering `[0, range.len())`
    /// in its own coordinates; otherwise reads through the composite stream
    /// fail with a short read.
    pub fn new(source: impl Source + 'static, range: OffsetRange, kind: SegmentKind) -> Self {
        Self {
            source: Box::new(source),
            range,
            kind,
        }
    }

    pub fn file(source: FileSlice, range: OffsetRange) -> Self {
        Self::new(source, range, SegmentKind::File)
    }

    pub fn padding(source: PaddingSource, range: OffsetRange) -> Self {
        Self::new(source, range, SegmentKind::Padding)
    }

    pub fn memory(source: MemorySource, range: OffsetRange) -> Self {
        Self::new(source, range, SegmentKind::Memory)
    }

    #[must_use]
    pub fn range(&self) -> OffsetRange {
        self.range
    }

    #[must_use]
    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    /// Returns the backing source.
    pub fn source(&self) -> &dyn Source {
        self.source.as_ref()
    }
}

impl std::fmt::Debug for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("range", &self.range)
            .field("kind", &self.kind)
            .field("source_len", &self.source.len())
            .finish()
    }
}
