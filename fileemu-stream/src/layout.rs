//! Turns a block list from a container builder into a [`CompositeStream`].
//!
//! Blocks are laid out in input order. Each block after the first starts on
//! an `alignment` boundary; the gap left by the previous block is filled with
//! zero padding. The header blob follows the last block directly.
//!
//! A declared virtual start is a lower bound: a block lands at its declared
//! start or at the next aligned offset after the previous block, whichever
//! is later. Declared ranges must not overlap each other.
//!
//! ```text
//! blocks = [(a, 0, 100), (b, 100, 50)], alignment = 64, header = 10 bytes
//!
//! [  0, 100) a
//! [100, 128) padding
//! [128, 178) b
//! [178, 188) header
//! ```
use crate::composite::{self, CompositeStream};
use crate::padding::PaddingSource;
use crate::range::{InvalidRangeError, OffsetRange};
use crate::segment::Segment;
use crate::source::{FileSlice, MemorySource};
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Errors when laying out a block list.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum LayoutError {
    #[snafu(display("block alignment must be non-zero"))]
    ZeroAlignment,

    #[snafu(display(
        "block #{index} starts at {start:#x}, inside the previous block ending at {previous_end:#x}"
    ))]
    Overlap {
        index: usize,
        start: u64,
        previous_end: u64,
    },

    #[snafu(display("aligning {end:#x} to {alignment:#x} overflows"))]
    AlignmentOverflow { end: u64, alignment: u64 },

    #[snafu(display("block #{index} has an invalid range"))]
    BlockRange {
        index: usize,
        source: InvalidRangeError,
    },

    #[snafu(display("header does not fit in the virtual address space"))]
    HeaderRange { source: InvalidRangeError },

    #[snafu(display("header is {actual} bytes, the layout was planned for {expected}"))]
    HeaderMismatch { expected: u64, actual: u64 },

    #[snafu(display("cannot open backing file {} for block #{index}", path.display()))]
    OpenBacking {
        index: usize,
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display(
        "backing file {} for block #{index} holds {actual} bytes, {expected} needed",
        path.display()
    ))]
    BackingTooShort {
        index: usize,
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[snafu(display("cannot assemble the composite stream"))]
    Assemble { source: composite::NewError },
}

/// One physical block as reported by a container builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionBlock {
    /// File on disk holding the block data.
    pub os_path: PathBuf,
    /// Where the block data starts within `os_path`.
    pub file_offset: u64,
    /// Requested virtual start of the block.
    pub virtual_start: u64,
    /// Declared length. Signed because builders report it that way; negative
    /// values are rejected when the layout is computed.
    pub length: i64,
}

impl PartitionBlock {
    pub fn new(os_path: impl Into<PathBuf>, virtual_start: u64, length: i64) -> Self {
        Self {
            os_path: os_path.into(),
            file_offset: 0,
            virtual_start,
            length,
        }
    }

    /// Reads the block from `file_offset` within the backing file instead of
    /// its beginning.
    pub fn with_file_offset(mut self, file_offset: u64) -> Self {
        self.file_offset = file_offset;
        self
    }
}

/// What fills a planned segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedContent {
    /// Data of the block at `index` in the input list.
    Block {
        index: usize,
        os_path: PathBuf,
        file_offset: u64,
    },
    Padding,
    Header,
}

/// A segment of a [`LayoutPlan`], before any file has been opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSegment {
    pub range: OffsetRange,
    pub content: PlannedContent,
}

/// The computed placement of every block, padding gap and the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutPlan {
    segments: Vec<PlannedSegment>,
    header_len: u64,
    len: u64,
}

impl LayoutPlan {
    /// Computes the layout for `blocks` followed by a header of `header_len`
    /// bytes. Touches nothing on disk.
    pub fn compute(
        blocks: &[PartitionBlock],
        header_len: u64,
        alignment: u64,
    ) -> Result<Self, LayoutError> {
        ensure!(alignment != 0, ZeroAlignmentSnafu);

        let mut segments = Vec::with_capacity(blocks.len() * 2 + 1);
        let mut stream_end = 0u64;
        let mut declared_end = 0u64;

        for (index, block) in blocks.iter().enumerate() {
            let declared = OffsetRange::from_signed_length(block.virtual_start, block.length)
                .context(BlockRangeSnafu { index })?;
            let length = declared.len();

            // Declared starts are checked against each other, not against
            // the padded placement of earlier blocks.
            ensure!(
                block.virtual_start >= declared_end,
                OverlapSnafu {
                    index,
                    start: block.virtual_start,
                    previous_end: declared_end,
                }
            );

            declared_end = declared.end();

            let aligned = round_up(stream_end, alignment)?;
            let start = block.virtual_start.max(aligned);

            if start > stream_end {
                segments.push(PlannedSegment {
                    range: OffsetRange::from_start_and_length(stream_end, start - stream_end)
                        .context(BlockRangeSnafu { index })?,
                    content: PlannedContent::Padding,
                });
            }

            let range =
                OffsetRange::from_start_and_length(start, length).context(BlockRangeSnafu { index })?;

            segments.push(PlannedSegment {
                range,
                content: PlannedContent::Block {
                    index,
                    os_path: block.os_path.clone(),
                    file_offset: block.file_offset,
                },
            });

            stream_end = range.end();
        }

        if header_len != 0 {
            segments.push(PlannedSegment {
                range: OffsetRange::from_start_and_length(stream_end, header_len)
                    .context(HeaderRangeSnafu)?,
                content: PlannedContent::Header,
            });

            stream_end += header_len;
        }

        Ok(Self {
            segments,
            header_len,
            len: stream_end,
        })
    }

    pub fn segments(&self) -> &[PlannedSegment] {
        &self.segments
    }

    /// Returns the length of the stream this plan produces.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Opens every backing file and assembles the stream.
    ///
    /// `header` must be exactly as long as the length passed to
    /// [`compute()`](Self::compute).
    pub fn open(&self, header: MemorySource) -> Result<CompositeStream, LayoutError> {
        let actual = header.as_slice().len() as u64;

        ensure!(
            actual == self.header_len,
            HeaderMismatchSnafu {
                expected: self.header_len,
                actual,
            }
        );

        let mut segments = Vec::with_capacity(self.segments.len());

        for planned in &self.segments {
            let range = planned.range;

            let segment = match &planned.content {
                PlannedContent::Block {
                    index,
                    os_path,
                    file_offset,
                } => Segment::file(open_block(*index, os_path, *file_offset, range.len())?, range),
                PlannedContent::Padding => Segment::padding(PaddingSource::zeroed(range.len()), range),
                PlannedContent::Header => Segment::memory(header.clone(), range),
            };

            debug!(%range, kind = %segment.kind(), "emitting segment");

            segments.push(segment);
        }

        CompositeStream::new(segments).context(AssembleSnafu)
    }
}

/// Lays out `blocks` with the given alignment, appends `header` and opens the
/// resulting stream.
pub fn build_stream(
    blocks: &[PartitionBlock],
    header: impl Into<MemorySource>,
    alignment: u64,
) -> Result<CompositeStream, LayoutError> {
    let header = header.into();
    let plan = LayoutPlan::compute(blocks, header.as_slice().len() as u64, alignment)?;

    debug!(
        blocks = blocks.len(),
        segments = plan.segments().len(),
        len = plan.len(),
        "computed layout"
    );

    plan.open(header)
}

fn round_up(end: u64, alignment: u64) -> Result<u64, LayoutError> {
    end.checked_next_multiple_of(alignment)
        .context(AlignmentOverflowSnafu { end, alignment })
}

fn open_block(
    index: usize,
    path: &Path,
    file_offset: u64,
    len: u64,
) -> Result<FileSlice, LayoutError> {
    let file = std::fs::File::open(path).context(OpenBackingSnafu { index, path })?;
    let actual = file
        .metadata()
        .context(OpenBackingSnafu { index, path })?
        .len();
    let expected = file_offset.saturating_add(len);

    ensure!(
        actual >= expected,
        BackingTooShortSnafu {
            index,
            path,
            expected,
            actual,
        }
    );

    Ok(FileSlice::from_file(file, path, file_offset, len))
}
