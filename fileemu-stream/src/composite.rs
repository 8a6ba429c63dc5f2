use crate::range::OffsetRange;
use crate::segment::{Segment, SegmentKind};
use crate::source::Source;
use snafu::{Snafu, ensure};
use std::cmp::min;
use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;
use tracing::trace;

/// Errors for [`CompositeStream::new()`].
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum NewError {
    #[snafu(display("segment #{index} starts at {actual:#x}, expected {expected:#x}"))]
    NotContiguous {
        index: usize,
        expected: u64,
        actual: u64,
    },

    #[snafu(display("segment #{index} source holds {source_len} bytes, range {range} needs more"))]
    SourceTooShort {
        index: usize,
        range: OffsetRange,
        source_len: u64,
    },
}

/// Errors when reading from a [`CompositeStream`].
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ReadError {
    #[snafu(display("segment #{index} ({kind}) at {range} ended early at local offset {offset:#x}"))]
    ShortRead {
        index: usize,
        kind: SegmentKind,
        range: OffsetRange,
        offset: u64,
    },

    #[snafu(display("cannot read segment #{index} ({kind}) at {range}"))]
    BackingIo {
        index: usize,
        kind: SegmentKind,
        range: OffsetRange,
        source: io::Error,
    },
}

impl From<ReadError> for io::Error {
    fn from(e: ReadError) -> Self {
        match e {
            ReadError::ShortRead { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, e),
            ReadError::BackingIo { .. } => io::Error::other(e),
        }
    }
}

/// Errors when moving a [`StreamReader`] cursor.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum SeekError {
    #[snafu(display("offset {offset:#x} is past the end of the stream ({len:#x})"))]
    OutOfRange { offset: u64, len: u64 },

    #[snafu(display("seek to a negative position"))]
    Negative,
}

/// A virtual stream stitched together from an ordered list of [`Segment`]s.
///
/// The segment table is immutable once built: the ranges are sorted, do not
/// overlap and cover `[0, len())` without gaps. Reads spanning several
/// segments are dispatched to each owning segment in turn.
///
/// This type holds no cursor. [`read_at()`](Self::read_at) takes `&self`, so
/// a stream shared through [`Arc`] can be read from many threads at once;
/// each consumer that wants `Read + Seek` opens its own
/// [`StreamReader`] via [`reader()`](Self::reader).
#[must_use]
pub struct CompositeStream {
    segments: Vec<Segment>,
    len: u64,
}

impl std::fmt::Debug for CompositeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeStream")
            .field("segment_count", &self.segments.len())
            .field("len", &self.len)
            .finish()
    }
}

impl CompositeStream {
    /// Builds a stream from segments sorted by virtual start.
    ///
    /// Empty segments are dropped. Fails if the remaining ranges do not tile
    /// `[0, end)` exactly, or if a source is shorter than its range.
    pub fn new(segments: Vec<Segment>) -> Result<Self, NewError> {
        let segments: Vec<Segment> = segments
            .into_iter()
            .filter(|s| !s.range().is_empty())
            .collect();

        let mut end = 0u64;

        for (index, segment) in segments.iter().enumerate() {
            let range = segment.range();
            let source_len = segment.source().len();

            ensure!(
                range.start() == end,
                NotContiguousSnafu {
                    index,
                    expected: end,
                    actual: range.start(),
                }
            );

            ensure!(
                source_len >= range.len(),
                SourceTooShortSnafu {
                    index,
                    range,
                    source_len,
                }
            );

            end = range.end();
        }

        Ok(Self { segments, len: end })
    }

    /// Returns an empty stream.
    pub fn empty() -> Self {
        Self {
            segments: Vec::new(),
            len: 0,
        }
    }

    /// Returns the total length of the stream (end of the last segment).
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the segment table in ascending virtual order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the index of the segment containing `offset`, if any.
    #[must_use]
    pub fn segment_index(&self, offset: u64) -> Option<usize> {
        if offset >= self.len {
            return None;
        }

        // Ranges are sorted and contiguous, so the first segment ending past
        // the offset is the one containing it.
        Some(self.segments.partition_point(|s| s.range().end() <= offset))
    }

    /// Reads stream data at the given virtual offset without any cursor.
    ///
    /// Returns the number of bytes read, which is less than `buf.len()` only
    /// when the end of the stream is reached. A segment whose source comes
    /// back short fails the whole read instead of moving on to the next
    /// segment.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, ReadError> {
        let mut index = match self.segment_index(offset) {
            Some(v) if !buf.is_empty() => v,
            _ => return Ok(0),
        };

        let mut copied = 0usize;
        let mut pos = offset;

        loop {
            let segment = &self.segments[index];
            let range = segment.range();
            let local = pos - range.start();
            let want = min(range.len() - local, (buf.len() - copied) as u64) as usize;

            trace!(index, %range, local, want, "dispatching read");

            segment
                .source()
                .read_exact_at(local, &mut buf[copied..copied + want])
                .map_err(|e| {
                    let kind = segment.kind();

                    if e.kind() == io::ErrorKind::UnexpectedEof {
                        ReadError::ShortRead {
                            index,
                            kind,
                            range,
                            offset: local,
                        }
                    } else {
                        ReadError::BackingIo {
                            index,
                            kind,
                            range,
                            source: e,
                        }
                    }
                })?;

            copied += want;
            pos += want as u64;

            if copied == buf.len() || pos >= self.len {
                break Ok(copied);
            }

            index += 1;
        }
    }

    /// Creates a [`StreamReader`] with its own cursor at offset 0.
    pub fn reader(self: &Arc<Self>) -> StreamReader {
        StreamReader::new(self.clone())
    }
}

impl Source for CompositeStream {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        Ok(CompositeStream::read_at(self, offset, buf)?)
    }

    fn len(&self) -> u64 {
        self.len
    }
}

/// A cursor over a shared [`CompositeStream`], implementing [`Read`] and
/// [`Seek`].
///
/// Each reader owns its position; any number of readers can exist for the
/// same stream.
pub struct StreamReader {
    stream: Arc<CompositeStream>,
    pos: u64,
}

impl std::fmt::Debug for StreamReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamReader")
            .field("stream", &self.stream)
            .field("pos", &self.pos)
            .finish()
    }
}

impl StreamReader {
    pub fn new(stream: Arc<CompositeStream>) -> Self {
        Self { stream, pos: 0 }
    }

    /// Returns the current virtual position.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn stream(&self) -> &Arc<CompositeStream> {
        &self.stream
    }

    /// Moves the cursor to `offset`.
    ///
    /// Any offset up to and including the stream length is valid.
    pub fn seek_to(&mut self, offset: u64) -> Result<u64, SeekError> {
        let len = self.stream.len();

        ensure!(offset <= len, OutOfRangeSnafu { offset, len });

        self.pos = offset;
        Ok(offset)
    }

    /// Reads at the cursor and advances it by the bytes obtained.
    pub fn read_segmented(&mut self, buf: &mut [u8]) -> Result<usize, ReadError> {
        let n = CompositeStream::read_at(&self.stream, self.pos, buf)?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl Read for StreamReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_segmented(buf)?)
    }
}

impl Seek for StreamReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let base = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.stream.len().checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };

        let result = match base {
            Some(offset) => self.seek_to(offset),
            None => Err(SeekError::Negative),
        };

        result.map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::padding::PaddingSource;
    use crate::source::MemorySource;

    fn range(start: u64, len: u64) -> OffsetRange {
        OffsetRange::from_start_and_length(start, len).unwrap()
    }

    fn sample() -> Arc<CompositeStream> {
        let segments = vec![
            Segment::memory(MemorySource::new(vec![1u8; 10]), range(0, 10)),
            Segment::padding(PaddingSource::zeroed(6), range(10, 6)),
            Segment::memory(MemorySource::new(vec![2u8; 4]), range(16, 4)),
        ];

        Arc::new(CompositeStream::new(segments).unwrap())
    }

    #[test]
    fn length_is_end_of_last_segment() {
        assert_eq!(sample().len(), 20);
        assert_eq!(CompositeStream::empty().len(), 0);
    }

    #[test]
    fn read_spans_segments() {
        let stream = sample();
        let mut buf = [0xFFu8; 12];

        assert_eq!(stream.read_at(6, &mut buf).unwrap(), 12);
        assert_eq!(&buf[..4], &[1; 4]);
        assert_eq!(&buf[4..10], &[0; 6]);
        assert_eq!(&buf[10..], &[2; 2]);
    }

    #[test]
    fn read_stops_at_end() {
        let stream = sample();
        let mut buf = [0u8; 8];

        assert_eq!(stream.read_at(18, &mut buf).unwrap(), 2);
        assert_eq!(stream.read_at(20, &mut buf).unwrap(), 0);
        assert_eq!(stream.read_at(1000, &mut buf).unwrap(), 0);
    }

    #[test]
    fn segment_lookup_uses_boundaries() {
        let stream = sample();

        assert_eq!(stream.segment_index(0), Some(0));
        assert_eq!(stream.segment_index(9), Some(0));
        assert_eq!(stream.segment_index(10), Some(1));
        assert_eq!(stream.segment_index(16), Some(2));
        assert_eq!(stream.segment_index(20), None);
    }

    #[test]
    fn gaps_are_rejected() {
        let segments = vec![
            Segment::memory(MemorySource::new(vec![0u8; 4]), range(0, 4)),
            Segment::memory(MemorySource::new(vec![0u8; 4]), range(8, 4)),
        ];

        assert!(matches!(
            CompositeStream::new(segments),
            Err(NewError::NotContiguous {
                index: 1,
                expected: 4,
                actual: 8
            })
        ));
    }

    #[test]
    fn short_sources_are_rejected() {
        let segments = vec![Segment::memory(
            MemorySource::new(vec![0u8; 3]),
            range(0, 4),
        )];

        assert!(matches!(
            CompositeStream::new(segments),
            Err(NewError::SourceTooShort { index: 0, .. })
        ));
    }

    #[test]
    fn empty_segments_are_dropped() {
        let segments = vec![
            Segment::memory(MemorySource::new(vec![0u8; 4]), range(0, 4)),
            Segment::padding(PaddingSource::zeroed(0), range(4, 0)),
            Segment::memory(MemorySource::new(vec![0u8; 4]), range(4, 4)),
        ];

        let stream = CompositeStream::new(segments).unwrap();
        assert_eq!(stream.segments().len(), 2);
    }

    #[test]
    fn seek_bounds() {
        let mut reader = sample().reader();

        assert_eq!(reader.seek_to(20).unwrap(), 20);
        assert!(matches!(
            reader.seek_to(21),
            Err(SeekError::OutOfRange { offset: 21, len: 20 })
        ));
        assert_eq!(reader.position(), 20);

        assert_eq!(reader.seek(SeekFrom::End(-4)).unwrap(), 16);
        assert_eq!(reader.seek(SeekFrom::Current(-6)).unwrap(), 10);

        let err = reader.seek(SeekFrom::Current(-11)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let err = reader.seek(SeekFrom::End(1)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn reader_advances_cursor() {
        let mut reader = sample().reader();
        let mut buf = [0u8; 7];

        assert_eq!(reader.read(&mut buf).unwrap(), 7);
        assert_eq!(reader.position(), 7);
        assert_eq!(reader.read(&mut buf).unwrap(), 7);
        assert_eq!(&buf[..3], &[1; 3]);
        assert_eq!(&buf[3..], &[0; 4]);

        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, vec![0, 0, 2, 2, 2, 2]);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    /// A source that advertises more bytes than it can deliver.
    struct Truncated;

    impl Source for Truncated {
        fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
            let n = min(buf.len() as u64, 2u64.saturating_sub(offset)) as usize;
            buf[..n].fill(9);
            Ok(n)
        }

        fn len(&self) -> u64 {
            8
        }
    }

    #[test]
    fn short_backing_read_fails() {
        let segments = vec![
            Segment::new(Truncated, range(0, 8), SegmentKind::Other),
            Segment::memory(MemorySource::new(vec![3u8; 4]), range(8, 4)),
        ];
        let stream = Arc::new(CompositeStream::new(segments).unwrap());
        let mut buf = [0u8; 12];

        assert!(matches!(
            CompositeStream::read_at(&stream, 0, &mut buf),
            Err(ReadError::ShortRead { index: 0, .. })
        ));

        let err = stream.reader().read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);

        // Reads that stay inside the delivered prefix still succeed.
        assert_eq!(stream.read_at(0, &mut buf[..2]).unwrap(), 2);
    }

    #[test]
    fn composites_nest() {
        let inner = sample();
        let outer = CompositeStream::new(vec![
            Segment::new(inner, range(0, 20), SegmentKind::Other),
            Segment::memory(MemorySource::new(vec![5u8; 2]), range(20, 2)),
        ])
        .unwrap();
        let mut buf = [0u8; 4];

        assert_eq!(outer.read_at(18, &mut buf).unwrap(), 4);
        assert_eq!(buf, [2, 2, 5, 5]);
    }
}
