//! A library for composing virtual streams out of heterogeneous sources.
//!
//! A [`CompositeStream`] presents an ordered list of [`Segment`]s as one
//! contiguous, seekable byte stream. Segments can be slices of files on disk,
//! in-memory blobs such as generated headers, synthetic padding, or other
//! composite streams. Nothing is materialized: every read is dispatched to
//! the segments it covers.
//!
//! # Features
//!
//! - Reads spanning any number of segments
//! - Alignment-driven padding between blocks via [`layout`]
//! - Thread-safe: the segment table is immutable and all reads use
//!   positional I/O (`read_at`); cursors live in per-consumer
//!   [`StreamReader`]s
//!
//! # Example
//!
//! ```no_run
//! use fileemu_stream::layout::{PartitionBlock, build_stream};
//! use std::io::Read;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let blocks = [
//!     PartitionBlock::new("a.bin", 0, 100),
//!     PartitionBlock::new("b.bin", 100, 50),
//! ];
//! let stream = Arc::new(build_stream(&blocks, vec![0u8; 10], 64)?);
//! assert_eq!(stream.len(), 188);
//!
//! let mut contents = Vec::new();
//! stream.reader().read_to_end(&mut contents)?;
//! # Ok(())
//! # }
//! ```

pub mod composite;
pub mod layout;
pub mod padding;
pub mod range;
pub mod segment;
pub mod source;

pub use self::composite::{CompositeStream, StreamReader};
pub use self::padding::PaddingSource;
pub use self::range::OffsetRange;
pub use self::segment::{Segment, SegmentKind};
pub use self::source::{FileSlice, MemorySource, Source};
