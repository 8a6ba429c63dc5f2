//! Reading PAK entry headers from files on disk.
use fileemu_formats::pak::{EntryError, EntryHeader, V1Entry, V2Entry};
use snafu::{ResultExt, Snafu, ensure};
use std::borrow::Cow;
use std::path::Path;

/// Errors that can occur when reading a PAK entry header from disk.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum OpenEntryError {
    #[snafu(display("failed to open file"))]
    OpenFile { source: std::io::Error },

    #[snafu(display("failed to memory map file"))]
    MmapFile { source: std::io::Error },

    #[snafu(display("offset {offset:#x} is past the end of the file ({len:#x} bytes)"))]
    OffsetOutOfRange { offset: u64, len: u64 },

    #[snafu(display("failed to parse entry header"))]
    ParseEntry { source: EntryError },
}

/// Header layout of a PAK archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PakVersion {
    V1,
    V2,
}

/// An entry header of either version.
#[derive(Debug, Clone, Copy)]
pub enum PakEntry {
    V1(V1Entry),
    V2(V2Entry),
}

impl PakEntry {
    /// Parses the header at the start of `raw`.
    pub fn parse(raw: &[u8], version: PakVersion) -> Result<Self, EntryError> {
        Ok(match version {
            PakVersion::V1 => Self::V1(V1Entry::read(raw)?),
            PakVersion::V2 => Self::V2(V2Entry::read(raw)?),
        })
    }

    pub fn version(&self) -> PakVersion {
        match self {
            Self::V1(_) => PakVersion::V1,
            Self::V2(_) => PakVersion::V2,
        }
    }

    pub fn file_name(&self) -> Cow<'_, str> {
        match self {
            Self::V1(e) => e.file_name(),
            Self::V2(e) => e.file_name(),
        }
    }

    pub fn length(&self) -> i32 {
        match self {
            Self::V1(e) => e.length(),
            Self::V2(e) => e.length(),
        }
    }

    /// Size of the header on disk.
    pub fn header_size(&self) -> usize {
        match self {
            Self::V1(_) => V1Entry::RAW_SIZE,
            Self::V2(_) => V2Entry::RAW_SIZE,
        }
    }
}

/// Reads the entry header at `offset` in the PAK file at `path`.
///
/// The header is copied out of a read-only memory map before returning.
///
/// # Safety
///
/// The caller must ensure the file is not truncated while this function runs.
pub unsafe fn read_pak_entry(
    path: &Path,
    offset: u64,
    version: PakVersion,
) -> Result<PakEntry, OpenEntryError> {
    let file = std::fs::File::open(path).context(OpenFileSnafu)?;
    let raw = unsafe { memmap2::Mmap::map(&file).context(MmapFileSnafu)? };
    let len = raw.len() as u64;

    ensure!(offset <= len, OffsetOutOfRangeSnafu { offset, len });

    PakEntry::parse(&raw[offset as usize..], version).context(ParseEntrySnafu)
}
