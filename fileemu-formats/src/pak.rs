//! Entry headers of PAK archives.
//!
//! Every entry starts with a fixed-size header holding a NUL-terminated name
//! and the length of the data that follows. Version 1 headers reserve 252
//! bytes for the name, version 2 headers 32 bytes.
//!
//! Names are stored as raw bytes and decoded on demand; nothing here owns or
//! points into unmanaged memory.
use snafu::{Snafu, ensure};
use std::borrow::Cow;
use zerocopy::byteorder::little_endian::I32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum EntryError {
    #[snafu(display("source buffer is too short"))]
    SourceTooShort,

    #[snafu(display("name is {len} bytes, at most {max} fit"))]
    NameTooLong { len: usize, max: usize },

    #[snafu(display("name contains a NUL byte"))]
    NameHasNul,
}

type Result<T, E = EntryError> = std::result::Result<T, E>;

/// Maximum name capacity of a version 1 entry, including the terminator.
pub const V1_NAME_SIZE: usize = 252;

/// Maximum name capacity of a version 2 entry, including the terminator.
pub const V2_NAME_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub(crate) struct V1EntryRaw {
    name: [u8; V1_NAME_SIZE],
    length: I32,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub(crate) struct V2EntryRaw {
    name: [u8; V2_NAME_SIZE],
    length: I32,
}

/// Common view over PAK entry headers of either version.
pub trait EntryHeader {
    /// Size of the header on disk.
    const RAW_SIZE: usize;

    /// Returns the raw name field, terminator and trailing bytes included.
    fn raw_name(&self) -> &[u8];

    /// Returns the length of the entry data as stored.
    fn length(&self) -> i32;

    /// Returns the name bytes up to the first NUL.
    fn name_bytes(&self) -> &[u8] {
        let raw = self.raw_name();
        let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());

        &raw[..end]
    }

    /// Decodes the name. Non-UTF-8 bytes are replaced.
    fn file_name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name_bytes())
    }
}

/// Fills a fixed name field, leaving room for the terminator.
fn encode_name<const N: usize>(name: &str) -> Result<[u8; N]> {
    let bytes = name.as_bytes();

    ensure!(!bytes.contains(&0), NameHasNulSnafu);
    ensure!(
        bytes.len() < N,
        NameTooLongSnafu {
            len: bytes.len(),
            max: N - 1,
        }
    );

    let mut field = [0u8; N];
    field[..bytes.len()].copy_from_slice(bytes);

    Ok(field)
}

/// A version 1 entry header: 252-byte name and a 32-bit length.
#[derive(Debug, Clone, Copy)]
#[must_use]
pub struct V1Entry {
    raw: V1EntryRaw,
}

impl V1Entry {
    /// Reads a header from the start of `raw`.
    pub fn read(raw: &[u8]) -> Result<Self> {
        let (raw, _) = V1EntryRaw::read_from_prefix(raw).map_err(|_| SourceTooShortSnafu.build())?;

        Ok(Self { raw })
    }

    /// Creates a header for `name` with `length` bytes of data.
    pub fn new(name: &str, length: i32) -> Result<Self> {
        Ok(Self {
            raw: V1EntryRaw {
                name: encode_name(name)?,
                length: I32::new(length),
            },
        })
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.raw.as_bytes()
    }
}

impl EntryHeader for V1Entry {
    const RAW_SIZE: usize = size_of::<V1EntryRaw>();

    fn raw_name(&self) -> &[u8] {
        &self.raw.name
    }

    fn length(&self) -> i32 {
        self.raw.length.get()
    }
}

/// A version 2 entry header: 32-byte name and a 32-bit length.
#[derive(Debug, Clone, Copy)]
#[must_use]
pub struct V2Entry {
    raw: V2EntryRaw,
}

impl V2Entry {
    /// Reads a header from the start of `raw`.
    pub fn read(raw: &[u8]) -> Result<Self> {
        let (raw, _) = V2EntryRaw::read_from_prefix(raw).map_err(|_| SourceTooShortSnafu.build())?;

        Ok(Self { raw })
    }

    /// Creates a header for `name` with `length` bytes of data.
    pub fn new(name: &str, length: i32) -> Result<Self> {
        Ok(Self {
            raw: V2EntryRaw {
                name: encode_name(name)?,
                length: I32::new(length),
            },
        })
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.raw.as_bytes()
    }
}

impl EntryHeader for V2Entry {
    const RAW_SIZE: usize = size_of::<V2EntryRaw>();

    fn raw_name(&self) -> &[u8] {
        &self.raw.name
    }

    fn length(&self) -> i32 {
        self.raw.length.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_sizes() {
        assert_eq!(V1Entry::RAW_SIZE, 256);
        assert_eq!(V2Entry::RAW_SIZE, 36);
    }

    #[test]
    fn name_stops_at_nul() {
        let mut raw = vec![0u8; V2Entry::RAW_SIZE];
        raw[..9].copy_from_slice(b"field.bf\0");
        raw[9..12].copy_from_slice(b"xyz");
        raw[32..36].copy_from_slice(&0x1234i32.to_le_bytes());

        let entry = V2Entry::read(&raw).unwrap();

        assert_eq!(entry.file_name(), "field.bf");
        assert_eq!(entry.length(), 0x1234);
    }

    #[test]
    fn unterminated_name_uses_full_field() {
        let raw = [b'a'; V2Entry::RAW_SIZE];
        let entry = V2Entry::read(&raw).unwrap();

        assert_eq!(entry.name_bytes().len(), V2_NAME_SIZE);
    }

    #[test]
    fn short_buffer_is_rejected() {
        assert!(matches!(
            V1Entry::read(&[0u8; 255]),
            Err(EntryError::SourceTooShort)
        ));
    }

    #[test]
    fn new_encodes_name() {
        let entry = V1Entry::new("init/script.bin", 512).unwrap();
        let parsed = V1Entry::read(entry.as_bytes()).unwrap();

        assert_eq!(parsed.file_name(), "init/script.bin");
        assert_eq!(parsed.length(), 512);
    }

    #[test]
    fn new_rejects_bad_names() {
        let long = "a".repeat(V2_NAME_SIZE);

        assert!(matches!(
            V2Entry::new(&long, 0),
            Err(EntryError::NameTooLong { len: 32, max: 31 })
        ));
        assert!(matches!(
            V2Entry::new("a\0b", 0),
            Err(EntryError::NameHasNul)
        ));
        assert!(V2Entry::new(&long[..31], 0).is_ok());
    }
}
