//! Detection of CRI AWB (`AFS2`) audio banks.
use crate::probe::with_restored_position;
use std::io::{self, ErrorKind, Read, Seek};

/// Magic at the start of every AWB file.
pub const AFS2_MAGIC: [u8; 4] = *b"AFS2";

/// Returns whether `reader` holds an AWB file at its current position.
///
/// The position is restored before returning, including on error. A stream
/// too short to hold the magic is not an AWB file.
pub fn is_awb<R: Read + Seek + ?Sized>(reader: &mut R) -> io::Result<bool> {
    with_restored_position(reader, |reader| {
        let mut magic = [0u8; 4];

        match reader.read_exact(&mut magic) {
            Ok(()) => Ok(magic == AFS2_MAGIC),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(e),
        }
    })
}

/// Returns whether `bytes` starts with the AWB magic.
#[must_use]
pub fn has_awb_magic(bytes: &[u8]) -> bool {
    bytes.starts_with(&AFS2_MAGIC)
}
