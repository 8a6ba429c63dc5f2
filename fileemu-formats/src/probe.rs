use std::io::{self, Seek, SeekFrom};

/// Runs `probe` against `reader` and seeks back to where it started.
///
/// The position is restored whether the probe succeeds or fails. A probe
/// error takes precedence over a failure to restore.
pub fn with_restored_position<R, T, F>(reader: &mut R, probe: F) -> io::Result<T>
where
    R: Seek + ?Sized,
    F: FnOnce(&mut R) -> io::Result<T>,
{
    let start = reader.stream_position()?;
    let result = probe(reader);
    let restored = reader.seek(SeekFrom::Start(start));

    let value = result?;
    restored?;

    Ok(value)
}
