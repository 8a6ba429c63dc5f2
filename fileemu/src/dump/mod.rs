mod error;

pub use self::error::DumpError;

use self::error::{
    CreateDirectoryFailedSnafu, CreateFileFailedSnafu, ReadFailedSnafu, UnexpectedEndSnafu,
    WriteFailedSnafu,
};
use crate::progress::DumpProgress;
use fileemu_stream::CompositeStream;
use snafu::{ResultExt, ensure};
use std::fs::{File, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

const CHUNK_SIZE: usize = 64 * 1024;

/// Writes the full contents of `stream` to a real file at `path`.
///
/// Data is copied segment by segment in fixed-size chunks using positional
/// reads, so the stream may be read concurrently by other consumers while it
/// is dumped. Returns the number of bytes written.
pub fn dump_stream<P: DumpProgress + ?Sized>(
    stream: &CompositeStream,
    path: impl AsRef<Path>,
    progress: &P,
) -> Result<u64, DumpError> {
    let path = path.as_ref();

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent).context(CreateDirectoryFailedSnafu { path: parent })?;
    }

    let file = File::create(path).context(CreateFileFailedSnafu { path })?;
    let mut out = BufWriter::new(file);
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut written = 0u64;

    progress.start(path, stream.len());

    for segment in stream.segments() {
        let range = segment.range();
        progress.segment(range, segment.kind());

        let mut offset = range.start();

        while offset < range.end() {
            let want = (range.end() - offset).min(CHUNK_SIZE as u64) as usize;
            let n = stream
                .read_at(offset, &mut buf[..want])
                .context(ReadFailedSnafu { offset })?;

            ensure!(
                n != 0,
                UnexpectedEndSnafu {
                    offset,
                    len: stream.len(),
                }
            );

            out.write_all(&buf[..n])
                .context(WriteFailedSnafu { path })?;

            offset += n as u64;
            written += n as u64;
            progress.advance(n as u64);
        }
    }

    out.flush().context(WriteFailedSnafu { path })?;

    info!(path = %path.display(), written, "dumped emulated file");
    progress.completed(written);

    Ok(written)
}
