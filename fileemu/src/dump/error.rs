use fileemu_stream::composite::ReadError;
use snafu::Snafu;
use std::path::PathBuf;

/// Errors that can occur while dumping a virtual stream to disk.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(super)))]
#[non_exhaustive]
pub enum DumpError {
    #[snafu(display("cannot create directory {}", path.display()))]
    CreateDirectoryFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("cannot create file {}", path.display()))]
    CreateFileFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("cannot read virtual offset {offset:#x}"))]
    ReadFailed { offset: u64, source: ReadError },

    #[snafu(display("stream ended at {offset:#x} before its declared length {len:#x}"))]
    UnexpectedEnd { offset: u64, len: u64 },

    #[snafu(display("cannot write to {}", path.display()))]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}
