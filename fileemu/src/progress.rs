use fileemu_stream::{OffsetRange, SegmentKind};
use std::path::Path;

/// Trait for receiving dump progress updates.
///
/// All methods take `&self` so one reporter can be shared between dumps
/// running on different threads.
pub trait DumpProgress: Send + Sync {
    /// Called once before any data is written.
    fn start(&self, _path: &Path, _total: u64) {}

    /// Called when the dump reaches a new segment.
    fn segment(&self, _range: OffsetRange, _kind: SegmentKind) {}

    /// Called after each chunk is written.
    fn advance(&self, _bytes: u64) {}

    /// Called when the whole stream has been written.
    fn completed(&self, _written: u64) {}
}

/// A no-op progress implementation that discards all updates.
pub struct SilentProgress;

impl DumpProgress for SilentProgress {}

/// Console progress reporter using an indicatif byte counter.
///
/// Padding segments are listed above the bar so synthetic bytes can be told
/// apart from real data in the output.
#[cfg(feature = "cli")]
pub struct ConsoleProgress {
    bar: indicatif::ProgressBar,
}

#[cfg(feature = "cli")]
impl ConsoleProgress {
    pub fn new() -> Self {
        Self {
            bar: indicatif::ProgressBar::hidden(),
        }
    }
}

#[cfg(feature = "cli")]
impl Default for ConsoleProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "cli")]
impl DumpProgress for ConsoleProgress {
    fn start(&self, path: &Path, total: u64) {
        self.bar
            .set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_message(path.display().to_string());

        if let Ok(style) = indicatif::ProgressStyle::default_bar()
            .template("{bar:40.cyan/blue} {bytes}/{total_bytes} {msg} [{elapsed_precise}]")
        {
            self.bar.set_style(style.progress_chars("━╸─"));
        }

        self.bar.reset();
    }

    fn segment(&self, range: OffsetRange, kind: SegmentKind) {
        if kind == SegmentKind::Padding {
            self.bar.println(format!("  padding {range} ({} bytes)", range.len()));
        }
    }

    fn advance(&self, bytes: u64) {
        self.bar.inc(bytes);
    }

    fn completed(&self, written: u64) {
        self.bar.finish_and_clear();
        println!("Dump complete ({written} bytes).");
    }
}
