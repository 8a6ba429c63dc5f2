use crate::source::Source;
use std::cmp::min;
use std::io;

/// A synthetic, unbacked source of `len` copies of a fill byte.
///
/// Used to fill alignment gaps between blocks. It never represents real file
/// data; [`SegmentKind::Padding`](crate::SegmentKind::Padding) lets a dump
/// tell it apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaddingSource {
    fill: u8,
    len: u64,
}

impl PaddingSource {
    /// Creates zero-filled padding.
    pub const fn zeroed(len: u64) -> Self {
        Self::new(0, len)
    }

    pub const fn new(fill: u8, len: u64) -> Self {
        Self { fill, len }
    }

    #[must_use]
    pub const fn fill(&self) -> u8 {
        self.fill
    }
}

impl Source for PaddingSource {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.len {
            return Ok(0);
        }

        let n = min(buf.len() as u64, self.len - offset) as usize;

        buf[..n].fill(self.fill);

        Ok(n)
    }

    fn len(&self) -> u64 {
        self.len
    }
}
