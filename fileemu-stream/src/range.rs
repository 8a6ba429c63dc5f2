use snafu::{OptionExt, Snafu};
use std::fmt::{Display, Formatter};

/// Errors when constructing an [`OffsetRange`].
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum InvalidRangeError {
    #[snafu(display("range length {length} is negative"))]
    NegativeLength { length: i64 },

    #[snafu(display("range starting at {start:#x} with length {length:#x} overflows"))]
    Overflow { start: u64, length: u64 },
}

/// A half-open virtual byte interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OffsetRange {
    start: u64,
    length: u64,
}

impl OffsetRange {
    /// Constructs the range `[start, start + length)`.
    ///
    /// Fails if the end of the range does not fit in a `u64`.
    pub fn from_start_and_length(start: u64, length: u64) -> Result<Self, InvalidRangeError> {
        start
            .checked_add(length)
            .context(OverflowSnafu { start, length })?;

        Ok(Self { start, length })
    }

    /// Like [`from_start_and_length()`](Self::from_start_and_length) for a
    /// signed length as reported by an external builder.
    pub fn from_signed_length(start: u64, length: i64) -> Result<Self, InvalidRangeError> {
        let length = u64::try_from(length).map_err(|_| NegativeLengthSnafu { length }.build())?;

        Self::from_start_and_length(start, length)
    }

    #[must_use]
    pub const fn start(&self) -> u64 {
        self.start
    }

    /// Returns the exclusive end of the range.
    #[must_use]
    pub const fn end(&self) -> u64 {
        // Checked at construction.
        self.start + self.length
    }

    #[must_use]
    pub const fn len(&self) -> u64 {
        self.length
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns `true` iff `start <= offset < end`.
    #[must_use]
    pub const fn contains(&self, offset: u64) -> bool {
        self.start <= offset && offset < self.end()
    }
}

impl Display for OffsetRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:#x}, {:#x})", self.start, self.end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_half_open() {
        let range = OffsetRange::from_start_and_length(100, 50).unwrap();

        assert!(!range.contains(99));
        assert!(range.contains(100));
        assert!(range.contains(149));
        assert!(!range.contains(150));
        assert_eq!(range.end(), 150);
    }

    #[test]
    fn empty_range_contains_nothing() {
        let range = OffsetRange::from_start_and_length(10, 0).unwrap();

        assert!(range.is_empty());
        assert!(!range.contains(10));
    }

    #[test]
    fn overflowing_range_is_rejected() {
        assert!(matches!(
            OffsetRange::from_start_and_length(u64::MAX, 1),
            Err(InvalidRangeError::Overflow { .. })
        ));
        assert!(OffsetRange::from_start_and_length(u64::MAX - 1, 1).is_ok());
    }

    #[test]
    fn negative_length_is_rejected() {
        assert!(matches!(
            OffsetRange::from_signed_length(0, -1),
            Err(InvalidRangeError::NegativeLength { length: -1 })
        ));
        assert_eq!(OffsetRange::from_signed_length(4, 8).unwrap().end(), 12);
    }
}
