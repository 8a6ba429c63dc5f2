//! On-disk structures of the container formats handled by `fileemu`.
//!
//! - [`pak`]: fixed-size PAK entry headers (version 1 and 2)
//! - [`awb`]: AFS2 magic detection for AWB audio banks

pub mod awb;
pub mod pak;
pub mod probe;

pub use self::awb::{AFS2_MAGIC, is_awb};
pub use self::pak::{EntryHeader, V1Entry, V2Entry};
