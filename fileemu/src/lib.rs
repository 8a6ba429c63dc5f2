//! Emulation of game archive files backed by composite virtual streams.
//!
//! A host that intercepts file opens asks an [`Emulator`] for a replacement
//! file. The emulator asks its [`ContainerBuilder`] for a block layout and a
//! header, lays them out into a [`CompositeStream`](fileemu_stream::CompositeStream)
//! and caches the result per path in an [`EmulationCache`].
//!
//! # Example
//!
//! ```no_run
//! use fileemu::{ContainerLayout, Emulator, EmulatorConfig, FixedLayout};
//! use fileemu_stream::layout::PartitionBlock;
//! use std::path::Path;
//!
//! let layout = ContainerLayout::new(
//!     vec![PartitionBlock::new("chunk0.ucas", 0, 0x1000)],
//!     vec![0u8; 0x40],
//! );
//! let emulator = Emulator::new(FixedLayout::new(layout), EmulatorConfig::default());
//!
//! if let Some(file) = emulator.try_create_file(Path::new("Paks/mod.utoc"), "Paks/mod.utoc") {
//!     println!("emulated {} bytes", file.len());
//! }
//! ```
//!
//! # Recursion
//!
//! Reading a backing file may itself trigger the host's interception for the
//! same path. The cache holds a placeholder while a path is built, and such
//! re-entrant requests get `None` so the host opens the real file.

pub mod builder;
pub mod cache;
pub mod dump;
pub mod emulator;
pub mod file;
pub mod pak;
pub mod progress;

pub use self::builder::{BoxError, ContainerBuilder, ContainerLayout, FixedLayout};
pub use self::cache::{CacheKey, Claim, EmulationCache, Lookup};
pub use self::dump::{DumpError, dump_stream};
pub use self::emulator::{CreateError, Emulator, EmulatorConfig};
pub use self::file::EmulatedFile;
pub use self::progress::{DumpProgress, SilentProgress};

#[cfg(feature = "cli")]
pub use self::progress::ConsoleProgress;
