use crate::builder::{BoxError, ContainerBuilder};
use crate::cache::EmulationCache;
use crate::dump::dump_stream;
use crate::file::EmulatedFile;
use crate::progress::SilentProgress;
use fileemu_stream::layout::{LayoutError, build_stream};
use snafu::{OptionExt, ResultExt, Snafu};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Errors that can occur when creating an emulated file.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum CreateError {
    #[snafu(display("{} is already being built or has been built", path.display()))]
    CacheConflict { path: PathBuf },

    #[snafu(display("container builder failed for {}", path.display()))]
    BuildFailed { path: PathBuf, source: BoxError },

    #[snafu(display("cannot lay out {}", path.display()))]
    Layout { path: PathBuf, source: LayoutError },
}

/// Settings of an [`Emulator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmulatorConfig {
    /// Extension of the files to emulate, matched case-insensitively. `None`
    /// accepts every path.
    pub extension: Option<String>,

    /// Alignment of every block after the first.
    pub alignment: u64,

    /// Directory that receives a copy of every newly built file.
    pub dump_dir: Option<PathBuf>,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            extension: Some(".utoc".to_owned()),
            alignment: 0x800,
            dump_dir: None,
        }
    }
}

/// Builds emulated files on behalf of a host and caches them per path.
pub struct Emulator<B> {
    builder: B,
    cache: Arc<EmulationCache>,
    config: EmulatorConfig,
}

impl<B: ContainerBuilder> Emulator<B> {
    pub fn new(builder: B, config: EmulatorConfig) -> Self {
        Self::with_cache(builder, Arc::default(), config)
    }

    /// Creates an emulator that shares `cache` with other components.
    pub fn with_cache(builder: B, cache: Arc<EmulationCache>, config: EmulatorConfig) -> Self {
        Self {
            builder,
            cache,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<EmulationCache> {
        &self.cache
    }

    pub fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    /// Returns whether `path` has the configured extension.
    pub fn accepts(&self, path: &Path) -> bool {
        let Some(ext) = &self.config.extension else {
            return true;
        };

        path.to_string_lossy()
            .to_lowercase()
            .ends_with(&ext.to_lowercase())
    }

    /// Entry point for the host's file-open interception.
    ///
    /// Returns `None` whenever the host should open the real file instead:
    /// the extension does not match, the path is still being built (a read of
    /// a backing file led back here), or construction failed.
    pub fn try_create_file(&self, path: &Path, route: &str) -> Option<EmulatedFile> {
        if let Some(file) = self.cache.get(path) {
            debug!(path = %path.display(), "serving cached emulated file");
            return Some(file);
        }

        if !self.accepts(path) {
            return None;
        }

        match self.try_create_emulated_file(path, path, route) {
            Ok(file) => Some(file),
            Err(CreateError::CacheConflict { .. }) => {
                debug!(path = %path.display(), "skipping re-entrant request");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %snafu::Report::from_error(e), "falling back to the real file");
                None
            }
        }
    }

    /// Builds the emulated file for `output` from `source`.
    ///
    /// Claims the cache slot for `output` first and fails with
    /// [`CreateError::CacheConflict`] if it is taken. On any later failure
    /// the slot is released so the path can be retried. If `output` is
    /// invalidated while it is built, the new file is returned but not cached.
    pub fn try_create_emulated_file(
        &self,
        source: &Path,
        output: &Path,
        route: &str,
    ) -> Result<EmulatedFile, CreateError> {
        let claim = self
            .cache
            .try_begin(output)
            .context(CacheConflictSnafu { path: output })?;

        // An early return drops the claim, which releases the slot.
        let file = self.build(source, output, route)?;

        if claim.complete(file.clone()) {
            info!(path = %output.display(), len = file.len(), "created emulated file");
        } else {
            debug!(path = %output.display(), "invalidated during construction, not cached");
        }

        Ok(file)
    }

    fn build(&self, source: &Path, output: &Path, route: &str) -> Result<EmulatedFile, CreateError> {
        let layout = self
            .builder
            .build(source, output, route)
            .context(BuildFailedSnafu { path: output })?;

        debug!(
            path = %output.display(),
            blocks = layout.blocks.len(),
            header_len = layout.header_len(),
            "container layout ready"
        );

        let stream = build_stream(&layout.blocks, layout.header, self.config.alignment)
            .context(LayoutSnafu { path: output })?;
        let file = EmulatedFile::new(stream);

        if let Some(dir) = &self.config.dump_dir {
            self.dump(dir, output, &file);
        }

        Ok(file)
    }

    /// Dump failures are logged and never fail construction.
    fn dump(&self, dir: &Path, output: &Path, file: &EmulatedFile) {
        let Some(name) = output.file_name() else {
            warn!(path = %output.display(), "cannot dump a path without a file name");
            return;
        };
        let target = dir.join(name);

        if let Err(e) = dump_stream(file.stream(), &target, &SilentProgress) {
            warn!(path = %target.display(), error = %snafu::Report::from_error(e), "dump failed");
        }
    }

    /// Drops the cached file for `path` so the next request rebuilds it.
    pub fn invalidate(&self, path: &Path) -> bool {
        self.cache.invalidate(path)
    }

    /// Forwards a mod folder to the container builder.
    pub fn on_mod_loading(&self, mod_dir: &Path) {
        info!(dir = %mod_dir.display(), "registering mod folder");
        self.builder.add_from_folder(mod_dir);
    }
}

impl<B> std::fmt::Debug for Emulator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emulator")
            .field("cache_entries", &self.cache.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::FixedLayout;

    #[test]
    fn default_config() {
        let config = EmulatorConfig::default();

        assert_eq!(config.extension.as_deref(), Some(".utoc"));
        assert_eq!(config.alignment, 0x800);
        assert!(config.dump_dir.is_none());
    }

    #[test]
    fn extension_match_ignores_case() {
        let emulator = Emulator::new(FixedLayout::default(), EmulatorConfig::default());

        assert!(emulator.accepts(Path::new("Paks/global.UTOC")));
        assert!(!emulator.accepts(Path::new("Paks/global.ucas")));

        let any = Emulator::new(
            FixedLayout::default(),
            EmulatorConfig {
                extension: None,
                ..EmulatorConfig::default()
            },
        );
        assert!(any.accepts(Path::new("whatever.bin")));
    }
}
