use fileemu_stream::layout::PartitionBlock;
use std::path::Path;

/// Boxed error returned by container builders.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Block list and header produced by a container builder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerLayout {
    pub blocks: Vec<PartitionBlock>,
    pub header: Vec<u8>,
}

impl ContainerLayout {
    pub fn new(blocks: Vec<PartitionBlock>, header: Vec<u8>) -> Self {
        Self { blocks, header }
    }

    pub fn header_len(&self) -> u64 {
        self.header.len() as u64
    }
}

/// Produces the layout of a container from a source asset.
///
/// Implementations are opaque to the emulator: it only lays out whatever
/// blocks and header come back. An error means the container cannot be
/// emulated and the host should use the real file.
pub trait ContainerBuilder: Send + Sync {
    fn build(&self, source: &Path, output: &Path, route: &str) -> Result<ContainerLayout, BoxError>;

    /// Registers a mod folder as a source of replacement files.
    fn add_from_folder(&self, _mod_dir: &Path) {}
}

impl<B: ContainerBuilder + ?Sized> ContainerBuilder for std::sync::Arc<B> {
    fn build(&self, source: &Path, output: &Path, route: &str) -> Result<ContainerLayout, BoxError> {
        (**self).build(source, output, route)
    }

    fn add_from_folder(&self, mod_dir: &Path) {
        (**self).add_from_folder(mod_dir)
    }
}

/// A builder that returns the same layout for every request.
#[derive(Debug, Clone, Default)]
pub struct FixedLayout {
    layout: ContainerLayout,
}

impl FixedLayout {
    pub fn new(layout: ContainerLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ContainerLayout {
        &self.layout
    }
}

impl ContainerBuilder for FixedLayout {
    fn build(&self, _: &Path, _: &Path, _: &str) -> Result<ContainerLayout, BoxError> {
        Ok(self.layout.clone())
    }
}
