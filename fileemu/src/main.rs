mod cli;

use clap::Parser;
use cli::{Cli, Command};
use fileemu::pak::{PakVersion, read_pak_entry};
use fileemu::{
    ConsoleProgress, ContainerLayout, Emulator, EmulatorConfig, FixedLayout, SilentProgress,
};
use fileemu_stream::layout::{LayoutPlan, PartitionBlock, PlannedContent};
use snafu::{ResultExt, Snafu};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Top-level application errors for fileemu.
#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to read header file '{}'", path.display()))]
    ReadHeader {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to compose '{}'", path.display()))]
    Compose {
        path: PathBuf,
        source: fileemu::CreateError,
    },

    #[snafu(display("failed to dump '{}'", path.display()))]
    Dump {
        path: PathBuf,
        source: fileemu::DumpError,
    },

    #[snafu(display("invalid layout"))]
    Plan {
        source: fileemu_stream::layout::LayoutError,
    },

    #[snafu(display("failed to open '{}'", path.display()))]
    OpenFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to probe '{}'", path.display()))]
    Probe {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("failed to read PAK entry from '{}'", path.display()))]
    PakEntry {
        path: PathBuf,
        source: fileemu::pak::OpenEntryError,
    },
}

type Result<T, E = Error> = std::result::Result<T, E>;

#[snafu::report]
fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    match cli.command {
        Command::Compose {
            blocks,
            header,
            alignment,
            output,
            quiet,
        } => cmd_compose(blocks, header.as_deref(), alignment, &output, quiet),
        Command::Plan {
            blocks,
            header_len,
            alignment,
        } => cmd_plan(&blocks, header_len, alignment),
        Command::Probe { path } => cmd_probe(&path),
        Command::PakEntry { path, offset, v2 } => cmd_pak_entry(&path, offset, v2),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_compose(
    blocks: Vec<PartitionBlock>,
    header: Option<&Path>,
    alignment: u64,
    output: &Path,
    quiet: bool,
) -> Result<()> {
    let header = match header {
        Some(path) => std::fs::read(path).context(ReadHeaderSnafu { path })?,
        None => Vec::new(),
    };

    let config = EmulatorConfig {
        extension: None,
        alignment,
        dump_dir: None,
    };
    let emulator = Emulator::new(FixedLayout::new(ContainerLayout::new(blocks, header)), config);
    let route = output.to_string_lossy();

    let file = emulator
        .try_create_emulated_file(output, output, &route)
        .context(ComposeSnafu { path: output })?;

    if !quiet {
        println!("Composing {} ({} bytes)...", output.display(), file.len());
    }

    let start = std::time::Instant::now();

    if quiet {
        fileemu::dump_stream(file.stream(), output, &SilentProgress)
            .context(DumpSnafu { path: output })?;
    } else {
        fileemu::dump_stream(file.stream(), output, &ConsoleProgress::new())
            .context(DumpSnafu { path: output })?;
        println!("Done in {:.2}s.", start.elapsed().as_secs_f64());
    }

    Ok(())
}

fn cmd_plan(blocks: &[PartitionBlock], header_len: u64, alignment: u64) -> Result<()> {
    let plan = LayoutPlan::compute(blocks, header_len, alignment).context(PlanSnafu)?;

    println!("{:<26}  {:>10}  Content", "Range", "Length");
    println!("{:-<26}  {:-<10}  {:-<30}", "", "", "");

    for segment in plan.segments() {
        let content = match &segment.content {
            PlannedContent::Block {
                index,
                os_path,
                file_offset,
            } => format!("block #{index} {} @ 0x{file_offset:X}", os_path.display()),
            PlannedContent::Padding => "padding".to_owned(),
            PlannedContent::Header => "header".to_owned(),
        };

        println!(
            "{:<26}  {:>10}  {}",
            segment.range.to_string(),
            segment.range.len(),
            content
        );
    }

    println!();
    println!("Total length:   {} bytes", plan.len());

    Ok(())
}

fn cmd_probe(path: &Path) -> Result<()> {
    let mut file = File::open(path).context(OpenFileSnafu { path })?;
    let is_awb = fileemu_formats::is_awb(&mut file).context(ProbeSnafu { path })?;

    if is_awb {
        println!("{}: AWB (AFS2)", path.display());
    } else {
        println!("{}: not an AWB file", path.display());
    }

    Ok(())
}

fn cmd_pak_entry(path: &Path, offset: u64, v2: bool) -> Result<()> {
    let version = if v2 { PakVersion::V2 } else { PakVersion::V1 };
    let entry =
        unsafe { read_pak_entry(path, offset, version).context(PakEntrySnafu { path })? };

    println!("PAK: {}", path.display());
    println!();
    println!("Version:        {:?}", entry.version());
    println!("Header Size:    {} bytes", entry.header_size());
    println!("Name:           {}", entry.file_name());
    println!("Length:         {} bytes", entry.length());

    Ok(())
}
