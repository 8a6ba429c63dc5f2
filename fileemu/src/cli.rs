use clap::{Parser, Subcommand};
use fileemu_stream::layout::PartitionBlock;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "fileemu")]
#[command(about = "Compose and inspect emulated archive files", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (overridden by RUST_LOG)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Lay out blocks and a header into one file
    Compose {
        /// Block backed by a file, may be repeated
        #[arg(long = "block", value_name = "PATH:START:LEN", required = true, value_parser = parse_block)]
        blocks: Vec<PartitionBlock>,

        /// File holding the trailing header
        #[arg(long, value_name = "FILE")]
        header: Option<PathBuf>,

        /// Alignment of every block after the first
        #[arg(long, default_value = "0x800", value_parser = parse_number)]
        alignment: u64,

        /// Where to write the composed file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Print the segment table without opening any file
    Plan {
        /// Block backed by a file, may be repeated
        #[arg(long = "block", value_name = "PATH:START:LEN", required = true, value_parser = parse_block)]
        blocks: Vec<PartitionBlock>,

        /// Length of the trailing header
        #[arg(long, default_value = "0", value_parser = parse_number)]
        header_len: u64,

        /// Alignment of every block after the first
        #[arg(long, default_value = "0x800", value_parser = parse_number)]
        alignment: u64,
    },

    /// Check whether a file is an AWB (AFS2) audio bank
    Probe {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },

    /// Print the PAK entry header at an offset
    PakEntry {
        #[arg(value_name = "FILE")]
        path: PathBuf,

        /// Offset of the header
        #[arg(long, default_value = "0", value_parser = parse_number)]
        offset: u64,

        /// Use the 32-byte name layout
        #[arg(long)]
        v2: bool,
    },
}

/// Parses a decimal or `0x`-prefixed hexadecimal number.
pub fn parse_number(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };

    parsed.map_err(|e| format!("invalid number '{s}': {e}"))
}

/// Parses `PATH:START:LEN`. The path may itself contain colons.
pub fn parse_block(s: &str) -> Result<PartitionBlock, String> {
    let mut parts = s.rsplitn(3, ':');
    let (Some(len), Some(start), Some(path)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("expected PATH:START:LEN, got '{s}'"));
    };

    if path.is_empty() {
        return Err(format!("missing path in '{s}'"));
    }

    let len = parse_number(len)?;
    let len = i64::try_from(len).map_err(|_| format!("length {len} is too large"))?;

    Ok(PartitionBlock::new(path, parse_number(start)?, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers() {
        assert_eq!(parse_number("2048"), Ok(2048));
        assert_eq!(parse_number("0x800"), Ok(0x800));
        assert!(parse_number("0xZZ").is_err());
    }

    #[test]
    fn blocks_split_from_the_right() {
        let block = parse_block("C:\\mods\\chunk.ucas:0x100:64").unwrap();

        assert_eq!(block.os_path, PathBuf::from("C:\\mods\\chunk.ucas"));
        assert_eq!(block.virtual_start, 0x100);
        assert_eq!(block.length, 64);
    }

    #[test]
    fn malformed_blocks() {
        assert!(parse_block("chunk.ucas:64").is_err());
        assert!(parse_block(":0:64").is_err());
        assert!(parse_block("a:0:-1").is_err());
    }

    #[test]
    fn cli_parses() {
        let cli = Cli::try_parse_from([
            "fileemu", "-vv", "compose", "--block", "a.bin:0:100", "--block", "b.bin:100:50",
            "--alignment", "64", "-o", "out.utoc",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Compose {
                blocks, alignment, ..
            } => {
                assert_eq!(blocks.len(), 2);
                assert_eq!(alignment, 64);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
