//! Module for the CLI.

use crate::{batch::BatchCommand, blob::BlobCommand, decode::DecodeCommand};
use alloy_primitives::hex;
use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::de::DeserializeOwned;
use std::{fs, io::Write, path::Path};
use tracing::Level;

/// Main CLI
#[derive(Parser, Clone, Debug)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Verbosity level (0-4)
    #[arg(long, short, help = "Verbosity level (0-4)", action = ArgAction::Count)]
    pub v: u8,
    /// The subcommand to run.
    #[clap(subcommand)]
    pub subcommand: FerrySubcommand,
}

/// Subcommands for the CLI.
#[derive(Debug, Clone, Subcommand)]
pub(crate) enum FerrySubcommand {
    /// Pack L2 blocks into batcher transaction payloads.
    Batch(BatchCommand),
    /// Reassemble channels from batcher transaction payloads and print their batches.
    Decode(DecodeCommand),
    /// Pack payloads into blobs or unpack them.
    #[clap(subcommand)]
    Blob(BlobCommand),
}

impl Cli {
    /// Initializes telemetry for the application.
    pub(crate) fn init_telemetry(self) -> Result<Self> {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_max_level(match self.v {
                0 => Level::ERROR,
                1 => Level::WARN,
                2 => Level::INFO,
                3 => Level::DEBUG,
                _ => Level::TRACE,
            })
            .finish();
        tracing::subscriber::set_global_default(subscriber).map_err(|e| anyhow!(e))?;
        Ok(self)
    }

    /// Runs the subcommand, printing its output lines to stdout.
    pub(crate) fn run(&self) -> Result<()> {
        let lines = match &self.subcommand {
            FerrySubcommand::Batch(cmd) => cmd.run()?,
            FerrySubcommand::Decode(cmd) => cmd.run()?,
            FerrySubcommand::Blob(cmd) => cmd.run()?,
        };
        let mut stdout = std::io::stdout().lock();
        for line in lines {
            writeln!(stdout, "{line}")?;
        }
        Ok(())
    }
}

/// Reads a JSON file.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&file).with_context(|| format!("parsing {}", path.display()))
}

/// Reads a JSON file, or returns the default value if no path is given.
pub(crate) fn read_json_or_default<T: DeserializeOwned + Default>(
    path: Option<&Path>,
) -> Result<T> {
    path.map_or_else(|| Ok(T::default()), read_json::<T>)
}

/// Reads a file of hex strings, one per line. Empty lines are skipped.
pub(crate) fn read_hex_lines(path: &Path) -> Result<Vec<Vec<u8>>> {
    let file = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_hex_lines(&file)
}

/// Parses hex strings, one per line, with or without a `0x` prefix.
pub(crate) fn parse_hex_lines(input: &str) -> Result<Vec<Vec<u8>>> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(i, line)| {
            hex::decode(line).with_context(|| format!("invalid hex on line {}", i + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_lines() {
        let lines = parse_hex_lines("0x0102\n\n  ff \n").unwrap();
        assert_eq!(lines, vec![vec![1, 2], vec![0xFF]]);
        assert!(parse_hex_lines("0x01\nzz").is_err());
    }

    #[test]
    fn test_verbosity_flag() {
        let cli = Cli::parse_from(["ferry", "-vvv", "decode", "--input", "payloads.txt"]);
        assert_eq!(cli.v, 3);
        assert!(matches!(cli.subcommand, FerrySubcommand::Decode(_)));
    }
}
