//! The `blob` subcommands.

use crate::cli::read_hex_lines;
use alloy_primitives::hex;
use anyhow::Result;
use clap::{Args, Subcommand};
use ferry_primitives::BlobData;
use std::path::PathBuf;

/// The `blob` subcommands.
#[derive(Debug, Clone, Subcommand)]
pub(crate) enum BlobCommand {
    /// Pack each hex payload into a blob.
    Encode(BlobArgs),
    /// Unpack each hex blob into its payload.
    Decode(BlobArgs),
}

/// Arguments of the `blob` subcommands.
#[derive(Debug, Clone, Args)]
pub(crate) struct BlobArgs {
    /// A file of hex strings, one per line.
    #[clap(long, short = 'i')]
    pub input: PathBuf,
}

impl BlobCommand {
    /// Runs the subcommand, returning one hex string per input line.
    pub(crate) fn run(&self) -> Result<Vec<String>> {
        match self {
            Self::Encode(args) => read_hex_lines(&args.input)?
                .iter()
                .map(|payload| Ok(hex::encode_prefixed(BlobData::encode(payload)?)))
                .collect(),
            Self::Decode(args) => read_hex_lines(&args.input)?
                .into_iter()
                .map(|blob| Ok(hex::encode_prefixed(decode_blob(blob)?)))
                .collect(),
        }
    }
}

fn decode_blob(blob: Vec<u8>) -> Result<Vec<u8>> {
    let data = BlobData { data: Some(blob.into()), calldata: None };
    Ok(data.decode()?.to_vec())
}
