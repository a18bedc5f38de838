//! Contains the [BatchReader], which decompresses channel data and reads batches out of it.

use super::{Batch, BatchDecodingError};
use crate::{
    params::{
        CHANNEL_VERSION_BROTLI, ZLIB_DEFLATE_COMPRESSION_METHOD, ZLIB_RESERVED_COMPRESSION_METHOD,
    },
    RollupConfig,
};
use alloy_primitives::Bytes;
use alloy_rlp::Decodable;
use miniz_oxide::inflate::{decompress_to_vec_zlib_with_limit, TINFLStatus};
use std::io::Read;
use thiserror::Error;
use tracing::debug;

/// An error decompressing channel data.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompressionError {
    /// The channel holds no data.
    #[error("Channel data is empty")]
    EmptyChannel,
    /// The first byte does not name a known compression scheme.
    #[error("Unsupported compression type: {0:#04x}")]
    UnsupportedCompression(u8),
    /// Brotli compressed data was found before Fjord.
    #[error("Brotli compressed channel before Fjord activation")]
    BrotliNotActive,
    /// The zlib stream is malformed.
    #[error("Invalid zlib stream")]
    Zlib,
    /// The brotli stream is malformed.
    #[error("Invalid brotli stream")]
    Brotli,
}

/// Decompresses the data of a channel, reading at most `limit` bytes of output.
///
/// The compression scheme is selected by the first byte: a zlib CMF byte (compression method 8
/// or 15), or [CHANNEL_VERSION_BROTLI] followed by a brotli stream. Output past the limit is
/// silently cut off.
pub fn decompress_channel(
    data: &[u8],
    limit: usize,
    brotli_enabled: bool,
) -> Result<Vec<u8>, DecompressionError> {
    let first = *data.first().ok_or(DecompressionError::EmptyChannel)?;
    let method = first & 0x0F;
    if method == ZLIB_DEFLATE_COMPRESSION_METHOD || method == ZLIB_RESERVED_COMPRESSION_METHOD {
        return match decompress_to_vec_zlib_with_limit(data, limit) {
            Ok(out) => Ok(out),
            Err(e) if e.status == TINFLStatus::HasMoreOutput => Ok(e.output),
            Err(_) => Err(DecompressionError::Zlib),
        };
    }
    if first == CHANNEL_VERSION_BROTLI {
        if !brotli_enabled {
            return Err(DecompressionError::BrotliNotActive);
        }
        let mut out = Vec::new();
        brotli::Decompressor::new(&data[1..], 4096)
            .take(limit as u64)
            .read_to_end(&mut out)
            .map_err(|_| DecompressionError::Brotli)?;
        return Ok(out);
    }
    Err(DecompressionError::UnsupportedCompression(first))
}

/// Batch Reader provides a function that iteratively consumes batches from the reader.
/// The L1Inclusion block is also provided at creation time.
/// Warning: the batch reader can read every batch-type.
/// The caller of the batch-reader should filter the results.
#[derive(Debug)]
pub struct BatchReader {
    /// The raw data to decode.
    data: Option<Vec<u8>>,
    /// Decompressed data.
    decompressed: Vec<u8>,
    /// The current cursor in the `decompressed` data.
    cursor: usize,
    /// The maximum RLP bytes per channel.
    max_rlp_bytes_per_channel: usize,
    /// Whether brotli compressed channels are accepted.
    brotli_enabled: bool,
}

impl BatchReader {
    /// Creates a new [BatchReader] from the given data and max decompressed RLP bytes per channel.
    pub fn new<T>(data: T, max_rlp_bytes_per_channel: usize) -> Self
    where
        T: Into<Vec<u8>>,
    {
        Self {
            data: Some(data.into()),
            decompressed: Vec::new(),
            cursor: 0,
            max_rlp_bytes_per_channel,
            brotli_enabled: true,
        }
    }

    /// Creates a new [BatchReader] with the limits in effect at the given L1 origin timestamp.
    pub fn for_origin<T>(data: T, cfg: &RollupConfig, origin_timestamp: u64) -> Self
    where
        T: Into<Vec<u8>>,
    {
        let mut reader = Self::new(data, cfg.max_rlp_bytes_per_channel(origin_timestamp) as usize);
        reader.brotli_enabled = cfg.is_fjord_active(origin_timestamp);
        reader
    }

    /// Returns the next batch, or [None] once the channel is exhausted.
    pub fn next_batch(&mut self, cfg: &RollupConfig) -> Result<Option<Batch>, BatchDecodingError> {
        // Decompress the data on the first call.
        if let Some(data) = self.data.take() {
            self.decompressed =
                decompress_channel(&data, self.max_rlp_bytes_per_channel, self.brotli_enabled)?;
            debug!(
                target: "batch-reader",
                "decompressed {} channel bytes into {}",
                data.len(),
                self.decompressed.len()
            );
        }

        if self.cursor >= self.decompressed.len() {
            return Ok(None);
        }

        // Every batch is an RLP string holding `batch_type ++ batch_data`.
        let mut buf = &self.decompressed[self.cursor..];
        let batch_data = Bytes::decode(&mut buf).map_err(BatchDecodingError::Rlp)?;
        self.cursor = self.decompressed.len() - buf.len();

        Batch::decode(&mut batch_data.as_ref(), cfg).map(Some)
    }
}
