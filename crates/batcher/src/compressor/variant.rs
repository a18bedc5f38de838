//! A variant over the supported compression streams.

use super::{BrotliCompressor, CompressorWriter, ZlibCompressor};
use crate::{config::CompressionAlgo, errors::CompressorResult};

/// The variant compressor wraps the brotli and zlib compressor types, implementing the
/// [CompressorWriter] trait itself.
#[derive(Debug)]
pub enum VariantCompressor {
    /// The brotli compressor.
    Brotli(BrotliCompressor),
    /// The zlib compressor.
    Zlib(ZlibCompressor),
}

impl From<CompressionAlgo> for VariantCompressor {
    fn from(algo: CompressionAlgo) -> Self {
        match algo.brotli_quality() {
            Some(quality) => Self::Brotli(BrotliCompressor::new(quality)),
            None => Self::Zlib(ZlibCompressor::new()),
        }
    }
}

impl CompressorWriter for VariantCompressor {
    fn write(&mut self, data: &[u8]) -> CompressorResult<usize> {
        match self {
            Self::Brotli(compressor) => compressor.write(data),
            Self::Zlib(compressor) => compressor.write(data),
        }
    }

    fn flush(&mut self) -> CompressorResult<()> {
        match self {
            Self::Brotli(compressor) => compressor.flush(),
            Self::Zlib(compressor) => compressor.flush(),
        }
    }

    fn close(&mut self) -> CompressorResult<()> {
        match self {
            Self::Brotli(compressor) => compressor.close(),
            Self::Zlib(compressor) => compressor.close(),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::Brotli(compressor) => compressor.reset(),
            Self::Zlib(compressor) => compressor.reset(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Brotli(compressor) => compressor.len(),
            Self::Zlib(compressor) => compressor.len(),
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> CompressorResult<usize> {
        match self {
            Self::Brotli(compressor) => compressor.read(buf),
            Self::Zlib(compressor) => compressor.read(buf),
        }
    }
}
