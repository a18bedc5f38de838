//! Contains the shadow compressor.

use super::{ChannelCompressor, CompressorWriter, VariantCompressor};
use crate::{
    config::ChannelConfig,
    errors::{CompressorError, CompressorResult},
};
use tracing::debug;

/// The largest potential blow-up in bytes we expect to see when compressing arbitrary (e.g.
/// random) data. Accounts for a 2 byte header, 4 byte digest, 5 byte eof indicator, and then a 5
/// byte flate block header for each 16k of potential data, assuming frames of at most 128k.
const SAFE_COMPRESSION_OVERHEAD: u64 = 51;

/// The number of final bytes closing a zlib stream writes to the output buffer.
const CLOSE_OVERHEAD_ZLIB: u64 = 9;

/// Shadow Compressor
///
/// The shadow compressor contains two compression streams, one for size estimation, and one for
/// the final compressed data. The shadow stream is flushed whenever the estimate may exceed the
/// target, and the real stream isn't, which means the final compressed data is always at most
/// the size of the estimate.
///
/// One exception to the rule is the first write, which is never rejected. This allows individual
/// blocks larger than the target to be included, split across multiple frames.
#[derive(Debug)]
pub struct ShadowCompressor {
    /// The compressed size the channel aims for.
    target_output_size: u64,
    /// The stream producing the channel data.
    compressor: VariantCompressor,
    /// The stream used for size estimation.
    shadow: VariantCompressor,
    /// Flags that the buffer is full.
    is_full: bool,
    /// An upper bound on the size of the compressed data.
    bound: u64,
    /// Whether any data has been written.
    written: bool,
}

impl ShadowCompressor {
    /// Creates a new [ShadowCompressor] from two fresh streams of the same algorithm.
    pub const fn new(
        target_output_size: u64,
        compressor: VariantCompressor,
        shadow: VariantCompressor,
    ) -> Self {
        Self {
            target_output_size,
            compressor,
            shadow,
            is_full: false,
            bound: SAFE_COMPRESSION_OVERHEAD,
            written: false,
        }
    }

    /// Returns the current upper bound on the compressed size.
    pub const fn bound(&self) -> u64 {
        self.bound
    }
}

impl From<&ChannelConfig> for ShadowCompressor {
    fn from(config: &ChannelConfig) -> Self {
        let algo = config.compressor.algo;
        Self::new(
            config.target_output_size(),
            VariantCompressor::from(algo),
            VariantCompressor::from(algo),
        )
    }
}

impl CompressorWriter for ShadowCompressor {
    fn write(&mut self, data: &[u8]) -> CompressorResult<usize> {
        // If the buffer is full, error so the user can flush.
        if self.is_full {
            return Err(CompressorError::Full);
        }

        self.shadow.write(data)?;
        let mut newbound = self.bound + data.len() as u64;
        if newbound > self.target_output_size {
            // Only flush the shadow when the cheap bound may be over the target.
            self.shadow.flush()?;
            newbound = self.shadow.len() as u64 + CLOSE_OVERHEAD_ZLIB;
            if newbound > self.target_output_size {
                self.is_full = true;
                debug!(target: "compressor", "Shadow compressor full with bound {}", newbound);
                // Only error if the buffer has been written to.
                if self.written {
                    return Err(CompressorError::Full);
                }
            }
        }

        self.bound = newbound;
        self.written = true;
        self.compressor.write(data)
    }

    fn flush(&mut self) -> CompressorResult<()> {
        self.compressor.flush()
    }

    fn close(&mut self) -> CompressorResult<()> {
        self.compressor.close()
    }

    fn reset(&mut self) {
        self.compressor.reset();
        self.shadow.reset();
        self.is_full = false;
        self.bound = SAFE_COMPRESSION_OVERHEAD;
        self.written = false;
    }

    fn len(&self) -> usize {
        self.compressor.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> CompressorResult<usize> {
        self.compressor.read(buf)
    }
}

impl ChannelCompressor for ShadowCompressor {
    fn is_full(&self) -> bool {
        self.is_full
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompressionAlgo;
    use rand::{rngs::StdRng, RngCore, SeedableRng};

    fn zlib(target: u64) -> ShadowCompressor {
        ShadowCompressor::new(
            target,
            VariantCompressor::from(CompressionAlgo::Zlib),
            VariantCompressor::from(CompressionAlgo::Zlib),
        )
    }

    fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
        let mut data = vec![0u8; len];
        StdRng::seed_from_u64(seed).fill_bytes(&mut data);
        data
    }

    #[test]
    fn test_shadow_accepts_oversized_first_write() {
        let mut c = zlib(64);
        assert_eq!(c.write(&random_bytes(1_000, 1)), Ok(1_000));
        assert!(c.is_full());
        assert_eq!(c.write(&[0u8; 1]), Err(CompressorError::Full));
    }

    #[test]
    fn test_shadow_rejects_write_over_target() {
        let mut c = zlib(200);
        assert_eq!(c.write(&random_bytes(100, 2)), Ok(100));
        assert!(!c.is_full());
        assert_eq!(c.write(&random_bytes(150, 3)), Err(CompressorError::Full));
        assert!(c.is_full());

        c.close().unwrap();
        let mut out = vec![0u8; c.len()];
        c.read(&mut out).unwrap();
        let decompressed = miniz_oxide::inflate::decompress_to_vec_zlib(&out).unwrap();
        assert_eq!(decompressed, random_bytes(100, 2));
    }

    #[test]
    fn test_shadow_bound_tracks_compressible_data() {
        let mut c = zlib(1_000);
        for _ in 0..50 {
            c.write(&[0u8; 100]).unwrap();
        }
        // Highly compressible input stays under the target long past its raw size.
        assert!(!c.is_full());
        assert!(c.bound() <= 1_000);

        c.reset();
        assert_eq!(c.bound(), SAFE_COMPRESSION_OVERHEAD);
        assert!(!c.is_full());
    }
}
