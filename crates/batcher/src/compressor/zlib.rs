//! Contains the streaming zlib compressor.

use super::CompressorWriter;
use crate::errors::{CompressorError, CompressorResult};
use miniz_oxide::{
    deflate::{
        core::{create_comp_flags_from_zip_params, CompressorOxide},
        stream::deflate,
    },
    MZError, MZFlush, MZStatus,
};

/// The best compression.
const BEST_ZLIB_COMPRESSION: i32 = 9;

/// A positive window size makes the stream carry a zlib header and checksum.
const ZLIB_WINDOW_BITS: i32 = 15;

/// The size of the scratch buffer compressed output is staged in.
const CHUNK_SIZE: usize = 4096;

/// A streaming zlib compressor.
pub struct ZlibCompressor {
    /// The deflate state.
    deflater: Box<CompressorOxide>,
    /// Compressed bytes not yet read.
    compressed: Vec<u8>,
    /// Whether the stream has been finished.
    closed: bool,
}

impl core::fmt::Debug for ZlibCompressor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ZlibCompressor")
            .field("compressed", &self.compressed.len())
            .field("closed", &self.closed)
            .finish()
    }
}

impl Default for ZlibCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl ZlibCompressor {
    /// Creates a new [ZlibCompressor] at the best compression level.
    pub fn new() -> Self {
        let flags = create_comp_flags_from_zip_params(BEST_ZLIB_COMPRESSION, ZLIB_WINDOW_BITS, 0);
        Self {
            deflater: Box::new(CompressorOxide::new(flags)),
            compressed: Vec::new(),
            closed: false,
        }
    }

    /// Runs the deflater over `input` until it is consumed and the flush mode is satisfied.
    fn deflate(&mut self, mut input: &[u8], flush: MZFlush) -> CompressorResult<()> {
        let mut chunk = [0u8; CHUNK_SIZE];
        loop {
            let res = deflate(&mut self.deflater, input, &mut chunk, flush);
            self.compressed.extend_from_slice(&chunk[..res.bytes_written]);
            input = &input[res.bytes_consumed..];
            match res.status {
                Ok(MZStatus::StreamEnd) => return Ok(()),
                Ok(_) if input.is_empty() && res.bytes_written < CHUNK_SIZE => return Ok(()),
                Ok(_) => continue,
                // No progress was possible; everything is already in the output.
                Err(MZError::Buf) => return Ok(()),
                Err(e) => return Err(CompressorError::Zlib(e)),
            }
        }
    }
}

impl CompressorWriter for ZlibCompressor {
    fn write(&mut self, data: &[u8]) -> CompressorResult<usize> {
        if self.closed {
            return Err(CompressorError::Closed);
        }
        self.deflate(data, MZFlush::None)?;
        Ok(data.len())
    }

    fn flush(&mut self) -> CompressorResult<()> {
        if self.closed {
            return Ok(());
        }
        self.deflate(&[], MZFlush::Sync)
    }

    fn close(&mut self) -> CompressorResult<()> {
        if self.closed {
            return Ok(());
        }
        self.deflate(&[], MZFlush::Finish)?;
        self.closed = true;
        Ok(())
    }

    fn reset(&mut self) {
        self.deflater.reset();
        self.compressed.clear();
        self.closed = false;
    }

    fn len(&self) -> usize {
        self.compressed.len()
    }

    fn read(&mut self, buf: &mut [u8]) -> CompressorResult<usize> {
        let n = buf.len().min(self.compressed.len());
        buf[..n].copy_from_slice(&self.compressed[..n]);
        self.compressed.drain(..n);
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use miniz_oxide::inflate::decompress_to_vec_zlib;

    fn read_all(c: &mut impl CompressorWriter) -> Vec<u8> {
        let mut out = vec![0u8; c.len()];
        let n = c.read(&mut out).unwrap();
        out.truncate(n);
        out
    }

    #[test]
    fn test_zlib_stream_roundtrip() {
        let mut c = ZlibCompressor::new();
        c.write(b"hello ").unwrap();
        c.write(b"world").unwrap();
        c.close().unwrap();
        assert_eq!(c.write(b"!"), Err(CompressorError::Closed));

        let compressed = read_all(&mut c);
        assert_eq!(compressed[0] & 0x0F, 8);
        assert_eq!(decompress_to_vec_zlib(&compressed).unwrap(), b"hello world");
        assert_eq!(c.len(), 0);
    }

    #[test]
    fn test_zlib_flush_exposes_output() {
        let mut c = ZlibCompressor::new();
        c.write(&[7u8; 64]).unwrap();
        c.flush().unwrap();
        let flushed = c.len();
        assert!(flushed > 0);

        // Partial reads drain from the front.
        let mut head = [0u8; 2];
        assert_eq!(c.read(&mut head).unwrap(), 2);
        assert_eq!(c.len(), flushed - 2);
    }

    #[test]
    fn test_zlib_large_input() {
        let data: Vec<u8> =
            (0..100_000u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 24) as u8).collect();
        let mut c = ZlibCompressor::new();
        c.write(&data).unwrap();
        c.close().unwrap();
        assert_eq!(decompress_to_vec_zlib(&read_all(&mut c)).unwrap(), data);
    }

    #[test]
    fn test_zlib_reset() {
        let mut c = ZlibCompressor::new();
        c.write(b"discarded").unwrap();
        c.close().unwrap();
        c.reset();
        assert_eq!(c.len(), 0);
        c.write(b"kept").unwrap();
        c.close().unwrap();
        assert_eq!(decompress_to_vec_zlib(&read_all(&mut c)).unwrap(), b"kept");
    }
}
