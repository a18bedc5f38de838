//! Contains the streaming brotli compressor.

use super::CompressorWriter;
use crate::errors::{CompressorError, CompressorResult};
use ferry_primitives::params::CHANNEL_VERSION_BROTLI;
use spin::Mutex;
use std::{io::Write, sync::Arc};

/// The brotli window size, in bits.
const BROTLI_LGWIN: u32 = 24;

/// The internal buffer size of the brotli encoder.
const BROTLI_BUFFER_SIZE: usize = 4096;

/// The output sink of the brotli encoder, shared so that compressed bytes can be drained while
/// the stream is still open.
#[derive(Debug, Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// A streaming brotli compressor.
///
/// The output starts with the [CHANNEL_VERSION_BROTLI] byte that marks brotli channels.
pub struct BrotliCompressor {
    /// The brotli quality level.
    quality: u32,
    /// The encoder, dropped once the stream is finished.
    writer: Option<brotli::CompressorWriter<SharedBuffer>>,
    /// Compressed bytes not yet read.
    compressed: SharedBuffer,
}

impl core::fmt::Debug for BrotliCompressor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BrotliCompressor")
            .field("quality", &self.quality)
            .field("compressed", &self.len())
            .field("closed", &self.writer.is_none())
            .finish()
    }
}

impl BrotliCompressor {
    /// Creates a new [BrotliCompressor] with the given quality level.
    pub fn new(quality: u32) -> Self {
        let compressed = SharedBuffer::default();
        compressed.0.lock().push(CHANNEL_VERSION_BROTLI);
        let writer = brotli::CompressorWriter::new(
            compressed.clone(),
            BROTLI_BUFFER_SIZE,
            quality,
            BROTLI_LGWIN,
        );
        Self { quality, writer: Some(writer), compressed }
    }
}

impl CompressorWriter for BrotliCompressor {
    fn write(&mut self, data: &[u8]) -> CompressorResult<usize> {
        let writer = self.writer.as_mut().ok_or(CompressorError::Closed)?;
        writer.write_all(data).map_err(|e| CompressorError::Brotli(e.kind()))?;
        Ok(data.len())
    }

    fn flush(&mut self) -> CompressorResult<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.flush().map_err(|e| CompressorError::Brotli(e.kind())),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> CompressorResult<()> {
        // Dropping the encoder finishes the stream into the shared buffer.
        drop(self.writer.take());
        Ok(())
    }

    fn reset(&mut self) {
        *self = Self::new(self.quality);
    }

    fn len(&self) -> usize {
        self.compressed.0.lock().len()
    }

    fn read(&mut self, buf: &mut [u8]) -> CompressorResult<usize> {
        let mut compressed = self.compressed.0.lock();
        let n = buf.len().min(compressed.len());
        buf[..n].copy_from_slice(&compressed[..n]);
        compressed.drain(..n);
        Ok(n)
    }
}
