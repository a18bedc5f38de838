//! EIP-4844 blob packing.
//!
//! A blob is 4096 field elements of 32 bytes. The two high order bits of every field element are
//! reserved, so each round of 4 field elements carries 127 bytes of payload: 4 x 31 bytes of
//! field element bodies plus 3 bytes spread over the 4 x 6 free bits of the high order bytes.
//! The first field element of round 0 additionally carries the encoding version and a 3 byte
//! big-endian payload length.

use alloy_eips::eip4844::{Blob, BYTES_PER_BLOB};
use alloy_primitives::Bytes;
use thiserror::Error;

/// The blob encoding version
pub const BLOB_ENCODING_VERSION: u8 = 0;

/// Maximum blob data size
pub const BLOB_MAX_DATA_SIZE: usize = (4 * 31 + 3) * 1024 - 4; // 130044

/// Blob Encoding/Decoding Rounds
pub const BLOB_ENCODING_ROUNDS: usize = 1024;

/// The index of the encoding version byte within the blob.
const VERSION_OFFSET: usize = 1;

/// Blob Decoding Error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlobDecodingError {
    /// A field element has one of its two high order bits set.
    #[error("Invalid field element")]
    InvalidFieldElement,
    /// The version byte does not match [BLOB_ENCODING_VERSION].
    #[error("Invalid encoding version: {0}")]
    InvalidEncodingVersion(u8),
    /// The encoded length exceeds [BLOB_MAX_DATA_SIZE].
    #[error("Invalid length: {0}")]
    InvalidLength(usize),
    /// The blob is not exactly [BYTES_PER_BLOB] bytes.
    #[error("Invalid blob size: {0}")]
    InvalidBlobSize(usize),
    /// Non-zero bytes found past the encoded payload.
    #[error("Non-zero padding")]
    NonZeroPadding,
    /// Missing Data
    #[error("Missing data")]
    MissingData,
}

/// Blob Encoding Error
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobEncodingError {
    /// The input does not fit into a single blob.
    #[error("Data too large for a single blob: {0} > {BLOB_MAX_DATA_SIZE}")]
    DataTooLarge(usize),
}

/// The Blob Data
///
/// A placeholder for one batcher payload found in an L1 block. Calldata payloads are carried
/// directly, blob payloads are filled in once the blob sidecars have been fetched.
#[derive(Default, Clone, Debug, PartialEq, Eq)]
pub struct BlobData {
    /// The blob data
    pub data: Option<Bytes>,
    /// The calldata
    pub calldata: Option<Bytes>,
}

impl BlobData {
    /// Packs `data` into a [Blob].
    pub fn encode(data: &[u8]) -> Result<Blob, BlobEncodingError> {
        if data.len() > BLOB_MAX_DATA_SIZE {
            return Err(BlobEncodingError::DataTooLarge(data.len()));
        }

        let mut encoder = BlobEncoder::new(data);
        for round in 0..BLOB_ENCODING_ROUNDS {
            if round > 0 && encoder.read_offset >= data.len() {
                break;
            }

            if round == 0 {
                // The header occupies the first 4 bytes of the first field element body.
                let len = data.len() as u32;
                encoder.buf31 = [0u8; 31];
                encoder.buf31[0] = BLOB_ENCODING_VERSION;
                encoder.buf31[1..4].copy_from_slice(&len.to_be_bytes()[1..]);
                let n = data.len().min(27);
                encoder.buf31[4..4 + n].copy_from_slice(&data[..n]);
                encoder.read_offset += n;
            } else {
                encoder.read31();
            }

            let x = encoder.read1();
            encoder.write1(x & 0b0011_1111);
            encoder.write31();

            encoder.read31();
            let y = encoder.read1();
            encoder.write1((y & 0b0000_1111) | ((x & 0b1100_0000) >> 2));
            encoder.write31();

            encoder.read31();
            let z = encoder.read1();
            encoder.write1(z & 0b0011_1111);
            encoder.write31();

            encoder.read31();
            encoder.write1(((z & 0b1100_0000) >> 2) | ((y & 0b1111_0000) >> 4));
            encoder.write31();
        }

        Ok(encoder.blob)
    }

    /// Decodes the blob into raw byte data.
    /// Returns a [BlobDecodingError] if the blob is invalid.
    pub fn decode(&self) -> Result<Bytes, BlobDecodingError> {
        let data = self.data.as_ref().ok_or(BlobDecodingError::MissingData)?;

        // Validate the blob encoding version
        let version = *data.get(VERSION_OFFSET).ok_or(BlobDecodingError::MissingData)?;
        if version != BLOB_ENCODING_VERSION {
            return Err(BlobDecodingError::InvalidEncodingVersion(version));
        }
        if data.len() != BYTES_PER_BLOB {
            return Err(BlobDecodingError::InvalidBlobSize(data.len()));
        }

        // Decode the 3 byte big endian length value into a 4 byte integer
        let length = u32::from_be_bytes([0, data[2], data[3], data[4]]) as usize;

        // Validate the length
        if length > BLOB_MAX_DATA_SIZE {
            return Err(BlobDecodingError::InvalidLength(length));
        }

        // Round 0 copies the remaining 27 bytes of the first field element
        let mut output = vec![0u8; BLOB_MAX_DATA_SIZE];
        output[0..27].copy_from_slice(&data[5..32]);

        // Process the remaining 3 field elements to complete round 0
        let mut output_pos = 28;
        let mut input_pos = 32;
        let mut encoded_byte = [0u8; 4];
        encoded_byte[0] = data[0];
        if encoded_byte[0] & 0b1100_0000 != 0 {
            return Err(BlobDecodingError::InvalidFieldElement);
        }

        for b in encoded_byte.iter_mut().skip(1) {
            let (enc, opos, ipos) =
                Self::decode_field_element(data, output_pos, input_pos, &mut output)?;
            *b = enc;
            output_pos = opos;
            input_pos = ipos;
        }

        // Reassemble the 4 by 6 bit encoded chunks into 3 bytes of output
        output_pos = Self::reassemble_bytes(output_pos, &encoded_byte, &mut output);

        // In each remaining round, decode 4 field elements (128 bytes) of the
        // input into 127 bytes of output
        for _ in 1..BLOB_ENCODING_ROUNDS {
            if output_pos >= length {
                break;
            }

            for d in &mut encoded_byte {
                let (enc, opos, ipos) =
                    Self::decode_field_element(data, output_pos, input_pos, &mut output)?;
                *d = enc;
                output_pos = opos;
                input_pos = ipos;
            }
            output_pos = Self::reassemble_bytes(output_pos, &encoded_byte, &mut output);
        }

        // Everything past the payload must be zero, in both the output and the input.
        if output.iter().skip(length).any(|b| *b != 0) {
            return Err(BlobDecodingError::NonZeroPadding);
        }
        output.truncate(length);
        if data[input_pos..].iter().any(|b| *b != 0) {
            return Err(BlobDecodingError::NonZeroPadding);
        }

        Ok(Bytes::from(output))
    }

    /// Decodes the next input field element by writing its lower 31 bytes into its
    /// appropriate place in the output and checking the high order byte is valid.
    /// Returns a [BlobDecodingError] if a field element is seen with either of its
    /// two high order bits set.
    fn decode_field_element(
        data: &[u8],
        output_pos: usize,
        input_pos: usize,
        output: &mut [u8],
    ) -> Result<(u8, usize, usize), BlobDecodingError> {
        // two highest order bits of the first byte of each field element should always be 0
        if data[input_pos] & 0b1100_0000 != 0 {
            return Err(BlobDecodingError::InvalidFieldElement);
        }
        output[output_pos..output_pos + 31].copy_from_slice(&data[input_pos + 1..input_pos + 32]);
        Ok((data[input_pos], output_pos + 32, input_pos + 32))
    }

    /// Reassemble 4 by 6 bit encoded chunks into 3 bytes of output and place them in their
    /// appropriate output positions.
    fn reassemble_bytes(mut output_pos: usize, encoded_byte: &[u8], output: &mut [u8]) -> usize {
        output_pos -= 1;
        let x = (encoded_byte[0] & 0b0011_1111) | ((encoded_byte[1] & 0b0011_0000) << 2);
        let y = (encoded_byte[1] & 0b0000_1111) | ((encoded_byte[3] & 0b0000_1111) << 4);
        let z = (encoded_byte[2] & 0b0011_1111) | ((encoded_byte[3] & 0b0011_0000) << 2);
        output[output_pos - 32] = z;
        output[output_pos - (32 * 2)] = y;
        output[output_pos - (32 * 3)] = x;
        output_pos
    }

    /// Fills in the pointers to the fetched blob bodies.
    /// There should be exactly one placeholder blobOrCalldata
    /// element for each blob, otherwise an error is returned.
    pub fn fill(&mut self, blobs: &[Box<Blob>], index: usize) -> Result<(), BlobDecodingError> {
        // Do not fill if there is no calldata to fill
        if self.calldata.as_ref().map_or(false, |data| data.is_empty()) {
            return Ok(());
        }

        let blob = blobs.get(index).ok_or(BlobDecodingError::InvalidLength(index))?;
        if blob.is_empty() {
            return Err(BlobDecodingError::MissingData);
        }

        self.data = Some(Bytes::copy_from_slice(blob.as_slice()));
        Ok(())
    }

    /// Returns if a blob is empty.
    pub const fn is_empty(&self) -> bool {
        self.data.is_none() && self.calldata.is_none()
    }

    /// Turns the blob into its inner data.
    pub fn inner(&self) -> Result<Bytes, BlobDecodingError> {
        if let Some(data) = &self.calldata {
            return Ok(data.clone());
        }
        if self.data.is_some() {
            return self.decode();
        }
        Err(BlobDecodingError::MissingData)
    }
}

/// Cursor state for [BlobData::encode].
struct BlobEncoder<'a> {
    data: &'a [u8],
    read_offset: usize,
    write_offset: usize,
    buf31: [u8; 31],
    blob: Blob,
}

impl<'a> BlobEncoder<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, read_offset: 0, write_offset: 0, buf31: [0u8; 31], blob: Blob::ZERO }
    }

    fn read1(&mut self) -> u8 {
        let Some(b) = self.data.get(self.read_offset) else {
            return 0;
        };
        self.read_offset += 1;
        *b
    }

    fn read31(&mut self) {
        self.buf31 = [0u8; 31];
        if self.read_offset >= self.data.len() {
            return;
        }
        let n = (self.data.len() - self.read_offset).min(31);
        self.buf31[..n].copy_from_slice(&self.data[self.read_offset..self.read_offset + n]);
        self.read_offset += n;
    }

    fn write1(&mut self, v: u8) {
        debug_assert_eq!(self.write_offset % 32, 0);
        debug_assert_eq!(v & 0b1100_0000, 0);
        self.blob[self.write_offset] = v;
        self.write_offset += 1;
    }

    fn write31(&mut self) {
        debug_assert_eq!(self.write_offset % 32, 1);
        self.blob[self.write_offset..self.write_offset + 31].copy_from_slice(&self.buf31);
        self.write_offset += 31;
    }
}
