//! This module contains the [Frame] type and its wire codec.

use crate::params::{
    ChannelID, CHANNEL_ID_LENGTH, DERIVATION_VERSION_0, FRAME_OVERHEAD, FRAME_V0_OVERHEAD,
    MAX_FRAME_LEN,
};
use thiserror::Error;

/// An error returned when parsing frames from L1 transaction data.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameParseError {
    /// The input is shorter than the fixed frame header.
    #[error("Frame too short to decode: {0} bytes")]
    TooShort(usize),
    /// The frame data length exceeds [MAX_FRAME_LEN].
    #[error("Frame data too large: {0} bytes")]
    DataTooLarge(usize),
    /// The frame data length runs past the end of the input.
    #[error("Frame data length {declared} exceeds remaining {remaining} bytes")]
    DataOutOfBounds {
        /// The length field of the frame.
        declared: usize,
        /// The bytes left after the header.
        remaining: usize,
    },
    /// The `is_last` byte is neither 0 nor 1.
    #[error("Invalid is_last flag: {0}")]
    InvalidIsLast(u8),
    /// The transaction data is empty.
    #[error("No frames to parse")]
    NoData,
    /// The derivation version byte is not supported.
    #[error("Unsupported derivation version: {0}")]
    UnsupportedVersion(u8),
}

/// A channel frame is a segment of a channel's data.
///
/// *Encoding*
/// frame = `channel_id ++ frame_number ++ frame_data_length ++ frame_data ++ is_last`
/// * channel_id        = bytes16
/// * frame_number      = uint16
/// * frame_data_length = uint32
/// * frame_data        = bytes
/// * is_last           = bool
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    /// The channel this frame belongs to.
    pub id: ChannelID,
    /// The index of the frame within its channel.
    pub number: u16,
    /// The data within the frame.
    pub data: Vec<u8>,
    /// Whether or not the frame is the last in the sequence.
    pub is_last: bool,
}

impl Frame {
    /// Creates a new [Frame].
    pub const fn new(id: ChannelID, number: u16, data: Vec<u8>, is_last: bool) -> Self {
        Self { id, number, data, is_last }
    }

    /// Encode the frame into a byte vector.
    pub fn encode(&self) -> Vec<u8> {
        let mut encoded = Vec::with_capacity(FRAME_V0_OVERHEAD + self.data.len());
        encoded.extend_from_slice(&self.id);
        encoded.extend_from_slice(&self.number.to_be_bytes());
        encoded.extend_from_slice(&(self.data.len() as u32).to_be_bytes());
        encoded.extend_from_slice(&self.data);
        encoded.push(self.is_last as u8);
        encoded
    }

    /// Decode a frame from the front of `encoded`, returning the number of bytes consumed.
    pub fn decode(encoded: &[u8]) -> Result<(usize, Self), FrameParseError> {
        if encoded.len() < FRAME_V0_OVERHEAD {
            return Err(FrameParseError::TooShort(encoded.len()));
        }

        let mut id = [0u8; CHANNEL_ID_LENGTH];
        id.copy_from_slice(&encoded[..CHANNEL_ID_LENGTH]);
        let number = u16::from_be_bytes([encoded[16], encoded[17]]);
        let data_len =
            u32::from_be_bytes([encoded[18], encoded[19], encoded[20], encoded[21]]) as usize;

        if data_len > MAX_FRAME_LEN {
            return Err(FrameParseError::DataTooLarge(data_len));
        }
        let remaining = encoded.len() - FRAME_V0_OVERHEAD;
        if data_len > remaining {
            return Err(FrameParseError::DataOutOfBounds { declared: data_len, remaining });
        }

        let data = encoded[22..22 + data_len].to_vec();
        let is_last = match encoded[22 + data_len] {
            0 => false,
            1 => true,
            b => return Err(FrameParseError::InvalidIsLast(b)),
        };
        Ok((FRAME_V0_OVERHEAD + data_len, Self { id, number, data, is_last }))
    }

    /// Parses the on chain serialization of frame(s) in an L1 transaction. Only version 0 of the
    /// serialization format is supported. All frames must be parsed without error, there must
    /// not be any left over data and there must be at least one frame.
    ///
    /// Frames are stored in L1 transactions with the following format:
    /// * `data = DerivationVersion0 ++ Frame(s)` Where there is one or more frames concatenated
    ///   together.
    pub fn parse_frames(encoded: &[u8]) -> Result<Vec<Self>, FrameParseError> {
        let (version, data) = encoded.split_first().ok_or(FrameParseError::NoData)?;
        if *version != DERIVATION_VERSION_0 {
            return Err(FrameParseError::UnsupportedVersion(*version));
        }
        if data.is_empty() {
            return Err(FrameParseError::NoData);
        }

        let mut frames = Vec::new();
        let mut offset = 0;
        while offset < data.len() {
            let (frame_length, frame) = Self::decode(&data[offset..])?;
            frames.push(frame);
            offset += frame_length;
        }

        Ok(frames)
    }

    /// Calculates the size of the frame + overhead for storing the frame. The sum of the frame
    /// sizes of each frame in a channel determines the channel's size. The sum of the channel
    /// sizes is used for pruning & compared against the max channel bank size.
    pub fn size(&self) -> usize {
        self.data.len() + FRAME_OVERHEAD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_frame_roundtrip() {
        let frame = Frame { id: [0xFF; 16], number: 0xEE, data: vec![0xDD; 50], is_last: true };

        let encoded = frame.encode();
        assert_eq!(encoded.len(), FRAME_V0_OVERHEAD + 50);
        let (consumed, frame_decoded) = Frame::decode(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(frame, frame_decoded);
    }

    #[test]
    fn test_decode_many() {
        let frame = Frame { id: [0xFF; 16], number: 0xEE, data: vec![0xDD; 50], is_last: true };
        let mut bytes = vec![DERIVATION_VERSION_0];
        (0..5).for_each(|_| bytes.extend_from_slice(&frame.encode()));

        let frames = Frame::parse_frames(bytes.as_slice()).unwrap();
        assert_eq!(frames.len(), 5);
        assert!(frames.iter().all(|f| *f == frame));
    }

    #[test]
    fn test_decode_truncated_header() {
        assert_eq!(Frame::decode(&[0u8; 10]), Err(FrameParseError::TooShort(10)));
    }

    #[test]
    fn test_decode_length_past_end() {
        let frame = Frame { id: [0x01; 16], number: 1, data: vec![0xAA; 8], is_last: false };
        let mut encoded = frame.encode();
        encoded.truncate(encoded.len() - 4);
        assert_eq!(
            Frame::decode(&encoded),
            Err(FrameParseError::DataOutOfBounds { declared: 8, remaining: 4 })
        );
    }

    #[test]
    fn test_decode_oversized_frame() {
        let mut encoded = Frame::default().encode();
        encoded[18..22].copy_from_slice(&((MAX_FRAME_LEN + 1) as u32).to_be_bytes());
        assert_eq!(Frame::decode(&encoded), Err(FrameParseError::DataTooLarge(MAX_FRAME_LEN + 1)));
    }

    #[test]
    fn test_decode_bad_is_last() {
        let mut encoded = Frame::default().encode();
        *encoded.last_mut().unwrap() = 2;
        assert_eq!(Frame::decode(&encoded), Err(FrameParseError::InvalidIsLast(2)));
    }

    #[test]
    fn test_parse_frames_trailing_garbage() {
        let frame = Frame { id: [0x01; 16], number: 0, data: vec![0xAA; 4], is_last: true };
        let mut bytes = vec![DERIVATION_VERSION_0];
        bytes.extend_from_slice(&frame.encode());
        bytes.extend_from_slice(&[0xBE, 0xEF]);
        assert_eq!(Frame::parse_frames(&bytes), Err(FrameParseError::TooShort(2)));
    }

    #[test]
    fn test_parse_frames_bad_version() {
        assert_eq!(Frame::parse_frames(&[1, 2, 3]), Err(FrameParseError::UnsupportedVersion(1)));
        assert_eq!(Frame::parse_frames(&[]), Err(FrameParseError::NoData));
        assert_eq!(Frame::parse_frames(&[DERIVATION_VERSION_0]), Err(FrameParseError::NoData));
    }

    #[test]
    fn test_frame_size() {
        let frame = Frame { data: vec![0; 10], ..Default::default() };
        assert_eq!(frame.size(), 10 + FRAME_OVERHEAD);
    }
}
