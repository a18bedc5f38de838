//! This module contains the parameters and identifying types for the derivation pipeline.

/// Count the tagging info as 200 in terms of buffer size.
pub const FRAME_OVERHEAD: usize = 200;

/// The version of the derivation pipeline.
pub const DERIVATION_VERSION_0: u8 = 0;

/// The length of a channel ID.
pub const CHANNEL_ID_LENGTH: usize = 16;

/// [ChannelID] is an opaque identifier for a channel.
pub type ChannelID = [u8; CHANNEL_ID_LENGTH];

/// The fixed size of an encoded frame around its data: `16 + 2 + 4 + 1`.
pub const FRAME_V0_OVERHEAD: usize = CHANNEL_ID_LENGTH + 2 + 4 + 1;

/// Frames cannot be larger than 1MB.
///
/// Data transactions that carry frames are generally not larger than 128 KB due to L1 network
/// conditions, but we leave space to grow larger anyway (gas limit allows for more data).
pub const MAX_FRAME_LEN: usize = 1_000_000;

/// MAX_CHANNEL_BANK_SIZE is the amount of memory space, in number of bytes,
/// till the bank is pruned by removing channels, starting with the oldest channel.
pub const MAX_CHANNEL_BANK_SIZE: usize = 100_000_000;

/// [MAX_CHANNEL_BANK_SIZE] after the Fjord hardfork.
pub const FJORD_MAX_CHANNEL_BANK_SIZE: usize = 1_000_000_000;

/// The maximum amount of bytes that will be read from a channel.
pub const MAX_RLP_BYTES_PER_CHANNEL: u64 = 10_000_000;

/// [MAX_RLP_BYTES_PER_CHANNEL] after the Fjord hardfork.
pub const FJORD_MAX_RLP_BYTES_PER_CHANNEL: u64 = 100_000_000;

/// The maximum sequencer drift after the Fjord hardfork, in seconds.
pub const FJORD_MAX_SEQUENCER_DRIFT: u64 = 1800;

/// The maximum number of elements in a span batch section. Also bounds the byte length of a
/// span batch bitfield.
pub const MAX_SPAN_BATCH_ELEMENTS: u64 = 10_000_000;

/// The first byte of an EIP-2718 deposit transaction.
pub const DEPOSIT_TX_TYPE: u8 = 0x7E;

/// Zlib compression method `deflate` with a 32K window.
pub const ZLIB_DEFLATE_COMPRESSION_METHOD: u8 = 8;

/// Reserved zlib compression method.
pub const ZLIB_RESERVED_COMPRESSION_METHOD: u8 = 15;

/// The channel version byte prefixing brotli compressed channels.
pub const CHANNEL_VERSION_BROTLI: u8 = 1;
