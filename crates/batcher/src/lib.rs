#![doc = include_str!("../README.md")]
#![warn(missing_debug_implementations, missing_docs, unreachable_pub, rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

/// Re-export commonly used types and traits.
pub mod prelude {
    pub use crate::{
        channel::{ChannelOut, FrameId, TxData},
        compressor::{BatchCompressor, ChannelCompressor, CompressorWriter},
        config::{BatcherConfig, ChannelConfig, CompressionAlgo, CompressorConfig, CompressorKind},
        errors::{ChannelError, ChannelManagerError, CompressorError, PublisherError},
        manager::ChannelManager,
        submitter::BatchSubmitter,
        traits::{L2BlockSource, Publisher, TxOutcome, TxReceipt},
    };
}

pub mod channel;
pub use channel::{ChannelOut, FrameId, TxData};

pub mod compressor;
pub mod config;
pub mod errors;

pub mod manager;
pub use manager::ChannelManager;

pub mod submitter;
pub mod traits;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
