//! Test utilities for the derivation pipeline.
//!
//! Mocks for every stage boundary and provider trait, plus helpers to capture traces and build
//! batcher payloads.

mod chain_providers;
pub use chain_providers::{TestChainProvider, TestL2ChainProvider, TestProviderError};

mod blob_provider;
pub use blob_provider::TestBlobProvider;

mod data_availability_provider;
pub use data_availability_provider::{TestDAP, TestIter};

mod stages;
pub use stages::{
    new_test_attributes_provider, TestAttributesBuilder, TestAttributesProvider,
    TestBatchQueueProvider, TestChannelBankProvider, TestChannelReaderProvider,
    TestFrameQueueProvider, TestNextAttributes,
};

pub use ferry_primitives::test_utils::{CollectingLayer, TraceStorage};

use alloy_primitives::Bytes;
use ferry_primitives::{params::DERIVATION_VERSION_0, Frame};
use tracing_subscriber::{layer::SubscriberExt, Registry};

/// Installs a [CollectingLayer] as the default subscriber of the current thread.
///
/// Traces are collected until the returned guard is dropped.
pub fn collect_traces() -> (TraceStorage, tracing::subscriber::DefaultGuard) {
    let storage = TraceStorage::default();
    let subscriber = Registry::default().with(CollectingLayer::new(storage.clone()));
    let guard = tracing::subscriber::set_default(subscriber);
    (storage, guard)
}

/// Encodes frames into a single batcher transaction payload, version byte first.
pub fn encode_frames(frames: &[Frame]) -> Bytes {
    let mut bytes = vec![DERIVATION_VERSION_0];
    for frame in frames {
        bytes.extend_from_slice(&frame.encode());
    }
    bytes.into()
}

/// Builds zlib compressed channel data holding the given batches.
#[cfg(test)]
pub(crate) fn compressed_channel(batches: &[ferry_primitives::Batch]) -> Bytes {
    let mut rlp = Vec::new();
    for batch in batches {
        let mut encoded = Vec::new();
        batch.encode(&mut encoded).expect("batch encodes");
        alloy_rlp::Encodable::encode(&Bytes::from(encoded), &mut rlp);
    }
    miniz_oxide::deflate::compress_to_vec_zlib(&rlp, 9).into()
}
