//! An in-memory [BlobProvider] keyed by versioned hash.

use crate::{errors::BlobProviderError, traits::BlobProvider};
use alloy_eips::eip4844::Blob;
use alloy_primitives::B256;
use async_trait::async_trait;
use ferry_primitives::{BlockInfo, IndexedBlobHash};
use hashbrown::HashMap;
use spin::Mutex;
use std::sync::Arc;

/// A mock blob provider for testing.
///
/// Every requested hash is recorded in [Self::requested], which is shared between clones so a
/// test can inspect the requests a consumer made through its own copy.
#[derive(Debug, Clone, Default)]
pub struct TestBlobProvider {
    /// Blobs keyed by their versioned hash.
    pub blobs: HashMap<B256, Box<Blob>>,
    /// The indexed hashes requested so far, in order.
    pub requested: Arc<Mutex<Vec<IndexedBlobHash>>>,
}

impl TestBlobProvider {
    /// Insert a blob into the mock blob provider.
    pub fn insert_blob(&mut self, hash: B256, blob: Blob) {
        self.blobs.insert(hash, Box::new(blob));
    }

    /// Clears all blobs from the mock blob provider.
    pub fn clear(&mut self) {
        self.blobs.clear();
    }
}

#[async_trait]
impl BlobProvider for TestBlobProvider {
    type Error = BlobProviderError;

    async fn get_blobs(
        &mut self,
        _block_ref: &BlockInfo,
        blob_hashes: &[IndexedBlobHash],
    ) -> Result<Vec<Box<Blob>>, Self::Error> {
        self.requested.lock().extend_from_slice(blob_hashes);
        blob_hashes
            .iter()
            .map(|h| {
                self.blobs
                    .get(&h.hash)
                    .cloned()
                    .ok_or_else(|| BlobProviderError::Backend(format!("blob {} not found", h.hash)))
            })
            .collect()
    }
}
