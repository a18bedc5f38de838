//! Blob Data Source

use crate::{
    errors::{BlobProviderError, PipelineError, PipelineResult},
    traits::{AsyncIterator, BlobProvider, ChainProvider},
};
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use ferry_primitives::{BlobData, BlockInfo, IndexedBlobHash, L1Transaction};
use std::collections::VecDeque;
use tracing::warn;

/// A data iterator that reads from blobs.
#[derive(Debug, Clone)]
pub struct BlobSource<F, B>
where
    F: ChainProvider + Send,
    B: BlobProvider + Send,
{
    /// Chain provider.
    chain_provider: F,
    /// Fetches blobs.
    blob_fetcher: B,
    /// The address of the batch inbox contract.
    batch_inbox_address: Address,
    /// Block Ref
    block_ref: BlockInfo,
    /// The L1 Signer.
    signer: Address,
    /// Data.
    data: VecDeque<BlobData>,
    /// Whether the source is open.
    open: bool,
}

impl<F, B> BlobSource<F, B>
where
    F: ChainProvider + Send,
    B: BlobProvider + Send,
{
    /// Creates a new blob source.
    pub const fn new(
        chain_provider: F,
        blob_fetcher: B,
        batch_inbox_address: Address,
        block_ref: BlockInfo,
        signer: Address,
    ) -> Self {
        Self {
            chain_provider,
            blob_fetcher,
            batch_inbox_address,
            block_ref,
            signer,
            data: VecDeque::new(),
            open: false,
        }
    }

    /// Collects the batcher payloads of the block in transaction order.
    ///
    /// Calldata payloads are carried as is. Every blob of a batcher blob transaction gets an empty
    /// placeholder, paired with its [IndexedBlobHash]. Blob indices count every blob in the block.
    fn extract_blob_data(&self, txs: Vec<L1Transaction>) -> (Vec<BlobData>, Vec<IndexedBlobHash>) {
        let mut index = 0;
        let mut data = Vec::new();
        let mut hashes = Vec::new();
        for tx in txs {
            if tx.to != Some(self.batch_inbox_address) || tx.from != self.signer {
                index += tx.blob_versioned_hashes.len();
                continue;
            }
            if !tx.is_blob_tx() {
                data.push(BlobData { data: None, calldata: Some(tx.input) });
                continue;
            }
            if !tx.input.is_empty() {
                warn!(target: "blob-source", "Blob tx has calldata, which will be ignored");
            }
            for hash in tx.blob_versioned_hashes {
                hashes.push(IndexedBlobHash::new(index, hash));
                data.push(BlobData::default());
                index += 1;
            }
        }
        (data, hashes)
    }

    /// Loads blob data into the source if it is not open.
    async fn load_blobs(&mut self) -> PipelineResult<()> {
        if self.open {
            return Ok(());
        }

        let txs = match self
            .chain_provider
            .block_info_and_transactions_by_hash(self.block_ref.hash)
            .await
        {
            Ok((_, txs)) => txs,
            Err(e) => return Err(e.into()),
        };
        let (mut data, blob_hashes) = self.extract_blob_data(txs);

        // If there are no hashes, set the calldata and return.
        if blob_hashes.is_empty() {
            self.open = true;
            self.data = data.into();
            return Ok(());
        }

        let blobs = match self.blob_fetcher.get_blobs(&self.block_ref, &blob_hashes).await {
            Ok(blobs) => blobs,
            Err(e) => return Err(e.into()),
        };
        if blobs.len() != blob_hashes.len() {
            return Err(BlobProviderError::SidecarLengthMismatch(blob_hashes.len(), blobs.len())
                .into());
        }

        // Fill the blob placeholders, in order.
        let mut blob_index = 0;
        for blob in data.iter_mut().filter(|d| d.calldata.is_none()) {
            if let Err(e) = blob.fill(&blobs, blob_index) {
                warn!(target: "blob-source", "Failed to fill blob {blob_index}: {e}");
            }
            blob_index += 1;
        }

        self.open = true;
        self.data = data.into();
        Ok(())
    }
}

#[async_trait]
impl<F, B> AsyncIterator for BlobSource<F, B>
where
    F: ChainProvider + Send,
    B: BlobProvider + Send,
{
    type Item = Bytes;

    async fn next(&mut self) -> PipelineResult<Self::Item> {
        self.load_blobs().await?;

        // Malformed blobs are skipped.
        while let Some(next) = self.data.pop_front() {
            match next.inner() {
                Ok(data) => return Ok(data),
                Err(e) => {
                    warn!(target: "blob-source", "Failed to decode blob data, skipping: {e}")
                }
            }
        }
        Err(PipelineError::Eof.temp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        errors::PipelineErrorKind,
        test_utils::{TestBlobProvider, TestChainProvider},
    };
    use alloy_primitives::{address, b256, B256};

    const INBOX: Address = address!("ff00000000000000000000000000000000000010");
    const BATCHER: Address = address!("6887246668a3b87f54deb3b94ba47a6f63f32985");

    fn block() -> BlockInfo {
        BlockInfo { hash: B256::repeat_byte(0x10), number: 10, ..Default::default() }
    }

    fn blob_tx(from: Address, hashes: Vec<B256>) -> L1Transaction {
        L1Transaction {
            tx_type: L1Transaction::EIP4844_TX_TYPE,
            from,
            to: Some(INBOX),
            blob_versioned_hashes: hashes,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_blob_source_decodes_blobs_and_calldata() {
        let hash_a = b256!("01000000000000000000000000000000000000000000000000000000000000aa");
        let hash_b = b256!("01000000000000000000000000000000000000000000000000000000000000bb");
        let foreign = b256!("01000000000000000000000000000000000000000000000000000000000000cc");

        let txs = vec![
            // A blob from another sender shifts the index of the batcher's blobs.
            blob_tx(Address::ZERO, vec![foreign]),
            blob_tx(BATCHER, vec![hash_a, hash_b]),
            L1Transaction {
                from: BATCHER,
                to: Some(INBOX),
                input: Bytes::from_static(b"calldata"),
                ..Default::default()
            },
        ];
        let mut chain = TestChainProvider::default();
        chain.insert_block_with_transactions(10, block(), txs);

        let mut blobs = TestBlobProvider::default();
        blobs.insert_blob(hash_a, BlobData::encode(b"first").unwrap());
        blobs.insert_blob(hash_b, BlobData::encode(b"second").unwrap());

        let mut source = BlobSource::new(chain, blobs.clone(), INBOX, block(), BATCHER);
        assert_eq!(source.next().await.unwrap(), Bytes::from_static(b"first"));
        assert_eq!(source.next().await.unwrap(), Bytes::from_static(b"second"));
        assert_eq!(source.next().await.unwrap(), Bytes::from_static(b"calldata"));
        assert_eq!(source.next().await.unwrap_err(), PipelineError::Eof.temp());

        let requested = blobs.requested.lock().clone();
        let expected = vec![IndexedBlobHash::new(1, hash_a), IndexedBlobHash::new(2, hash_b)];
        assert_eq!(requested, expected);
    }

    #[tokio::test]
    async fn test_blob_source_skips_malformed_blob() {
        let hash_a = b256!("01000000000000000000000000000000000000000000000000000000000000aa");
        let hash_b = b256!("01000000000000000000000000000000000000000000000000000000000000bb");
        let mut chain = TestChainProvider::default();
        let txs = vec![blob_tx(BATCHER, vec![hash_a, hash_b])];
        chain.insert_block_with_transactions(10, block(), txs);

        let mut bad = BlobData::encode(b"bad").unwrap();
        bad[1] = 0x01;
        let mut blobs = TestBlobProvider::default();
        blobs.insert_blob(hash_a, bad);
        blobs.insert_blob(hash_b, BlobData::encode(b"good").unwrap());

        let mut source = BlobSource::new(chain, blobs, INBOX, block(), BATCHER);
        assert_eq!(source.next().await.unwrap(), Bytes::from_static(b"good"));
        assert_eq!(source.next().await.unwrap_err(), PipelineError::Eof.temp());
    }

    #[tokio::test]
    async fn test_blob_source_missing_blob() {
        let hash = b256!("01000000000000000000000000000000000000000000000000000000000000aa");
        let mut chain = TestChainProvider::default();
        chain.insert_block_with_transactions(10, block(), vec![blob_tx(BATCHER, vec![hash])]);

        let mut source =
            BlobSource::new(chain, TestBlobProvider::default(), INBOX, block(), BATCHER);
        let err = source.next().await.unwrap_err();
        assert!(matches!(err, PipelineErrorKind::Temporary(PipelineError::Provider(_))));
    }
}
