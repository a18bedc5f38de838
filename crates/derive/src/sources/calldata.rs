//! CallData Source

use crate::{
    errors::{PipelineError, PipelineResult},
    traits::{AsyncIterator, ChainProvider},
};
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use ferry_primitives::BlockInfo;
use std::collections::VecDeque;

/// A data iterator that reads from calldata.
#[derive(Debug, Clone)]
pub struct CalldataSource<CP>
where
    CP: ChainProvider + Send,
{
    /// The chain provider to use for the calldata source.
    chain_provider: CP,
    /// The batch inbox address.
    batch_inbox_address: Address,
    /// Block Ref
    block_ref: BlockInfo,
    /// The L1 Signer.
    signer: Address,
    /// Current calldata.
    calldata: VecDeque<Bytes>,
    /// Whether the calldata source is open.
    open: bool,
}

impl<CP: ChainProvider + Send> CalldataSource<CP> {
    /// Creates a new calldata source.
    pub const fn new(
        chain_provider: CP,
        batch_inbox_address: Address,
        block_ref: BlockInfo,
        signer: Address,
    ) -> Self {
        Self {
            chain_provider,
            batch_inbox_address,
            block_ref,
            signer,
            calldata: VecDeque::new(),
            open: false,
        }
    }

    /// Loads the calldata into the source if it is not open.
    async fn load_calldata(&mut self) -> Result<(), CP::Error> {
        if self.open {
            return Ok(());
        }

        let (_, txs) =
            self.chain_provider.block_info_and_transactions_by_hash(self.block_ref.hash).await?;

        self.calldata = txs
            .into_iter()
            .filter(|tx| tx.to == Some(self.batch_inbox_address) && tx.from == self.signer)
            .map(|tx| tx.input)
            .collect();
        self.open = true;

        Ok(())
    }
}

#[async_trait]
impl<CP: ChainProvider + Send> AsyncIterator for CalldataSource<CP> {
    type Item = Bytes;

    async fn next(&mut self) -> PipelineResult<Self::Item> {
        if let Err(e) = self.load_calldata().await {
            return Err(e.into());
        }
        self.calldata.pop_front().ok_or(PipelineError::Eof.temp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::PipelineErrorKind, test_utils::TestChainProvider};
    use alloy_primitives::{address, b256};
    use ferry_primitives::L1Transaction;

    const INBOX: Address = address!("ff00000000000000000000000000000000000010");
    const BATCHER: Address = address!("6887246668a3b87f54deb3b94ba47a6f63f32985");

    fn tx(from: Address, to: Address, input: &'static [u8]) -> L1Transaction {
        L1Transaction {
            from,
            to: Some(to),
            input: Bytes::from_static(input),
            ..Default::default()
        }
    }

    fn block() -> BlockInfo {
        BlockInfo {
            hash: b256!("0000000000000000000000000000000000000000000000000000000000000010"),
            number: 10,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_calldata_filters_by_inbox_and_signer() {
        let mut chain = TestChainProvider::default();
        let txs = vec![
            tx(BATCHER, INBOX, b"first"),
            tx(Address::ZERO, INBOX, b"wrong signer"),
            tx(BATCHER, Address::ZERO, b"wrong inbox"),
            tx(BATCHER, INBOX, b"second"),
        ];
        chain.insert_block_with_transactions(10, block(), txs);

        let mut source = CalldataSource::new(chain, INBOX, block(), BATCHER);
        assert_eq!(source.next().await.unwrap(), Bytes::from_static(b"first"));
        assert_eq!(source.next().await.unwrap(), Bytes::from_static(b"second"));
        assert_eq!(source.next().await.unwrap_err(), PipelineError::Eof.temp());
    }

    #[tokio::test]
    async fn test_calldata_missing_block() {
        let chain = TestChainProvider::default();
        let mut source = CalldataSource::new(chain, INBOX, block(), BATCHER);
        let err = source.next().await.unwrap_err();
        assert!(matches!(err, PipelineErrorKind::Temporary(PipelineError::Provider(_))));
    }
}
