//! The [StatefulAttributesBuilder], the default [AttributesBuilder] of the derivation pipeline.

use crate::{
    errors::{BuilderError, PipelineError, PipelineErrorKind, PipelineResult},
    traits::{AttributesBuilder, ChainProvider, L2ChainProvider},
};
use alloy_primitives::{B256, B64};
use async_trait::async_trait;
use core::fmt::Debug;
use ferry_primitives::{
    BlockID, L1BlockInfoTx, L2BlockInfo, OpPayloadAttributes, RawTransaction, RollupConfig,
    SystemAccounts,
};
use std::sync::Arc;
use tracing::debug;

mod deposits;
pub(crate) use deposits::derive_deposits;

/// A stateful implementation of the [AttributesBuilder].
///
/// The system config in effect at the L2 parent is fetched from the [L2ChainProvider], and the L1
/// epoch's header and receipts from the [ChainProvider].
#[derive(Debug, Default)]
pub struct StatefulAttributesBuilder<L2P, CP>
where
    L2P: L2ChainProvider + Debug,
    CP: ChainProvider + Debug,
{
    /// The rollup config.
    rollup_cfg: Arc<RollupConfig>,
    /// The system config fetcher.
    config_fetcher: L2P,
    /// The L1 receipts fetcher.
    receipts_fetcher: CP,
}

impl<L2P, CP> StatefulAttributesBuilder<L2P, CP>
where
    L2P: L2ChainProvider + Debug,
    CP: ChainProvider + Debug,
{
    /// Create a new [StatefulAttributesBuilder] with the given epoch.
    pub const fn new(rcfg: Arc<RollupConfig>, sys_cfg_fetcher: L2P, receipts: CP) -> Self {
        Self { rollup_cfg: rcfg, config_fetcher: sys_cfg_fetcher, receipts_fetcher: receipts }
    }
}

#[async_trait]
impl<L2P, CP> AttributesBuilder for StatefulAttributesBuilder<L2P, CP>
where
    L2P: L2ChainProvider + Debug + Send,
    CP: ChainProvider + Debug + Send,
{
    async fn prepare_payload_attributes(
        &mut self,
        l2_parent: L2BlockInfo,
        epoch: BlockID,
    ) -> PipelineResult<OpPayloadAttributes> {
        let mut sys_config = match self
            .config_fetcher
            .system_config_by_number(l2_parent.block_info.number, self.rollup_cfg.clone())
            .await
        {
            Ok(cfg) => cfg,
            Err(e) => return Err(e.into()),
        };

        // If the L1 origin changed in this block, then we are in the first block of the epoch.
        // In this case we need to fetch all transaction receipts from the L1 origin block so
        // we can scan for user deposits.
        let (header, deposit_transactions, sequence_number) = if l2_parent.l1_origin.number !=
            epoch.number
        {
            let header = match self.receipts_fetcher.header_by_hash(epoch.hash).await {
                Ok(header) => header,
                Err(e) => return Err(e.into()),
            };
            if l2_parent.l1_origin.hash != header.parent_hash {
                return Err(PipelineErrorKind::Reset(
                    BuilderError::BlockMismatchEpochReset(
                        epoch,
                        l2_parent.l1_origin,
                        header.parent_hash,
                    )
                    .into(),
                ));
            }
            let receipts = match self.receipts_fetcher.receipts_by_hash(epoch.hash).await {
                Ok(receipts) => receipts,
                Err(e) => return Err(e.into()),
            };
            if let Err(e) =
                sys_config.update_with_receipts(&receipts, &self.rollup_cfg, header.timestamp)
            {
                return Err(PipelineError::SystemConfigUpdate(e).crit());
            }
            let deposits =
                derive_deposits(epoch.hash, &receipts, self.rollup_cfg.deposit_contract_address)
                    .map_err(|e| PipelineError::BadEncoding(e).crit())?;
            (header, deposits, 0)
        } else {
            if l2_parent.l1_origin.hash != epoch.hash {
                return Err(PipelineErrorKind::Reset(
                    BuilderError::BlockMismatch(epoch, l2_parent.l1_origin).into(),
                ));
            }
            let header = match self.receipts_fetcher.header_by_hash(epoch.hash).await {
                Ok(header) => header,
                Err(e) => return Err(e.into()),
            };
            (header, Vec::new(), l2_parent.seq_num + 1)
        };

        // Sanity check the L1 origin was correctly selected to maintain the time invariant
        // between L1 and L2.
        let next_l2_time = l2_parent.block_info.timestamp + self.rollup_cfg.block_time;
        if next_l2_time < header.timestamp {
            return Err(PipelineErrorKind::Reset(
                BuilderError::BrokenTimeInvariant(
                    l2_parent.l1_origin,
                    next_l2_time,
                    header.block_info().id(),
                    header.timestamp,
                )
                .into(),
            ));
        }

        // The L1 info deposit always comes first.
        let (_, l1_info_tx) = L1BlockInfoTx::new_with_deposit_tx(
            &self.rollup_cfg,
            &sys_config,
            sequence_number,
            &header,
            next_l2_time,
        );

        let mut txs: Vec<RawTransaction> = Vec::with_capacity(1 + deposit_transactions.len());
        txs.push(l1_info_tx.to_raw_transaction());
        txs.extend(deposit_transactions);

        let withdrawals = self.rollup_cfg.is_canyon_active(next_l2_time).then(Vec::new);
        let parent_beacon_block_root = self
            .rollup_cfg
            .is_ecotone_active(next_l2_time)
            .then(|| header.parent_beacon_block_root.unwrap_or(B256::ZERO));
        let eip_1559_params = self.rollup_cfg.is_holocene_active(next_l2_time).then(|| {
            let mut params = [0u8; 8];
            let denominator = sys_config.eip1559_denominator.unwrap_or_default();
            let elasticity = sys_config.eip1559_elasticity.unwrap_or_default();
            params[..4].copy_from_slice(&denominator.to_be_bytes());
            params[4..].copy_from_slice(&elasticity.to_be_bytes());
            B64::from(params)
        });

        debug!(
            target: "attributes-queue",
            "Prepared attributes for L2 block at {} with {} forced transactions, sequence number {}",
            next_l2_time, txs.len(), sequence_number
        );

        Ok(OpPayloadAttributes {
            timestamp: next_l2_time,
            prev_randao: header.mix_hash,
            suggested_fee_recipient: SystemAccounts::default().fee_vault,
            withdrawals,
            parent_beacon_block_root,
            transactions: Some(txs),
            no_tx_pool: Some(true),
            gas_limit: Some(sys_config.gas_limit),
            eip_1559_params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{deposits::tests::*, *};
    use crate::{
        errors::ResetError,
        test_utils::{TestChainProvider, TestL2ChainProvider},
    };
    use ferry_primitives::{Header, Receipt, SystemConfig};

    const PARENT_TIME: u64 = 100;

    fn l1_header(number: u64, parent_hash: B256, timestamp: u64) -> Header {
        Header {
            hash: B256::with_last_byte(number as u8),
            parent_hash,
            number,
            timestamp,
            mix_hash: B256::repeat_byte(0x42),
            parent_beacon_block_root: Some(B256::repeat_byte(0xBE)),
            ..Default::default()
        }
    }

    fn parent(l1_origin: &Header, seq_num: u64) -> L2BlockInfo {
        L2BlockInfo::new(
            ferry_primitives::BlockInfo {
                number: 20,
                hash: B256::repeat_byte(0x20),
                timestamp: PARENT_TIME,
                ..Default::default()
            },
            l1_origin.block_info().id(),
            seq_num,
        )
    }

    fn new_builder(
        cfg: RollupConfig,
        headers: Vec<Header>,
        receipts: Vec<(B256, Vec<Receipt>)>,
    ) -> StatefulAttributesBuilder<TestL2ChainProvider, TestChainProvider> {
        let mut l1 = TestChainProvider::default();
        for header in headers {
            l1.insert_header(header.hash, header);
        }
        for (hash, receipts) in receipts {
            l1.insert_receipts(hash, receipts);
        }
        let mut l2 = TestL2ChainProvider::default();
        l2.system_configs.insert(20, SystemConfig { gas_limit: 30_000_000, ..Default::default() });
        StatefulAttributesBuilder::new(Arc::new(cfg), l2, l1)
    }

    fn test_config() -> RollupConfig {
        RollupConfig {
            block_time: 2,
            deposit_contract_address: DEPOSIT_CONTRACT,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_system_config() {
        let origin = l1_header(5, B256::ZERO, 90);
        let mut builder = new_builder(test_config(), vec![origin.clone()], vec![]);
        builder.config_fetcher.system_configs.clear();
        let err = builder
            .prepare_payload_attributes(parent(&origin, 0), origin.block_info().id())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineErrorKind::Temporary(PipelineError::Provider(_))));
    }

    #[tokio::test]
    async fn test_same_epoch_hash_mismatch() {
        let origin = l1_header(5, B256::ZERO, 90);
        let mut builder = new_builder(test_config(), vec![origin.clone()], vec![]);
        let epoch = BlockID { number: 5, hash: B256::repeat_byte(0xFF) };
        let parent = parent(&origin, 0);
        let err = builder.prepare_payload_attributes(parent, epoch).await.unwrap_err();
        assert_eq!(
            err,
            ResetError::AttributesBuilder(BuilderError::BlockMismatch(epoch, parent.l1_origin))
                .reset()
        );
    }

    #[tokio::test]
    async fn test_new_epoch_parent_mismatch() {
        let origin = l1_header(5, B256::ZERO, 90);
        let next = l1_header(6, B256::repeat_byte(0xFF), 96);
        let mut builder = new_builder(test_config(), vec![origin.clone(), next.clone()], vec![]);
        let parent = parent(&origin, 3);
        let epoch = next.block_info().id();
        let err = builder.prepare_payload_attributes(parent, epoch).await.unwrap_err();
        assert_eq!(
            err,
            ResetError::AttributesBuilder(BuilderError::BlockMismatchEpochReset(
                epoch,
                parent.l1_origin,
                next.parent_hash
            ))
            .reset()
        );
    }

    #[tokio::test]
    async fn test_broken_time_invariant() {
        let origin = l1_header(5, B256::ZERO, 200);
        let mut builder = new_builder(test_config(), vec![origin.clone()], vec![]);
        let parent = parent(&origin, 0);
        let err = builder
            .prepare_payload_attributes(parent, origin.block_info().id())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ResetError::AttributesBuilder(BuilderError::BrokenTimeInvariant(
                parent.l1_origin,
                PARENT_TIME + 2,
                origin.block_info().id(),
                200
            ))
            .reset()
        );
    }

    #[tokio::test]
    async fn test_same_epoch_attributes() {
        let origin = l1_header(5, B256::ZERO, 90);
        let mut builder = new_builder(test_config(), vec![origin.clone()], vec![]);
        let parent = parent(&origin, 3);
        let attrs = builder
            .prepare_payload_attributes(parent, origin.block_info().id())
            .await
            .unwrap();

        let (_, l1_info) = L1BlockInfoTx::new_with_deposit_tx(
            &test_config(),
            &SystemConfig { gas_limit: 30_000_000, ..Default::default() },
            4,
            &origin,
            PARENT_TIME + 2,
        );
        assert_eq!(attrs.timestamp, PARENT_TIME + 2);
        assert_eq!(attrs.prev_randao, origin.mix_hash);
        assert_eq!(attrs.suggested_fee_recipient, SystemAccounts::default().fee_vault);
        assert_eq!(attrs.transactions, Some(vec![l1_info.to_raw_transaction()]));
        assert_eq!(attrs.gas_limit, Some(30_000_000));
        assert_eq!(attrs.no_tx_pool, Some(true));
        assert!(attrs.withdrawals.is_none());
        assert!(attrs.parent_beacon_block_root.is_none());
        assert!(attrs.eip_1559_params.is_none());
    }

    #[tokio::test]
    async fn test_new_epoch_includes_deposits_and_config_updates() {
        let origin = l1_header(5, B256::ZERO, 90);
        let next = l1_header(6, origin.hash, 96);
        let receipts = vec![Receipt {
            success: true,
            logs: vec![deposit_log(DEPOSIT_CONTRACT), deposit_log(DEPOSIT_CONTRACT)],
            ..Default::default()
        }];
        let mut builder = new_builder(
            test_config(),
            vec![origin.clone(), next.clone()],
            vec![(next.hash, receipts)],
        );
        let attrs = builder
            .prepare_payload_attributes(parent(&origin, 3), next.block_info().id())
            .await
            .unwrap();
        let txs = attrs.transactions.unwrap();
        assert_eq!(txs.len(), 3);
        assert!(txs.iter().all(RawTransaction::is_deposit));
        assert_eq!(attrs.timestamp, PARENT_TIME + 2);
    }

    #[tokio::test]
    async fn test_hardfork_fields() {
        let origin = l1_header(5, B256::ZERO, 90);
        let cfg = RollupConfig {
            canyon_time: Some(0),
            ecotone_time: Some(0),
            holocene_time: Some(0),
            ..test_config()
        };
        let mut builder = new_builder(cfg, vec![origin.clone()], vec![]);
        builder.config_fetcher.system_configs.insert(
            20,
            SystemConfig {
                eip1559_denominator: Some(250),
                eip1559_elasticity: Some(6),
                ..Default::default()
            },
        );
        let attrs = builder
            .prepare_payload_attributes(parent(&origin, 0), origin.block_info().id())
            .await
            .unwrap();
        assert_eq!(attrs.withdrawals, Some(vec![]));
        assert_eq!(attrs.parent_beacon_block_root, origin.parent_beacon_block_root);
        assert_eq!(attrs.eip_1559_params, Some(B64::from([0, 0, 0, 250, 0, 0, 0, 6])));
    }
}
