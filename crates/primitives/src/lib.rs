#![doc = include_str!("../README.md")]
#![warn(missing_debug_implementations, missing_docs, unreachable_pub, rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod attributes;
pub use attributes::{L2AttributesWithParent, OpPayloadAttributes};

pub mod batch;
pub use batch::{
    Batch, BatchDecodingError, BatchReader, BatchType, BatchValidationProvider, BatchValidity,
    BatchWithInclusionBlock, RawSpanBatch, SingleBatch, SpanBatch, SpanBatchError,
};

pub mod blob;
pub use blob::{BlobData, BlobDecodingError, BlobEncodingError, BLOB_MAX_DATA_SIZE};

pub mod blob_hash;
pub use blob_hash::IndexedBlobHash;

pub mod block;
pub use block::{BlockID, BlockInfo, Header, L2Block, L2BlockInfo};

pub mod block_info;
pub use block_info::{L1BlockInfoBedrock, L1BlockInfoEcotone, L1BlockInfoTx, L1BlockInfoTxError};

pub mod channel;
pub use channel::{Channel, ChannelError};

pub mod deposits;
pub use deposits::{
    decode_deposit, DepositError, DepositSourceDomain, L1InfoDepositSource, TxDeposit,
    UpgradeDepositSource, UserDepositSource,
};

pub mod frame;
pub use frame::{Frame, FrameParseError};

pub mod genesis;
pub use genesis::Genesis;

pub mod params;
pub use params::ChannelID;

pub mod raw_tx;
pub use raw_tx::RawTransaction;

pub mod receipt;
pub use receipt::{L1Transaction, Receipt};

pub mod rollup_config;
pub use rollup_config::RollupConfig;

pub mod system_config;
pub use system_config::{
    SystemAccounts, SystemConfig, SystemConfigUpdateError, SystemConfigUpdateType,
    L1_SCALAR_BEDROCK, L1_SCALAR_ECOTONE,
};

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

/// The prelude exports common types and traits.
pub mod prelude {
    pub use crate::{
        Batch, BatchValidationProvider, BatchValidity, BlobData, BlockID, BlockInfo, Channel,
        ChannelID, Frame, Genesis, L1BlockInfoTx, L2AttributesWithParent, L2Block, L2BlockInfo,
        OpPayloadAttributes, RawTransaction, Receipt, RollupConfig, SingleBatch, SpanBatch,
        SystemConfig,
    };
}
