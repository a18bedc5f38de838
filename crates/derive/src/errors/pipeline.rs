//! This module contains derivation errors thrown within the pipeline.

use super::BuilderError;
use alloy_primitives::B256;
use ferry_primitives::{
    BatchDecodingError, DepositError, FrameParseError, SpanBatchError, SystemConfigUpdateError,
};
use thiserror::Error;

/// A result type for the derivation pipeline stages.
pub type PipelineResult<T> = Result<T, PipelineErrorKind>;

/// [crate::ensure] is a short-hand for bubbling up errors in the case of a condition not being met.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            return Err($err);
        }
    };
}

/// A top level filter for [PipelineError] that sorts by severity.
///
/// - [PipelineErrorKind::Temporary]: the step may be retried, usually once more L1 data exists.
/// - [PipelineErrorKind::Critical]: derivation cannot continue from the current state.
/// - [PipelineErrorKind::Reset]: every stage must be reset before derivation continues.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineErrorKind {
    /// A temporary error.
    #[error("Temporary error: {0}")]
    Temporary(#[source] PipelineError),
    /// A critical error.
    #[error("Critical error: {0}")]
    Critical(#[source] PipelineError),
    /// A reset error.
    #[error("Pipeline reset: {0}")]
    Reset(#[from] ResetError),
}

impl PipelineErrorKind {
    /// Returns `true` if the error is a temporary [PipelineError::Eof].
    pub const fn is_eof(&self) -> bool {
        matches!(self, Self::Temporary(PipelineError::Eof))
    }

    /// Returns `true` if the error requires a pipeline reset.
    pub const fn is_reset(&self) -> bool {
        matches!(self, Self::Reset(_))
    }
}

/// An error encountered during the processing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// There is no data to read from the stage. Not a failure: derivation has caught up with
    /// the data currently available on L1.
    #[error("EOF")]
    Eof,
    /// There is not enough data to complete the processing of the stage. If the operation is
    /// re-tried, more data will come in allowing the pipeline to progress, or eventually a
    /// [PipelineError::Eof] will be encountered.
    #[error("Not enough data")]
    NotEnoughData,
    /// No channel returned by the [ChannelReader] stage.
    ///
    /// [ChannelReader]: crate::stages::ChannelReader
    #[error("The channel reader has no channel available")]
    ChannelReaderEmpty,
    /// A channel tracked by the [ChannelBank] is missing from its channel map.
    ///
    /// [ChannelBank]: crate::stages::ChannelBank
    #[error("Channel not found in channel bank")]
    ChannelNotFound,
    /// The [ChannelBank] has no channel left to prune.
    ///
    /// [ChannelBank]: crate::stages::ChannelBank
    #[error("Channel bank is empty")]
    ChannelBankEmpty,
    /// The [BatchQueue] is empty.
    ///
    /// [BatchQueue]: crate::stages::BatchQueue
    #[error("The batch queue has no batches available")]
    BatchQueueEmpty,
    /// Missing L1 origin.
    #[error("Missing L1 origin from previous stage")]
    MissingOrigin,
    /// Missing data from [L1Retrieval].
    ///
    /// [L1Retrieval]: crate::stages::L1Retrieval
    #[error("L1 Retrieval missing data")]
    MissingL1Data,
    /// [SystemConfig] update error.
    ///
    /// [SystemConfig]: ferry_primitives::SystemConfig
    #[error("Error updating system config: {0}")]
    SystemConfigUpdate(#[from] SystemConfigUpdateError),
    /// Attributes builder error variant, with [BuilderError].
    #[error("Attributes builder error: {0}")]
    AttributesBuilder(#[from] BuilderError),
    /// [PipelineEncodingError] variant.
    #[error("Decode error: {0}")]
    BadEncoding(#[from] PipelineEncodingError),
    /// Provider error variant.
    #[error("Provider error: {0}")]
    Provider(String),
}

impl PipelineError {
    /// Wrap [PipelineError] as a [PipelineErrorKind::Critical].
    pub const fn crit(self) -> PipelineErrorKind {
        PipelineErrorKind::Critical(self)
    }

    /// Wrap [PipelineError] as a [PipelineErrorKind::Temporary].
    pub const fn temp(self) -> PipelineErrorKind {
        PipelineErrorKind::Temporary(self)
    }
}

/// A reset error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResetError {
    /// The batch has a bad parent hash.
    /// The first argument is the expected parent hash, and the second argument is the actual
    /// parent hash.
    #[error("Bad parent hash: expected {0}, got {1}")]
    BadParentHash(B256, B256),
    /// The batch has a bad timestamp.
    /// The first argument is the expected timestamp, and the second argument is the actual
    /// timestamp.
    #[error("Bad timestamp: expected {0}, got {1}")]
    BadTimestamp(u64, u64),
    /// L1 origin mismatch.
    #[error("L1 origin mismatch. Expected {0:?}, got {1:?}")]
    L1OriginMismatch(u64, u64),
    /// The stage detected a block reorg.
    /// The first argument is the expected block hash.
    /// The second argument is the parent_hash of the next l1 origin block.
    #[error("L1 reorg detected: expected {0}, got {1}")]
    ReorgDetected(B256, B256),
    /// Attributes builder error variant, with [BuilderError].
    #[error("Attributes builder error: {0}")]
    AttributesBuilder(#[from] BuilderError),
}

impl ResetError {
    /// Wrap [ResetError] as a [PipelineErrorKind::Reset].
    pub const fn reset(self) -> PipelineErrorKind {
        PipelineErrorKind::Reset(self)
    }
}

/// A decoding error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineEncodingError {
    /// The buffer is empty.
    #[error("Empty buffer")]
    EmptyBuffer,
    /// Frame parsing error.
    #[error("Error parsing frames: {0}")]
    Frame(#[from] FrameParseError),
    /// Deposit decoding error.
    #[error("Error decoding deposit: {0}")]
    DepositError(#[from] DepositError),
    /// Alloy RLP Encoding Error.
    #[error("RLP error: {0}")]
    AlloyRlpError(alloy_rlp::Error),
    /// Span Batch Error.
    #[error(transparent)]
    SpanBatchError(#[from] SpanBatchError),
    /// Batch decoding error.
    #[error(transparent)]
    Batch(#[from] BatchDecodingError),
}

/// An error constructing a [DerivationPipeline].
///
/// [DerivationPipeline]: crate::pipeline::DerivationPipeline
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineBuilderError {
    /// A required component was never handed to the builder.
    #[error("Missing pipeline component: {0}")]
    MissingComponent(&'static str),
}
