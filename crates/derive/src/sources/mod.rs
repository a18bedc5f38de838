//! The data source module.
//!
//! Data sources are data providers for the derivation pipeline.
//! They implement the [DataAvailabilityProvider] trait, providing a way
//! to iterate over the batcher data posted in a given L1 [BlockInfo].
//!
//! [DataAvailabilityProvider]: crate::traits::DataAvailabilityProvider
//! [BlockInfo]: ferry_primitives::BlockInfo

mod blobs;
pub use blobs::BlobSource;

mod calldata;
pub use calldata::CalldataSource;

mod ethereum;
pub use ethereum::{EthereumDataSource, EthereumDataSourceVariant};

mod retry;
pub use retry::{ExponentialBackoff, RetryingChainProvider};
