//! A provider wrapper that retries transient failures with exponential backoff.

use crate::{
    errors::PipelineErrorKind,
    traits::{BlobProvider, ChainProvider},
};
use alloy_eips::eip4844::Blob;
use alloy_primitives::B256;
use async_trait::async_trait;
use ferry_primitives::{BlockInfo, Header, IndexedBlobHash, L1Transaction, Receipt};
use std::time::Duration;
use tracing::warn;

/// Configuration for exponential retry backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExponentialBackoff {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Factor applied to the delay after every failed attempt.
    pub multiplier: u32,
    /// Retries after the first attempt.
    pub max_retries: u16,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(8),
            multiplier: 2,
            max_retries: 5,
        }
    }
}

impl ExponentialBackoff {
    /// Returns the delay that follows `current`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(self.multiplier).min(self.max_delay)
    }
}

/// Wraps a provider and retries calls that fail with a temporary error.
///
/// Critical and reset errors are returned on the first occurrence, so a reorg is never retried
/// away.
#[derive(Debug, Clone)]
pub struct RetryingChainProvider<P> {
    inner: P,
    backoff: ExponentialBackoff,
}

impl<P> RetryingChainProvider<P> {
    /// Creates a new [RetryingChainProvider].
    pub const fn new(inner: P, backoff: ExponentialBackoff) -> Self {
        Self { inner, backoff }
    }

    /// Returns the wrapped provider.
    pub fn into_inner(self) -> P {
        self.inner
    }
}

/// Returns `true` if the provider error is worth retrying.
fn is_transient<E: Clone + Into<PipelineErrorKind>>(err: &E) -> bool {
    matches!(err.clone().into(), PipelineErrorKind::Temporary(_))
}

macro_rules! with_retries {
    ($self:ident, $method:ident($($arg:expr),*)) => {{
        let mut delay = $self.backoff.base_delay;
        let mut attempt = 0;
        loop {
            let err = match $self.inner.$method($($arg),*).await {
                Ok(value) => break Ok(value),
                Err(e) if attempt < $self.backoff.max_retries && is_transient(&e) => e.to_string(),
                Err(e) => break Err(e),
            };
            attempt += 1;
            warn!(
                target: "retrying-provider",
                "Attempt {attempt} of {} failed: {err}. Retrying in {delay:?}",
                stringify!($method)
            );
            tokio::time::sleep(delay).await;
            delay = $self.backoff.next_delay(delay);
        }
    }};
}

#[async_trait]
impl<P> ChainProvider for RetryingChainProvider<P>
where
    P: ChainProvider + Send,
    P::Error: Clone + Send,
{
    type Error = P::Error;

    async fn header_by_hash(&mut self, hash: B256) -> Result<Header, Self::Error> {
        with_retries!(self, header_by_hash(hash))
    }

    async fn block_info_by_number(&mut self, number: u64) -> Result<BlockInfo, Self::Error> {
        with_retries!(self, block_info_by_number(number))
    }

    async fn receipts_by_hash(&mut self, hash: B256) -> Result<Vec<Receipt>, Self::Error> {
        with_retries!(self, receipts_by_hash(hash))
    }

    async fn block_info_and_transactions_by_hash(
        &mut self,
        hash: B256,
    ) -> Result<(BlockInfo, Vec<L1Transaction>), Self::Error> {
        with_retries!(self, block_info_and_transactions_by_hash(hash))
    }
}

#[async_trait]
impl<P> BlobProvider for RetryingChainProvider<P>
where
    P: BlobProvider + Send,
    P::Error: Clone + Send,
{
    type Error = P::Error;

    async fn get_blobs(
        &mut self,
        block_ref: &BlockInfo,
        blob_hashes: &[IndexedBlobHash],
    ) -> Result<Vec<Box<Blob>>, Self::Error> {
        with_retries!(self, get_blobs(block_ref, blob_hashes))
    }
}
