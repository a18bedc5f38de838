//! Error types for sources.

use super::{PipelineError, PipelineErrorKind};
use thiserror::Error;

/// An error returned by a [BlobProvider].
///
/// [BlobProvider]: crate::traits::BlobProvider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlobProviderError {
    /// The number of specified blob hashes did not match the number of returned sidecars.
    #[error("Blob sidecar length mismatch: expected {0}, got {1}")]
    SidecarLengthMismatch(usize, usize),
    /// Slot derivation error.
    #[error("Failed to derive slot")]
    SlotDerivation,
    /// Error pertaining to the backend transport.
    #[error("{0}")]
    Backend(String),
}

impl From<BlobProviderError> for PipelineErrorKind {
    fn from(val: BlobProviderError) -> Self {
        match val {
            BlobProviderError::SidecarLengthMismatch(_, _) | BlobProviderError::SlotDerivation => {
                PipelineError::Provider(val.to_string()).crit()
            }
            BlobProviderError::Backend(_) => PipelineError::Provider(val.to_string()).temp(),
        }
    }
}
