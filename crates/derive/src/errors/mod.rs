//! Error types for the derivation pipeline.

mod attributes;
pub use attributes::BuilderError;

mod pipeline;
pub use pipeline::{
    PipelineBuilderError, PipelineEncodingError, PipelineError, PipelineErrorKind, PipelineResult,
    ResetError,
};

mod sources;
pub use sources::BlobProviderError;
