#![doc = include_str!("../README.md")]
#![warn(missing_debug_implementations, missing_docs, unreachable_pub, rustdoc::all)]
#![deny(unused_must_use, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

/// Re-export commonly used types and traits.
pub mod prelude {
    pub use crate::{
        attributes::StatefulAttributesBuilder,
        errors::{PipelineError, PipelineErrorKind, PipelineResult},
        pipeline::{DerivationPipeline, PipelineBuilder},
        sources::EthereumDataSource,
        traits::{
            BlobProvider, ChainProvider, L2ChainProvider, OriginProvider, Pipeline, StepResult,
        },
    };
}

pub mod attributes;
pub mod errors;
pub mod pipeline;
pub mod sources;
pub mod stages;
pub mod traits;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
