//! Module containing the derivation pipeline.

mod builder;
pub use builder::{AttributesQueueStage, PipelineBuilder, StagedPipeline};

mod core;
pub use self::core::DerivationPipeline;
