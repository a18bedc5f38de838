//! This module contains all of the traits describing functionality of portions of the derivation
//! pipeline.

mod attributes;
pub use attributes::{AttributesBuilder, NextAttributes};

mod data_sources;
pub use data_sources::{AsyncIterator, BlobProvider, DataAvailabilityProvider};

mod pipeline;
pub use pipeline::{Pipeline, StepResult};

mod providers;
pub use providers::{ChainProvider, L2ChainProvider};

mod stages;
pub use stages::{OriginAdvancer, OriginProvider, ResettableStage};
