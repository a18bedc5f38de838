//! Test utilities for `ferry-primitives`.

mod tracing;
pub use tracing::{CollectingLayer, TraceStorage};

mod validator;
pub use validator::TestBatchValidator;
